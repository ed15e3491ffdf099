use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 整体运行模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// 任意任务出现致命错误时立即终止整个运行
    AbortOnFatal,
    /// 记录失败的任务并继续处理后续任务
    SkipFailedItem,
}

impl RunMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abort" | "abort-on-fatal" => Some(RunMode::AbortOnFatal),
            "skip" | "skip-failed" => Some(RunMode::SkipFailedItem),
            _ => None,
        }
    }
}

/// 页面元素定位器表
///
/// 流程只引用逻辑角色（"登录框"、"提交按钮"），具体的选择器都在这里
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Locators {
    pub page_ready: String,
    pub account_panel: String,
    pub login_field: String,
    pub password_field: String,
    pub login_button: String,
    pub language_select: String,
    pub code_editor: String,
    pub submit_button: String,
}

const ACCOUNT_PANEL: &str =
    "body > table > tbody > tr:nth-child(1) > td > table > tbody > tr:nth-child(3) > td:nth-child(4)";
const SUBMIT_FORM: &str = "body > table > tbody > tr:nth-child(3) > td > table > tbody > tr > td:nth-child(2) > table > tbody > tr:nth-child(2) > td:nth-child(2) > form";

impl Default for Locators {
    fn default() -> Self {
        Self {
            page_ready: "body".to_string(),
            account_panel: ACCOUNT_PANEL.to_string(),
            login_field: format!("{ACCOUNT_PANEL} > form > nobr > b > input[type=text]:nth-child(1)"),
            password_field: format!(
                "{ACCOUNT_PANEL} > form > nobr > b > input[type=password]:nth-child(2)"
            ),
            login_button: format!("{ACCOUNT_PANEL} > form > nobr > b > input.button"),
            language_select: format!(
                "{SUBMIT_FORM} > table > tbody > tr:nth-child(1) > td:nth-child(2) > select"
            ),
            code_editor: "div.CodeMirror".to_string(),
            submit_button: format!("{SUBMIT_FORM} > input.button"),
        }
    }
}

impl Locators {
    /// 从 TOML 字符串解析，缺省的键使用默认值
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LocatorsFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|e| ConfigError::LocatorsFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 评测站点 ---
    pub judge_login: String,
    pub judge_password: String,
    /// 任务页面地址模板，`{id}` 会被替换为任务编号
    pub task_url_template: String,
    /// 用户资料页（包含已解决题目列表）
    pub profile_url: String,
    /// 资料页上已解决列表的结构位置
    pub solved_selector: String,
    /// 脚本扫描时识别"已解决"段落的关键字
    pub solved_keyword: String,
    /// 语言下拉框中要选择的编译器名称
    pub toolchain: String,
    pub locators: Locators,

    // --- 生成服务 ---
    pub api_key: String,
    /// OpenAI 兼容接口的根地址
    pub api_base: String,
    pub model: String,
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    pub fallback_max_tokens: u32,
    pub generation_timeout: Duration,

    // --- 数据文件 ---
    pub catalog_path: PathBuf,
    pub processed_path: PathBuf,
    /// 运行结束后尝试删除的文件
    pub cleanup_paths: Vec<PathBuf>,

    // --- 运行控制 ---
    pub first_task_id: u32,
    pub last_task_id: u32,
    pub run_mode: RunMode,
    pub store_load_timeout: Duration,
    pub discovery_timeout: Duration,
    pub submission_timeout: Duration,

    // --- 浏览器 ---
    pub chrome_executable: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge_login: String::new(),
            judge_password: String::new(),
            task_url_template: "https://acmp.ru/index.asp?main=task&id_task={id}".to_string(),
            profile_url: String::new(),
            solved_selector: "body > table > tbody > tr:nth-child(3) > td > table > tbody > tr > td:nth-child(2) > table > tbody > tr:nth-child(2) > td:nth-child(2) > table > tbody > tr > td:nth-child(1) > p:nth-child(16)".to_string(),
            solved_keyword: "реш".to_string(),
            toolchain: "MinGW GNU C++ 15.2.0".to_string(),
            locators: Locators::default(),
            api_key: String::new(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
            model: String::new(),
            fallback_model: Some("kwaipilot/kat-coder-pro:free".to_string()),
            max_tokens: 16000,
            fallback_max_tokens: 24000,
            generation_timeout: Duration::from_secs(60),
            catalog_path: PathBuf::from("result.json"),
            processed_path: PathBuf::from("processed_tasks.json"),
            cleanup_paths: vec![
                PathBuf::from("processed_tasks.json"),
                PathBuf::from("../processed_tasks.json"),
            ],
            first_task_id: 1,
            last_task_id: 1000,
            run_mode: RunMode::AbortOnFatal,
            store_load_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(180),
            submission_timeout: Duration::from_secs(300),
            chrome_executable: None,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();

        let locators = match env_string("LOCATORS_FILE") {
            Some(path) => Locators::from_file(Path::new(&path))?,
            None => default.locators,
        };

        let run_mode = match env_string("RUN_MODE") {
            Some(value) => RunMode::parse(&value).ok_or(ConfigError::EnvVarParseFailed {
                var_name: "RUN_MODE".to_string(),
                value,
                expected_type: "abort | skip".to_string(),
            })?,
            None => default.run_mode,
        };

        // FALLBACK_MODEL=none 关闭备用模型
        let fallback_model = match env_string("FALLBACK_MODEL") {
            Some(v) if v.eq_ignore_ascii_case("none") => None,
            Some(v) => Some(v),
            None => default.fallback_model,
        };

        let processed_path = env_string("PROCESSED_PATH")
            .map(PathBuf::from)
            .unwrap_or(default.processed_path);
        let mut cleanup_paths = vec![processed_path.clone()];
        for path in default.cleanup_paths {
            if !cleanup_paths.contains(&path) {
                cleanup_paths.push(path);
            }
        }

        Ok(Self {
            judge_login: env_string("ACMP_LOGIN").unwrap_or(default.judge_login),
            judge_password: env_string("ACMP_PASSWORD").unwrap_or(default.judge_password),
            task_url_template: env_string("TASK_URL_TEMPLATE").unwrap_or(default.task_url_template),
            profile_url: env_string("USER_URL").unwrap_or(default.profile_url),
            solved_selector: env_string("SOLVED_SELECTOR").unwrap_or(default.solved_selector),
            solved_keyword: env_string("SOLVED_KEYWORD").unwrap_or(default.solved_keyword),
            toolchain: env_string("TOOLCHAIN").unwrap_or(default.toolchain),
            locators,
            api_key: env_string("API_KEY").unwrap_or(default.api_key),
            api_base: env_string("API_BASE").unwrap_or(default.api_base),
            model: env_string("MODEL").unwrap_or(default.model),
            fallback_model,
            max_tokens: env_parse("MAX_TOKENS").unwrap_or(default.max_tokens),
            fallback_max_tokens: env_parse("FALLBACK_MAX_TOKENS")
                .unwrap_or(default.fallback_max_tokens),
            generation_timeout: env_secs("GENERATION_TIMEOUT_SECS")
                .unwrap_or(default.generation_timeout),
            catalog_path: env_string("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.catalog_path),
            processed_path,
            cleanup_paths,
            first_task_id: env_parse("FIRST_TASK_ID").unwrap_or(default.first_task_id),
            last_task_id: env_parse("LAST_TASK_ID").unwrap_or(default.last_task_id),
            run_mode,
            store_load_timeout: env_secs("STORE_LOAD_TIMEOUT_SECS")
                .unwrap_or(default.store_load_timeout),
            discovery_timeout: env_secs("DISCOVERY_TIMEOUT_SECS")
                .unwrap_or(default.discovery_timeout),
            submission_timeout: env_secs("SUBMISSION_TIMEOUT_SECS")
                .unwrap_or(default.submission_timeout),
            chrome_executable: env_string("CHROME_EXECUTABLE").map(PathBuf::from),
        })
    }

    /// 检查必需的配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("API_KEY", &self.api_key),
            ("MODEL", &self.model),
            ("ACMP_LOGIN", &self.judge_login),
            ("ACMP_PASSWORD", &self.judge_password),
            ("USER_URL", &self.profile_url),
        ];
        for (var_name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EnvVarNotFound {
                    var_name: var_name.to_string(),
                });
            }
        }
        if self.first_task_id == 0 || self.first_task_id > self.last_task_id {
            return Err(ConfigError::InvalidRange {
                first: self.first_task_id,
                last: self.last_task_id,
            });
        }
        Ok(())
    }
}
