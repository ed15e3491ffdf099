use thiserror::Error;

/// 装箱的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 题目目录错误
    #[error("题目目录错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 单个任务流程的致命错误
    #[error("流程错误: {0}")]
    Flow(#[from] FlowError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// HTTP 客户端创建失败
    #[error("无法创建 HTTP 客户端: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: BoxError,
    },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: BoxError,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: BoxError,
    },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: BoxError,
    },
    /// 元素在超时时间内不可见
    #[error("元素 {locator} 在 {timeout_ms}ms 内不可见")]
    ElementNotVisible { locator: String, timeout_ms: u128 },
    /// 元素交互失败（点击、输入）
    #[error("元素 {locator} 交互失败: {source}")]
    InteractionFailed {
        locator: String,
        #[source]
        source: BoxError,
    },
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

/// 代码生成服务错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// 请求没有得到可用的响应（网络、超时、解析）
    #[error("请求失败 (模型: {model}): {source}")]
    RequestFailed {
        model: String,
        #[source]
        source: BoxError,
    },
    /// 服务端返回的 error 字段
    #[error("API 错误 (模型: {model}): {message} (类型: {kind})")]
    Api {
        model: String,
        message: String,
        kind: String,
    },
    /// choices 为空
    #[error("返回结果为空 (模型: {model})")]
    EmptyChoices { model: String },
    /// content 为空
    #[error("返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 已处理列表存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("文件内容不是整数数组 ({path}): {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 题目目录错误
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("无法读取题目目录 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("无法解析题目目录 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 已解决列表获取错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// 所有层级都没有产生数字
    #[error("未能在页面上找到已解决题目列表")]
    SolvedListNotFound,
    /// 整体发现过程超时
    #[error("获取已解决题目列表超时 ({timeout_secs}s)")]
    TimedOut { timeout_secs: u64 },
}

/// 单个任务流程的致命错误
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("任务 id={0} 在题目目录中不存在")]
    TaskNotFound(u32),
    #[error("代码生成失败: {0}")]
    Generation(#[from] GenerationError),
    #[error("无法创建浏览器会话: {0}")]
    Session(#[source] BrowserError),
    #[error("导航在 {attempts} 次尝试后仍然失败: {source}")]
    NavigationExhausted {
        attempts: usize,
        #[source]
        source: BrowserError,
    },
    #[error("{role} 未出现，可能是页面加载或登录出现问题: {source}")]
    WidgetNotVisible {
        role: &'static str,
        #[source]
        source: BrowserError,
    },
    #[error("{step} 失败: {source}")]
    Interaction {
        step: &'static str,
        #[source]
        source: BrowserError,
    },
    #[error("提交流程超时 ({timeout_secs}s)")]
    SubmissionTimedOut { timeout_secs: u64 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 环境变量不存在
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
    /// 任务范围无效
    #[error("任务范围无效: {first}..={last}")]
    InvalidRange { first: u32, last: u32 },
    /// 定位器文件读取或解析失败
    #[error("定位器文件 {path} 无法加载: {reason}")]
    LocatorsFile { path: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl BrowserError {
    /// 创建导航错误
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }

    /// 创建交互错误
    pub fn interaction_failed(
        locator: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BrowserError::InteractionFailed {
            locator: locator.into(),
            source: Box::new(source),
        }
    }
}

impl GenerationError {
    /// 出错的模型名称
    pub fn model(&self) -> &str {
        match self {
            GenerationError::RequestFailed { model, .. }
            | GenerationError::Api { model, .. }
            | GenerationError::EmptyChoices { model }
            | GenerationError::EmptyContent { model } => model,
        }
    }

    /// 服务端或底层客户端给出的原始错误描述，不包含模型名称
    pub fn detail(&self) -> String {
        match self {
            GenerationError::RequestFailed { source, .. } => source.to_string(),
            GenerationError::Api { message, kind, .. } => format!("{message} {kind}"),
            GenerationError::EmptyChoices { .. } | GenerationError::EmptyContent { .. } => {
                String::new()
            }
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn fail_with_flow() -> AppResult<()> {
        let result: Result<(), FlowError> = Err(FlowError::TaskNotFound(5));
        result?;
        Ok(())
    }

    fn fail_with_config() -> AppResult<()> {
        let result: Result<(), ConfigError> = Err(ConfigError::InvalidRange { first: 3, last: 1 });
        result?;
        Ok(())
    }

    #[test]
    fn test_app_error_wraps_layer_errors() {
        let err = fail_with_flow().unwrap_err();
        assert!(matches!(err, AppError::Flow(FlowError::TaskNotFound(5))));
        assert!(err.to_string().contains("id=5"));

        let err = fail_with_config().unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidRange { .. })));
    }

    #[test]
    fn test_generation_detail_omits_model() {
        let err = GenerationError::Api {
            model: "vendor/model-2402".to_string(),
            message: "model overloaded".to_string(),
            kind: "server_error".to_string(),
        };
        assert_eq!(err.detail(), "model overloaded server_error");
        assert!(err.to_string().contains("vendor/model-2402"));

        let err = GenerationError::EmptyContent {
            model: "vendor/model-2402".to_string(),
        };
        assert!(err.detail().is_empty());
    }
}
