//! 评测站点操作 - 业务能力层
//!
//! 只负责"在站点上做一步操作"的能力：打开题目页、登录、选语言、写代码、提交。
//! 所有选择器来自 `Locators`，这里只引用逻辑角色。

use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{Config, Locators};
use crate::error::{BrowserError, FlowError};
use crate::infrastructure::driver::{js_string, text_script, visibility_script, SubmissionDriver};
use crate::utils::logging::truncate_text;

/// 各步骤的等待时间
#[derive(Debug, Clone)]
pub struct PortalTimings {
    pub nav_attempts: usize,
    /// 单次导航（含等待页面可见）的上限
    pub nav_timeout: Duration,
    /// 第 n 次导航失败后等待 n × nav_backoff_unit
    pub nav_backoff_unit: Duration,
    pub page_settle: Duration,
    pub login_wait: Duration,
    pub login_settle: Duration,
    pub post_login: Duration,
    pub panel_settle: Duration,
    pub widget_wait: Duration,
    pub widget_settle: Duration,
    pub before_submit: Duration,
    pub after_submit: Duration,
}

impl Default for PortalTimings {
    fn default() -> Self {
        Self {
            nav_attempts: 3,
            nav_timeout: Duration::from_secs(60),
            nav_backoff_unit: Duration::from_secs(5),
            page_settle: Duration::from_secs(3),
            login_wait: Duration::from_secs(30),
            login_settle: Duration::from_secs(1),
            post_login: Duration::from_secs(5),
            panel_settle: Duration::from_secs(2),
            widget_wait: Duration::from_secs(60),
            widget_settle: Duration::from_secs(2),
            before_submit: Duration::from_secs(1),
            after_submit: Duration::from_secs(2),
        }
    }
}

/// 登录步骤的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    LoggedIn,
    /// 没有看到登录表单
    NotRequired,
    /// 登录表单没有变为可交互，按已登录处理
    AssumedAuthenticated,
}

/// 评测站点
#[derive(Debug, Clone)]
pub struct JudgePortal {
    locators: Locators,
    login: String,
    password: String,
    toolchain: String,
    timings: PortalTimings,
}

impl JudgePortal {
    pub fn new(
        locators: Locators,
        login: impl Into<String>,
        password: impl Into<String>,
        toolchain: impl Into<String>,
    ) -> Self {
        Self {
            locators,
            login: login.into(),
            password: password.into(),
            toolchain: toolchain.into(),
            timings: PortalTimings::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.locators.clone(),
            &config.judge_login,
            &config.judge_password,
            &config.toolchain,
        )
    }

    pub fn with_timings(mut self, timings: PortalTimings) -> Self {
        self.timings = timings;
        self
    }

    /// 打开题目页面，失败时按线性退避重试
    pub async fn open_task_page(
        &self,
        driver: &dyn SubmissionDriver,
        url: &str,
    ) -> Result<(), FlowError> {
        let attempts = self.timings.nav_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            info!("导航尝试 {}/{}: {}", attempt, attempts, url);
            let navigation = async {
                driver.navigate(url).await?;
                driver
                    .wait_visible(&self.locators.page_ready, self.timings.nav_timeout)
                    .await
            };
            let result = match timeout(self.timings.nav_timeout, navigation).await {
                Ok(result) => result,
                Err(elapsed) => Err(BrowserError::navigation_failed(url, elapsed)),
            };

            match result {
                Ok(()) => {
                    driver.sleep(self.timings.page_settle).await;
                    info!("✓ 导航成功");
                    return Ok(());
                }
                Err(e) => {
                    warn!("导航失败 (尝试 {}/{}): {}", attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        let wait = self.timings.nav_backoff_unit * attempt as u32;
                        info!("等待 {:?} 后重试...", wait);
                        driver.sleep(wait).await;
                    }
                }
            }
        }

        Err(FlowError::NavigationExhausted {
            attempts,
            source: last_error.unwrap_or_else(|| BrowserError::ElementNotVisible {
                locator: self.locators.page_ready.clone(),
                timeout_ms: self.timings.nav_timeout.as_millis(),
            }),
        })
    }

    /// 如果页面上有登录表单就登录
    pub async fn login_if_needed(
        &self,
        driver: &dyn SubmissionDriver,
    ) -> Result<LoginOutcome, FlowError> {
        let form_visible = match driver
            .evaluate(&visibility_script(&self.locators.login_field))
            .await
        {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                warn!("无法检查登录表单: {}", e);
                false
            }
        };

        if !form_visible {
            info!("未发现登录表单，可能已登录");
            return Ok(LoginOutcome::NotRequired);
        }

        info!("发现登录表单，执行登录...");
        if let Err(e) = driver
            .wait_visible(&self.locators.login_field, self.timings.login_wait)
            .await
        {
            warn!("登录表单在超时内没有就绪，可能已登录: {}", e);
            return Ok(LoginOutcome::AssumedAuthenticated);
        }
        driver.sleep(self.timings.login_settle).await;

        let interaction = |source| FlowError::Interaction {
            step: "登录",
            source,
        };
        driver
            .send_keys(&self.locators.login_field, &self.login)
            .await
            .map_err(interaction)?;
        driver
            .send_keys(&self.locators.password_field, &self.password)
            .await
            .map_err(interaction)?;
        driver
            .click(&self.locators.login_button)
            .await
            .map_err(interaction)?;
        driver.sleep(self.timings.post_login).await;
        info!("✓ 登录完成");

        self.log_account_panel(driver).await;
        Ok(LoginOutcome::LoggedIn)
    }

    async fn log_account_panel(&self, driver: &dyn SubmissionDriver) {
        driver.sleep(self.timings.panel_settle).await;
        match driver
            .evaluate(&text_script(&self.locators.account_panel))
            .await
        {
            Ok(value) => debug!(
                "账户面板: {}",
                truncate_text(value.as_str().unwrap_or_default().trim(), 120)
            ),
            Err(e) => warn!("无法读取账户面板: {}", e),
        }
    }

    fn select_script(&self) -> String {
        format!(
            r#"(function() {{
                var sel = document.querySelector({});
                if (!sel) {{ throw new Error("language selector not found"); }}
                for (var i = 0; i < sel.options.length; i++) {{
                    if (sel.options[i].text.includes({})) {{
                        sel.selectedIndex = i;
                        sel.dispatchEvent(new Event('change'));
                        return i;
                    }}
                }}
                return -1;
            }})()"#,
            js_string(&self.locators.language_select),
            js_string(&self.toolchain)
        )
    }

    /// 选择编译器，返回被选中的选项下标
    ///
    /// 下拉框不可见是致命错误；找不到匹配的选项只记录警告
    pub async fn select_toolchain(
        &self,
        driver: &dyn SubmissionDriver,
    ) -> Result<Option<usize>, FlowError> {
        info!("等待语言选择框...");
        driver
            .wait_visible(&self.locators.language_select, self.timings.widget_wait)
            .await
            .map_err(|source| FlowError::WidgetNotVisible {
                role: "语言选择框",
                source,
            })?;
        driver.sleep(self.timings.widget_settle).await;

        let value = driver
            .evaluate(&self.select_script())
            .await
            .map_err(|source| FlowError::Interaction {
                step: "选择语言",
                source,
            })?;

        match value.as_i64() {
            Some(index) if index >= 0 => {
                info!("✓ 已选择 {} (选项 {})", self.toolchain, index);
                Ok(Some(index as usize))
            }
            _ => {
                warn!("语言列表中没有包含 {} 的选项", self.toolchain);
                Ok(None)
            }
        }
    }

    fn inject_script(&self, code: &str) -> String {
        format!(
            r#"(function() {{
                var cm = document.querySelector({}).CodeMirror;
                cm.setValue({});
                cm.focus();
                cm.refresh();
                cm.getInputField().dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            js_string(&self.locators.code_editor),
            js_string(code)
        )
    }

    /// 把代码写入编辑器
    pub async fn inject_solution(
        &self,
        driver: &dyn SubmissionDriver,
        code: &str,
    ) -> Result<(), FlowError> {
        info!("等待代码编辑器并写入解答...");
        driver
            .wait_visible(&self.locators.code_editor, self.timings.widget_wait)
            .await
            .map_err(|source| FlowError::WidgetNotVisible {
                role: "代码编辑器",
                source,
            })?;
        driver.sleep(self.timings.widget_settle).await;

        driver
            .evaluate(&self.inject_script(code))
            .await
            .map_err(|source| FlowError::Interaction {
                step: "写入代码",
                source,
            })?;
        Ok(())
    }

    /// 点击提交按钮
    pub async fn submit(&self, driver: &dyn SubmissionDriver) -> Result<(), FlowError> {
        driver.sleep(self.timings.before_submit).await;
        driver
            .click(&self.locators.submit_button)
            .await
            .map_err(|source| FlowError::Interaction {
                step: "提交",
                source,
            })?;
        driver.sleep(self.timings.after_submit).await;
        Ok(())
    }
}
