//! 记录所有操作的假驱动

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::BrowserError;
use crate::infrastructure::driver::{DriverFactory, SubmissionDriver};

/// 驱动收到的一次调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
    Navigate(String),
    WaitVisible(String),
    Evaluate(String),
    SendKeys(String, String),
    Click(String),
    Sleep(Duration),
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    script_replies: Vec<(String, JsonValue)>,
    invisible: HashSet<String>,
    failing_clicks: HashSet<String>,
    /// 剩余需要失败的导航次数
    navigation_failures: usize,
    fail_open: bool,
    actions: Vec<FakeAction>,
    sessions_opened: usize,
}

/// 假驱动
///
/// 克隆出来的实例共享同一份行为配置和操作记录。
/// `sleep` 只记录不等待；`evaluate` 返回第一个被脚本包含的 needle 对应的值，
/// 没有匹配时返回 `null`。
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    shared: Arc<Mutex<Shared>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_script_reply(self, needle: &str, value: JsonValue) -> Self {
        self.lock().script_replies.push((needle.to_string(), value));
        self
    }

    pub fn with_invisible(self, locator: &str) -> Self {
        self.lock().invisible.insert(locator.to_string());
        self
    }

    pub fn with_failing_click(self, locator: &str) -> Self {
        self.lock().failing_clicks.insert(locator.to_string());
        self
    }

    /// 前 `count` 次导航返回错误
    pub fn with_navigation_failures(self, count: usize) -> Self {
        self.lock().navigation_failures = count;
        self
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.lock().actions.clone()
    }

    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                FakeAction::Evaluate(script) => Some(script),
                _ => None,
            })
            .collect()
    }

    fn record(&self, action: FakeAction) {
        self.lock().actions.push(action);
    }
}

#[async_trait]
impl SubmissionDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.record(FakeAction::Navigate(url.to_string()));
        let mut shared = self.lock();
        if shared.navigation_failures > 0 {
            shared.navigation_failures -= 1;
            return Err(BrowserError::navigation_failed(
                url,
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "fake navigation failure",
                ),
            ));
        }
        Ok(())
    }

    async fn wait_visible(&self, locator: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.record(FakeAction::WaitVisible(locator.to_string()));
        if self.lock().invisible.contains(locator) {
            return Err(BrowserError::ElementNotVisible {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis(),
            });
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError> {
        self.record(FakeAction::Evaluate(script.to_string()));
        let shared = self.lock();
        let reply = shared
            .script_replies
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(JsonValue::Null);
        Ok(reply)
    }

    async fn send_keys(&self, locator: &str, text: &str) -> Result<(), BrowserError> {
        self.record(FakeAction::SendKeys(locator.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&self, locator: &str) -> Result<(), BrowserError> {
        self.record(FakeAction::Click(locator.to_string()));
        if self.lock().failing_clicks.contains(locator) {
            return Err(BrowserError::interaction_failed(
                locator,
                std::io::Error::new(std::io::ErrorKind::Other, "fake click failure"),
            ));
        }
        Ok(())
    }

    async fn sleep(&self, duration: Duration) {
        self.record(FakeAction::Sleep(duration));
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.record(FakeAction::Close);
        Ok(())
    }
}

/// 每次 `open` 都返回共享同一份记录的 `FakeDriver`
#[derive(Debug, Clone, Default)]
pub struct FakeDriverFactory {
    driver: FakeDriver,
}

impl FakeDriverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script_reply(self, needle: &str, value: JsonValue) -> Self {
        Self {
            driver: self.driver.with_script_reply(needle, value),
        }
    }

    pub fn with_invisible(self, locator: &str) -> Self {
        Self {
            driver: self.driver.with_invisible(locator),
        }
    }

    pub fn with_failing_click(self, locator: &str) -> Self {
        Self {
            driver: self.driver.with_failing_click(locator),
        }
    }

    pub fn with_navigation_failures(self, count: usize) -> Self {
        Self {
            driver: self.driver.with_navigation_failures(count),
        }
    }

    /// `open` 直接返回启动失败
    pub fn with_failing_open(self) -> Self {
        self.driver.lock().fail_open = true;
        self
    }

    pub fn driver(&self) -> &FakeDriver {
        &self.driver
    }

    pub fn actions(&self) -> Vec<FakeAction> {
        self.driver.actions()
    }

    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.driver.evaluated_scripts()
    }

    pub fn sessions_opened(&self) -> usize {
        self.driver.lock().sessions_opened
    }
}

#[async_trait]
impl DriverFactory for FakeDriverFactory {
    async fn open(&self) -> Result<Box<dyn SubmissionDriver>, BrowserError> {
        let mut shared = self.driver.lock();
        if shared.fail_open {
            return Err(BrowserError::LaunchFailed {
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "fake browser missing",
                )),
            });
        }
        shared.sessions_opened += 1;
        drop(shared);
        Ok(Box::new(self.driver.clone()))
    }
}
