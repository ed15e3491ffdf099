//! chromiumoxide 驱动 - 基础设施层
//!
//! 持有唯一的 Browser / Page 资源，只暴露 `SubmissionDriver` 能力

use async_trait::async_trait;
use chromiumoxide::{Browser, Page};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser::{launch_headless_browser, BrowserSettings};
use crate::error::BrowserError;
use crate::infrastructure::driver::{visibility_script, DriverFactory, SubmissionDriver};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 浏览器事件循环任务，被丢弃时一并终止
///
/// 会话 future 在 `close()` 之前被超时取消时，靠它收回后台任务
struct EventLoop(JoinHandle<()>);

impl EventLoop {
    fn stop(&self) {
        self.0.abort();
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 基于 chromiumoxide 的驱动
///
/// 一个实例对应一个独立的浏览器进程，`close()` 后整个进程退出。
/// 没有调用 `close()` 就被丢弃时，事件循环随之终止，浏览器进程由 `Browser` 自身的 drop 结束
pub struct ChromeDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: EventLoop,
}

impl ChromeDriver {
    pub fn new(browser: Browser, page: Page, handler: JoinHandle<()>) -> Self {
        Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler: EventLoop(handler),
        }
    }

    async fn is_visible(&self, locator: &str) -> Result<bool, BrowserError> {
        let value = self.evaluate(&visibility_script(locator)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl SubmissionDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("导航到: {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::navigation_failed(url, e))?;
        Ok(())
    }

    async fn wait_visible(&self, locator: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.is_visible(locator).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                // 页面跳转过程中脚本可能失败，继续轮询
                Err(e) => debug!("检查 {} 可见性失败: {}", locator, e),
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::ElementNotVisible {
                    locator: locator.to_string(),
                    timeout_ms: timeout.as_millis(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError> {
        let result = self.page.evaluate(script.to_string()).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    async fn send_keys(&self, locator: &str, text: &str) -> Result<(), BrowserError> {
        let element = self
            .page
            .find_element(locator)
            .await
            .map_err(|e| BrowserError::interaction_failed(locator, e))?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::interaction_failed(locator, e))?
            .type_str(text)
            .await
            .map_err(|e| BrowserError::interaction_failed(locator, e))?;
        Ok(())
    }

    async fn click(&self, locator: &str) -> Result<(), BrowserError> {
        self.page
            .find_element(locator)
            .await
            .map_err(|e| BrowserError::interaction_failed(locator, e))?
            .click()
            .await
            .map_err(|e| BrowserError::interaction_failed(locator, e))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = browser.close().await {
            warn!("关闭浏览器失败: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("等待浏览器进程退出失败: {}", e);
        }
        self.handler.stop();
        debug!("浏览器会话已关闭");
        Ok(())
    }
}

/// 每次打开都启动一个新的无头浏览器
#[derive(Clone, Debug, Default)]
pub struct HeadlessChromeFactory {
    settings: BrowserSettings,
}

impl HeadlessChromeFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl DriverFactory for HeadlessChromeFactory {
    async fn open(&self) -> Result<Box<dyn SubmissionDriver>, BrowserError> {
        let (browser, handler) = launch_headless_browser(&self.settings).await?;
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::PageCreationFailed {
                    source: Box::new(e),
                });
            }
        };
        Ok(Box::new(ChromeDriver::new(browser, page, handler)))
    }
}
