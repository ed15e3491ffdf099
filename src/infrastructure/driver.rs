//! 自动化能力接口 - 基础设施层
//!
//! 流程层只依赖这里的 trait，不认识具体的浏览器引擎

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::error::BrowserError;

/// 一个自动化会话能做的事情
#[async_trait]
pub trait SubmissionDriver: Send + Sync {
    /// 打开指定地址
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// 等待元素可见，超时返回 `ElementNotVisible`
    async fn wait_visible(&self, locator: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// 执行脚本并返回结果，没有返回值时为 `Null`
    async fn evaluate(&self, script: &str) -> Result<JsonValue, BrowserError>;

    /// 向元素输入文本
    async fn send_keys(&self, locator: &str, text: &str) -> Result<(), BrowserError>;

    async fn click(&self, locator: &str) -> Result<(), BrowserError>;

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// 释放会话持有的资源
    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// 会话工厂
///
/// 每次 `open` 都得到一个全新的、隔离的会话
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn SubmissionDriver>, BrowserError>;
}

/// 读取元素文本的脚本
pub fn text_script(locator: &str) -> String {
    format!(
        r#"(function() {{
            var el = document.querySelector({});
            return el ? (el.innerText || el.textContent || "") : "";
        }})()"#,
        js_string(locator)
    )
}

/// 判断元素是否存在且可见的脚本
pub fn visibility_script(locator: &str) -> String {
    format!(
        r#"(function() {{
            try {{
                var el = document.querySelector({});
                return el !== null && el.offsetParent !== null;
            }} catch (e) {{
                return false;
            }}
        }})()"#,
        js_string(locator)
    )
}

/// 转换为 JS 字符串字面量
pub fn js_string(value: &str) -> String {
    // JSON 字符串是合法的 JS 字符串字面量
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
