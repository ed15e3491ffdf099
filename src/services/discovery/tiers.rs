//! 三个回退层级的具体实现

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::infrastructure::driver::{js_string, text_script, DriverFactory, SubmissionDriver};
use crate::services::discovery::cascade::CascadeTier;
use crate::services::discovery::extract::extract_from_document;

/// 等待节点出现的上限，实际由每次尝试的超时截断
const NODE_WAIT: Duration = Duration::from_secs(60);

/// 在新会话中打开页面并执行 `read`，无论成功与否都关闭会话
async fn with_rendered_page<F, Fut>(
    drivers: &dyn DriverFactory,
    location: &str,
    read: F,
) -> anyhow::Result<String>
where
    F: FnOnce(Arc<dyn SubmissionDriver>) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<String>>,
{
    let driver: Arc<dyn SubmissionDriver> = Arc::from(drivers.open().await?);

    let result: anyhow::Result<String> = async {
        driver.navigate(location).await?;
        driver.wait_visible("body", NODE_WAIT).await?;
        read(driver.clone()).await
    }
    .await;

    if let Err(e) = driver.close().await {
        warn!("关闭会话失败: {}", e);
    }
    result
}

/// 第一层：按结构位置读取文本
pub struct SelectorTier {
    drivers: Arc<dyn DriverFactory>,
}

impl SelectorTier {
    pub fn new(drivers: Arc<dyn DriverFactory>) -> Self {
        Self { drivers }
    }
}

#[async_trait]
impl CascadeTier for SelectorTier {
    fn name(&self) -> &str {
        "结构定位"
    }

    fn attempt_timeouts(&self) -> Vec<Duration> {
        vec![Duration::from_secs(25), Duration::from_secs(35)]
    }

    async fn attempt(&self, location: &str, hint: &str) -> anyhow::Result<String> {
        with_rendered_page(self.drivers.as_ref(), location, |driver| async move {
            driver.wait_visible(hint, NODE_WAIT).await?;
            let value = driver.evaluate(&text_script(hint)).await?;
            Ok::<_, anyhow::Error>(value.as_str().unwrap_or_default().to_string())
        })
        .await
    }
}

/// 第二层：在渲染后的 DOM 上执行扫描脚本
pub struct ScriptScanTier {
    drivers: Arc<dyn DriverFactory>,
    keyword: String,
}

impl ScriptScanTier {
    pub fn new(drivers: Arc<dyn DriverFactory>, keyword: impl Into<String>) -> Self {
        Self {
            drivers,
            keyword: keyword.into(),
        }
    }

    /// 先找包含关键字的第一个元素取其中的数字，找不到再收集纯数字链接
    pub fn scan_script(&self) -> String {
        format!(
            r#"(function() {{
                var keyword = new RegExp({}, 'i');
                var candidates = Array.from(document.querySelectorAll('p,td,div,li'));
                var el = candidates.find(function(e) {{ return keyword.test(e.textContent); }});
                var nums = [];
                if (el) {{
                    var m = el.textContent.match(/\d+/g);
                    if (m) {{ nums = nums.concat(m); }}
                }}
                if (nums.length === 0) {{
                    var anchors = Array.from(document.querySelectorAll('a'));
                    for (var i = 0; i < anchors.length; i++) {{
                        var t = anchors[i].textContent.trim();
                        if (/^\d+$/.test(t)) nums.push(t);
                    }}
                }}
                return nums.join(' ');
            }})()"#,
            js_string(&self.keyword)
        )
    }
}

#[async_trait]
impl CascadeTier for ScriptScanTier {
    fn name(&self) -> &str {
        "脚本扫描"
    }

    fn attempt_timeouts(&self) -> Vec<Duration> {
        vec![Duration::from_secs(30), Duration::from_secs(40)]
    }

    async fn attempt(&self, location: &str, _hint: &str) -> anyhow::Result<String> {
        let script = self.scan_script();
        with_rendered_page(self.drivers.as_ref(), location, |driver| async move {
            let value = driver.evaluate(&script).await?;
            Ok::<_, anyhow::Error>(value.as_str().unwrap_or_default().to_string())
        })
        .await
    }
}

/// 第三层：直接 HTTP 抓取原始页面
pub struct HttpFetchTier {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetchTier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl CascadeTier for HttpFetchTier {
    fn name(&self) -> &str {
        "HTTP 抓取"
    }

    fn attempt_timeouts(&self) -> Vec<Duration> {
        vec![self.timeout]
    }

    async fn attempt(&self, location: &str, _hint: &str) -> anyhow::Result<String> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .with_context(|| format!("GET {} 失败", location))?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            bail!("HTTP 回退返回状态 {}", status);
        }

        let body = response.text().await.context("读取响应体失败")?;
        debug!("HTTP 回退获取到 {} 字节", body.len());

        match extract_from_document(&body) {
            Some(text) => Ok(text),
            None => bail!("页面中没有任何数字"),
        }
    }
}

/// 标准的三层回退顺序
pub fn standard_tiers(
    drivers: Arc<dyn DriverFactory>,
    keyword: &str,
) -> Result<Vec<Box<dyn CascadeTier>>, reqwest::Error> {
    Ok(vec![
        Box::new(SelectorTier::new(drivers.clone())),
        Box::new(ScriptScanTier::new(drivers, keyword)),
        Box::new(HttpFetchTier::new(Duration::from_secs(20))?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAction, FakeDriverFactory};
    use serde_json::json;

    #[tokio::test]
    async fn test_selector_tier_reads_hint_text_and_closes_session() {
        let factory = Arc::new(
            FakeDriverFactory::new().with_script_reply("innerText", json!("Решено: 1 5 9")),
        );
        let tier = SelectorTier::new(factory.clone());

        let text = tier.attempt("https://acmp.ru/u", "p.solved").await.unwrap();

        assert_eq!(text, "Решено: 1 5 9");
        let actions = factory.actions();
        assert_eq!(actions[0], FakeAction::Navigate("https://acmp.ru/u".to_string()));
        assert!(actions.contains(&FakeAction::WaitVisible("p.solved".to_string())));
        assert_eq!(actions.last(), Some(&FakeAction::Close));
        assert_eq!(factory.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_selector_tier_missing_node_is_error() {
        let factory = Arc::new(FakeDriverFactory::new().with_invisible("p.solved"));
        let tier = SelectorTier::new(factory.clone());

        assert!(tier.attempt("https://acmp.ru/u", "p.solved").await.is_err());
        assert_eq!(factory.actions().last(), Some(&FakeAction::Close));
    }

    #[tokio::test]
    async fn test_script_scan_tier_embeds_keyword() {
        let factory = Arc::new(
            FakeDriverFactory::new().with_script_reply("querySelectorAll('a')", json!("4 8 15")),
        );
        let tier = ScriptScanTier::new(factory.clone(), "реш");

        assert!(tier.scan_script().contains(r#"new RegExp("реш", 'i')"#));
        let text = tier.attempt("https://acmp.ru/u", "").await.unwrap();
        assert_eq!(text, "4 8 15");
    }

    mod http {
        use super::*;
        use wiremock::{
            matchers::{method, path},
            Mock, MockServer, ResponseTemplate,
        };

        async fn serve(template: ResponseTemplate) -> MockServer {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/profile"))
                .respond_with(template)
                .mount(&server)
                .await;
            server
        }

        async fn fetch(server: &MockServer, timeout: Duration) -> anyhow::Result<String> {
            let tier = HttpFetchTier::new(timeout).unwrap();
            tier.attempt(&format!("{}/profile", server.uri()), "").await
        }

        #[tokio::test]
        async fn test_http_tier_extracts_solved_section() {
            let server = serve(
                ResponseTemplate::new(200)
                    .set_body_string("<p>Решённые задачи: 1 5 9</p><p>Всего: 300</p>"),
            )
            .await;

            let text = fetch(&server, Duration::from_secs(5)).await.unwrap();
            assert_eq!(text, "1 5 9");
        }

        #[tokio::test]
        async fn test_http_tier_accepts_redirection_status() {
            let server =
                serve(ResponseTemplate::new(300).set_body_string("<a href='#'>12</a>")).await;

            let text = fetch(&server, Duration::from_secs(5)).await.unwrap();
            assert_eq!(text, "12");
        }

        #[tokio::test]
        async fn test_http_tier_rejects_error_status() {
            for status in [404, 500] {
                let server =
                    serve(ResponseTemplate::new(status).set_body_string("<p>Решено: 1</p>")).await;
                assert!(fetch(&server, Duration::from_secs(5)).await.is_err());
            }
        }

        #[tokio::test]
        async fn test_http_tier_page_without_digits_is_error() {
            let server =
                serve(ResponseTemplate::new(200).set_body_string("<p>пусто</p>")).await;
            assert!(fetch(&server, Duration::from_secs(5)).await.is_err());
        }

        #[tokio::test]
        async fn test_http_tier_times_out() {
            let server = serve(
                ResponseTemplate::new(200)
                    .set_body_string("<p>Решено: 1</p>")
                    .set_delay(Duration::from_secs(2)),
            )
            .await;
            assert!(fetch(&server, Duration::from_millis(100)).await.is_err());
        }
    }
}
