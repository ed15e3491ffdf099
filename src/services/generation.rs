//! 代码生成服务 - 业务能力层
//!
//! 只负责"根据题目生成代码"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` 调用 OpenAI 兼容的 chat/completions 接口（OpenRouter 等）
//! - 额度不足时自动切换到备用模型（仅一次）

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::GenerationError;
use crate::models::CatalogItem;
use crate::utils::logging::truncate_text;

/// 生成失败的原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// 当前模型额度不足
    QuotaExhausted,
    /// 网络抖动、限流、网关错误
    Transient,
    Permanent,
}

const QUOTA_MARKERS: &[&str] = &["402", "more credits", "requires more credits"];
const TRANSIENT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "429",
    "rate limit",
    "502",
    "503",
    "504",
    "connection",
];

/// 根据错误详情判断失败原因
pub fn classify_failure(detail: &str) -> FailureCause {
    let lower = detail.to_lowercase();
    if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureCause::QuotaExhausted
    } else if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureCause::Transient
    } else {
        FailureCause::Permanent
    }
}

impl GenerationError {
    /// 只看原始错误描述，模型名称里的数字不参与判断
    pub fn cause(&self) -> FailureCause {
        classify_failure(&self.detail())
    }
}

/// 代码生成能力
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(
        &self,
        item: &CatalogItem,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// 取第一个 choice 的内容
///
/// 没有 choice 或内容为空都算失败
pub fn first_content<I>(model: &str, contents: I) -> Result<String, GenerationError>
where
    I: IntoIterator<Item = Option<String>>,
{
    let content = contents
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::EmptyChoices {
            model: model.to_string(),
        })?;

    match content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(GenerationError::EmptyContent {
            model: model.to_string(),
        }),
    }
}

/// 把客户端错误转换为 `GenerationError`
///
/// 服务端返回的 error 字段保留 message 和 type，其余错误只保留描述
fn map_client_error(model: &str, err: OpenAIError) -> GenerationError {
    match err {
        OpenAIError::ApiError(api) => GenerationError::Api {
            model: model.to_string(),
            message: api.message,
            kind: api.r#type.unwrap_or_default(),
        },
        other => GenerationError::RequestFailed {
            model: model.to_string(),
            source: other.to_string().into(),
        },
    }
}

/// 构建生成提示词
pub fn build_prompt(item: &CatalogItem, toolchain: &str) -> String {
    let mut prompt = format!(
        "请用 {toolchain} 编写这道题的解答，只返回完整的程序代码，不要注释和解释，也不要用 ``` 包裹。\
         程序会经过大量测试，必须对任意合法输入都正确，并满足内存和时间限制。\n\n"
    );
    prompt.push_str(&format!("题目编号: {}\n题目名称: {}\n", item.id, item.name));
    prompt.push_str(&format!(
        "限制: 内存 = {} KB, 时间 = {} ms.\n\n{}\n",
        item.memory, item.time, item.description
    ));
    for example in &item.examples {
        prompt.push_str(&format!(
            "输入数据: {}\n输出数据: {}\n",
            example.input, example.output
        ));
    }
    prompt
}

/// OpenAI 兼容的生成服务客户端
pub struct OpenAiCompatClient {
    client: Client<OpenAIConfig>,
    toolchain: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// `api_base` 形如 `https://openrouter.ai/api/v1`
    pub fn new(
        api_base: &str,
        api_key: &str,
        toolchain: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(openai_config),
            toolchain: toolchain.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CodeGenerator for OpenAiCompatClient {
    async fn generate(
        &self,
        item: &CatalogItem,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(item, &self.toolchain);
        debug!("调用生成服务，模型: {}, max_tokens: {}", model, max_tokens);
        debug!("提示词: {}", truncate_text(&prompt, 300));

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| map_client_error(model, e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| map_client_error(model, e))?;

        let response = match timeout(self.timeout, self.client.chat().create(request)).await {
            Ok(result) => result.map_err(|e| {
                warn!("生成服务调用失败 (模型: {}): {}", model, e);
                map_client_error(model, e)
            })?,
            Err(_) => {
                return Err(GenerationError::RequestFailed {
                    model: model.to_string(),
                    source: format!("request timed out after {:?}", self.timeout).into(),
                })
            }
        };

        debug!("生成服务调用成功，choices: {}", response.choices.len());
        first_content(
            model,
            response
                .choices
                .into_iter()
                .map(|choice| choice.message.content),
        )
    }
}

/// 模型选择策略
#[derive(Debug, Clone)]
pub struct GenerationPolicy {
    pub primary_model: String,
    pub fallback_model: Option<String>,
    pub max_tokens: u32,
    /// 备用模型使用更大的输出上限
    pub fallback_max_tokens: u32,
}

impl GenerationPolicy {
    /// 与主模型不同的备用模型
    fn distinct_fallback(&self) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .filter(|m| !m.is_empty() && *m != self.primary_model)
    }
}

/// 调用主模型，额度不足时切换到备用模型重试一次
///
/// 其他错误、没有配置不同的备用模型、或者备用模型也失败时，返回错误
pub async fn generate_with_fallback(
    generator: &dyn CodeGenerator,
    item: &CatalogItem,
    policy: &GenerationPolicy,
) -> Result<String, GenerationError> {
    let err = match generator
        .generate(item, &policy.primary_model, policy.max_tokens)
        .await
    {
        Ok(content) => return Ok(content),
        Err(err) => err,
    };

    let Some(fallback) = policy.distinct_fallback() else {
        return Err(err);
    };
    if err.cause() != FailureCause::QuotaExhausted {
        return Err(err);
    }

    warn!(
        "模型 {} 额度不足，切换到备用模型 {} (max_tokens={})",
        policy.primary_model, fallback, policy.fallback_max_tokens
    );
    let content = generator
        .generate(item, fallback, policy.fallback_max_tokens)
        .await?;
    info!("✓ 备用模型 {} 生成成功", fallback);
    Ok(content)
}

/// 去掉首尾的代码块标记
pub fn strip_code_fence(content: &str) -> String {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // 跳过语言标记所在的整行
        text = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '+'),
        };
    }
    text = text.trim_end();
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Example;
    use crate::testing::ScriptedGenerator;

    fn item() -> CatalogItem {
        CatalogItem {
            id: 42,
            name: "Ответ".to_string(),
            description: "Выведите 42".to_string(),
            complexity: 1,
            memory: 16384,
            time: 1000,
            examples: vec![Example {
                input: "".to_string(),
                output: "42".to_string(),
            }],
        }
    }

    fn policy(fallback: Option<&str>) -> GenerationPolicy {
        GenerationPolicy {
            primary_model: "A".to_string(),
            fallback_model: fallback.map(str::to_string),
            max_tokens: 16000,
            fallback_max_tokens: 24000,
        }
    }

    fn api_error(model: &str, message: &str) -> GenerationError {
        GenerationError::Api {
            model: model.to_string(),
            message: message.to_string(),
            kind: String::new(),
        }
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("This request requires more credits"),
            FailureCause::QuotaExhausted
        );
        assert_eq!(
            classify_failure("API 返回错误 (状态 402)"),
            FailureCause::QuotaExhausted
        );
        assert_eq!(
            classify_failure("operation timed out"),
            FailureCause::Transient
        );
        assert_eq!(classify_failure("invalid model id"), FailureCause::Permanent);
    }

    #[tokio::test]
    async fn test_quota_failure_retries_once_with_fallback() {
        let generator = ScriptedGenerator::new(vec![
            Err(api_error("A", "This request requires more credits")),
            Ok("int main() {}".to_string()),
        ]);

        let content = generate_with_fallback(&generator, &item(), &policy(Some("B")))
            .await
            .unwrap();

        assert_eq!(content, "int main() {}");
        assert_eq!(
            generator.calls(),
            vec![("A".to_string(), 16000), ("B".to_string(), 24000)]
        );
    }

    #[tokio::test]
    async fn test_unrelated_failure_propagates_without_retry() {
        let generator = ScriptedGenerator::new(vec![Err(api_error("A", "model overloaded"))]);

        let err = generate_with_fallback(&generator, &item(), &policy(Some("B")))
            .await
            .unwrap_err();

        match err {
            GenerationError::Api { model, message, .. } => {
                assert_eq!(model, "A");
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(generator.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_quota_failure_without_distinct_fallback_is_final() {
        for fallback in [None, Some("A")] {
            let generator =
                ScriptedGenerator::new(vec![Err(api_error("A", "requires more credits"))]);
            let result = generate_with_fallback(&generator, &item(), &policy(fallback)).await;
            assert!(result.is_err());
            assert_eq!(generator.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_fallback_failure_is_returned() {
        let generator = ScriptedGenerator::new(vec![
            Err(api_error("A", "requires more credits")),
            Err(GenerationError::EmptyContent {
                model: "B".to_string(),
            }),
        ]);

        let err = generate_with_fallback(&generator, &item(), &policy(Some("B")))
            .await
            .unwrap_err();
        assert_eq!(err.model(), "B");
        assert_eq!(generator.calls().len(), 2);
    }

    #[test]
    fn test_first_content_rejects_empty_replies() {
        assert_eq!(
            first_content("A", vec![Some("code".to_string()), None]).unwrap(),
            "code"
        );
        assert!(matches!(
            first_content("A", Vec::new()),
            Err(GenerationError::EmptyChoices { .. })
        ));
        assert!(matches!(
            first_content("A", vec![None]),
            Err(GenerationError::EmptyContent { .. })
        ));
        assert!(matches!(
            first_content("A", vec![Some("  \n".to_string())]),
            Err(GenerationError::EmptyContent { .. })
        ));
    }

    #[test]
    fn test_quota_errors_are_classified_from_error_detail() {
        let err = api_error("A", "This request requires more credits, or fewer max_tokens");
        assert_eq!(err.cause(), FailureCause::QuotaExhausted);

        let err = GenerationError::RequestFailed {
            model: "A".to_string(),
            source: "HTTP status 402 Payment Required".into(),
        };
        assert_eq!(err.cause(), FailureCause::QuotaExhausted);

        let err = GenerationError::EmptyChoices {
            model: "A".to_string(),
        };
        assert_eq!(err.cause(), FailureCause::Permanent);
    }

    #[tokio::test]
    async fn test_model_id_with_402_does_not_look_like_quota_failure() {
        let policy = GenerationPolicy {
            primary_model: "mistralai/mistral-large-2402".to_string(),
            ..policy(Some("B"))
        };
        for first in [
            api_error("mistralai/mistral-large-2402", "model overloaded"),
            GenerationError::EmptyContent {
                model: "mistralai/mistral-large-2402".to_string(),
            },
        ] {
            assert_eq!(first.cause(), FailureCause::Permanent);

            let generator = ScriptedGenerator::new(vec![Err(first)]);
            let result = generate_with_fallback(&generator, &item(), &policy).await;

            assert!(result.is_err());
            assert_eq!(
                generator.calls(),
                vec![("mistralai/mistral-large-2402".to_string(), 16000)]
            );
        }
    }

    mod http {
        use super::*;
        use serde_json::json;
        use wiremock::{
            matchers::{body_partial_json, method, path},
            Mock, MockServer, ResponseTemplate,
        };

        fn client(server: &MockServer, timeout: Duration) -> OpenAiCompatClient {
            OpenAiCompatClient::new(&server.uri(), "test-key", "MinGW", timeout)
        }

        fn completion(choices: serde_json::Value) -> serde_json::Value {
            json!({
                "id": "gen-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "A",
                "choices": choices,
            })
        }

        #[tokio::test]
        async fn test_generate_sends_model_and_token_limit() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .and(body_partial_json(json!({"model": "A", "max_tokens": 16000})))
                .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!([{
                    "index": 0,
                    "message": {"role": "assistant", "content": "int main(){}"},
                    "finish_reason": "stop",
                }]))))
                .expect(1)
                .mount(&server)
                .await;

            let content = client(&server, Duration::from_secs(5))
                .generate(&item(), "A", 16000)
                .await
                .unwrap();
            assert_eq!(content, "int main(){}");
        }

        #[tokio::test]
        async fn test_payment_required_keeps_api_message() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                    "error": {
                        "message": "This request requires more credits",
                        "type": "insufficient_credits",
                    }
                })))
                .mount(&server)
                .await;

            let err = client(&server, Duration::from_secs(5))
                .generate(&item(), "A", 16000)
                .await
                .unwrap_err();

            match &err {
                GenerationError::Api { model, message, kind } => {
                    assert_eq!(model, "A");
                    assert_eq!(message, "This request requires more credits");
                    assert_eq!(kind, "insufficient_credits");
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(err.cause(), FailureCause::QuotaExhausted);
        }

        #[tokio::test]
        async fn test_non_json_error_status_is_failure() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
                .mount(&server)
                .await;

            let result = client(&server, Duration::from_secs(5))
                .generate(&item(), "A", 16000)
                .await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_error_field_on_success_status_is_failure() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "error": {"message": "upstream rejected the request"}
                })))
                .mount(&server)
                .await;

            let result = client(&server, Duration::from_secs(5))
                .generate(&item(), "A", 16000)
                .await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_empty_choices_is_failure() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!([]))))
                .mount(&server)
                .await;

            let err = client(&server, Duration::from_secs(5))
                .generate(&item(), "A", 16000)
                .await
                .unwrap_err();
            assert!(matches!(err, GenerationError::EmptyChoices { .. }));
            assert_eq!(err.cause(), FailureCause::Permanent);
        }

        #[tokio::test]
        async fn test_slow_response_times_out() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chat/completions"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(completion(json!([])))
                        .set_delay(Duration::from_secs(2)),
                )
                .mount(&server)
                .await;

            let err = client(&server, Duration::from_millis(100))
                .generate(&item(), "A", 16000)
                .await
                .unwrap_err();
            assert!(matches!(err, GenerationError::RequestFailed { .. }));
            assert_eq!(err.cause(), FailureCause::Transient);
        }
    }

    #[test]
    fn test_prompt_contains_limits_and_examples() {
        let prompt = build_prompt(&item(), "MinGW GNU C++ 15.2.0");
        assert!(prompt.contains("MinGW GNU C++ 15.2.0"));
        assert!(prompt.contains("题目编号: 42"));
        assert!(prompt.contains("内存 = 16384 KB"));
        assert!(prompt.contains("输出数据: 42"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(
            strip_code_fence("```cpp\n#include <cstdio>\nint main(){}\n```\n"),
            "#include <cstdio>\nint main(){}"
        );
        assert_eq!(strip_code_fence("  int main(){}  "), "int main(){}");
        assert_eq!(strip_code_fence("```\nx\n```"), "x");
    }
}
