//! 按顺序返回预设结果的代码生成器

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::GenerationError;
use crate::models::CatalogItem;
use crate::services::generation::CodeGenerator;

/// 每次调用依次弹出一个预设结果，并记录 (模型, max_tokens)
///
/// 预设结果用完后返回 `EmptyContent`
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl ScriptedGenerator {
    pub fn new(replies: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _item: &CatalogItem,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((model.to_string(), max_tokens));

        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(GenerationError::EmptyContent {
                    model: model.to_string(),
                })
            })
    }
}
