//! 多层级回退获取
//!
//! 层级严格按顺序尝试，每一层有自己的尝试次数和超时；
//! 第一层返回非空文本后，后面的层级不再调用。

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::services::discovery::extract::parse_solved_ids;
use crate::utils::logging::preview_head_tail;

/// 单个回退层级
#[async_trait]
pub trait CascadeTier: Send + Sync {
    /// 层级名称（用于日志）
    fn name(&self) -> &str;

    /// 每次尝试的超时时间，长度即尝试次数
    fn attempt_timeouts(&self) -> Vec<Duration>;

    /// 执行一次尝试，返回包含编号的原始文本
    async fn attempt(&self, location: &str, hint: &str) -> anyhow::Result<String>;
}

/// 已解决列表获取器
pub struct AcquisitionCascade {
    tiers: Vec<Box<dyn CascadeTier>>,
    backoff_unit: Duration,
}

impl AcquisitionCascade {
    pub fn new(tiers: Vec<Box<dyn CascadeTier>>) -> Self {
        Self {
            tiers,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// 失败后等待 `第几次尝试 × backoff_unit`
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// 获取已解决题目编号
    ///
    /// 所有层级都没有拿到数字时返回 `SolvedListNotFound`，调用方应当视为可恢复
    pub async fn discover(
        &self,
        location: &str,
        hint: &str,
    ) -> Result<BTreeSet<u32>, DiscoveryError> {
        let text = self
            .first_non_empty(location, hint)
            .await
            .ok_or(DiscoveryError::SolvedListNotFound)?;

        let ids = parse_solved_ids(&text);
        if ids.is_empty() {
            warn!("获取到的文本中没有题目编号");
            return Err(DiscoveryError::SolvedListNotFound);
        }
        info!("✓ 获取到 {} 道已解决题目", ids.len());
        Ok(ids)
    }

    async fn first_non_empty(&self, location: &str, hint: &str) -> Option<String> {
        for tier in &self.tiers {
            let timeouts = tier.attempt_timeouts();
            let total = timeouts.len();

            for (attempt, limit) in timeouts.into_iter().enumerate() {
                let outcome = timeout(limit, tier.attempt(location, hint)).await;
                match outcome {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        info!(
                            "{} 第 {}/{} 次尝试成功，原始字符数={}",
                            tier.name(),
                            attempt + 1,
                            total,
                            text.chars().count()
                        );
                        debug!("原始文本: {}", preview_head_tail(text.trim(), 400));
                        return Some(text);
                    }
                    Ok(Ok(_)) => warn!(
                        "{} 第 {}/{} 次尝试返回空文本",
                        tier.name(),
                        attempt + 1,
                        total
                    ),
                    Ok(Err(e)) => warn!(
                        "{} 第 {}/{} 次尝试失败: {:#}",
                        tier.name(),
                        attempt + 1,
                        total,
                        e
                    ),
                    Err(_) => warn!(
                        "{} 第 {}/{} 次尝试超时 ({:?})",
                        tier.name(),
                        attempt + 1,
                        total,
                        limit
                    ),
                }
                sleep(self.backoff_unit * (attempt as u32 + 1)).await;
            }
        }
        None
    }
}
