//! 顺序扫描任务范围
//!
//! 任务严格按编号顺序一个接一个处理，同一时刻只有一个任务在运行。

use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use tracing::{error, info, warn};

use crate::config::RunMode;
use crate::error::FlowError;
use crate::store::ProcessedStore;
use crate::workflow::{TaskCtx, TaskRunner};

/// 扫描统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub submitted: usize,
    pub skipped_solved: usize,
    pub skipped_processed: usize,
    pub failed: usize,
    /// 已提交但没能写入已处理列表
    pub not_recorded: usize,
}

/// 跳过原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    Solved,
    Processed,
}

async fn skip_reason(id: u32, solved: &BTreeSet<u32>, store: &ProcessedStore) -> Option<Skip> {
    if solved.contains(&id) {
        Some(Skip::Solved)
    } else if store.is_processed(id).await {
        Some(Skip::Processed)
    } else {
        None
    }
}

/// 扫描编号范围
///
/// 已解决或已处理的编号直接跳过，其余编号交给 `runner`。
/// `AbortOnFatal` 模式下第一个失败的任务会终止扫描并返回其错误；
/// `SkipFailedItem` 模式下失败只计数，继续下一个编号。
pub async fn run_sweep(
    range: RangeInclusive<u32>,
    solved: &BTreeSet<u32>,
    store: &ProcessedStore,
    runner: &dyn TaskRunner,
    mode: RunMode,
) -> Result<SweepStats, FlowError> {
    let mut stats = SweepStats::default();
    let mut position = 0;

    for id in range {
        match skip_reason(id, solved, store).await {
            Some(Skip::Solved) => {
                info!("[任务 #{}] ⏭️ 已解决，跳过", id);
                stats.skipped_solved += 1;
                continue;
            }
            Some(Skip::Processed) => {
                info!("[任务 #{}] ⏭️ 已处理，跳过", id);
                stats.skipped_processed += 1;
                continue;
            }
            None => {}
        }

        position += 1;
        let ctx = TaskCtx::new(id, position);
        info!("\n{} ▶ 开始处理 (本轮第 {} 个)", ctx, position);

        match runner.run_task(&ctx).await {
            Ok(outcome) => {
                stats.submitted += 1;
                if !outcome.recorded {
                    stats.not_recorded += 1;
                }
            }
            Err(e) => match mode {
                RunMode::AbortOnFatal => {
                    error!("{} ❌ 致命错误，终止运行: {}", ctx, e);
                    return Err(e);
                }
                RunMode::SkipFailedItem => {
                    warn!("{} ❌ 处理失败，继续下一个: {}", ctx, e);
                    stats.failed += 1;
                }
            },
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingRunner;
    use tokio_test::assert_ok;

    async fn store_with(ids: &[u32]) -> (tempfile::TempDir, ProcessedStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.json");
        tokio::fs::write(&path, serde_json::to_vec(ids).unwrap())
            .await
            .unwrap();
        let store = ProcessedStore::new(path);
        assert_ok!(store.load().await);
        (dir, store)
    }

    #[tokio::test]
    async fn test_skips_solved_and_processed() {
        let (_dir, store) = store_with(&[5, 7]).await;
        let runner = RecordingRunner::new();

        let stats = run_sweep(
            1..=8,
            &BTreeSet::from([3]),
            &store,
            &runner,
            RunMode::AbortOnFatal,
        )
        .await
        .unwrap();

        assert_eq!(runner.invoked(), vec![1, 2, 4, 6, 8]);
        assert_eq!(
            stats,
            SweepStats {
                submitted: 5,
                skipped_solved: 1,
                skipped_processed: 2,
                failed: 0,
                not_recorded: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_abort_mode_stops_at_first_failure() {
        let (_dir, store) = store_with(&[]).await;
        let runner = RecordingRunner::new().failing_on(3);

        let err = run_sweep(1..=6, &BTreeSet::new(), &store, &runner, RunMode::AbortOnFatal)
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::TaskNotFound(3)));
        assert_eq!(runner.invoked(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_skip_mode_continues_after_failure() {
        let (_dir, store) = store_with(&[]).await;
        let runner = RecordingRunner::new().failing_on(2).failing_on(4);

        let stats = run_sweep(
            1..=5,
            &BTreeSet::new(),
            &store,
            &runner,
            RunMode::SkipFailedItem,
        )
        .await
        .unwrap();

        assert_eq!(runner.invoked(), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_unrecorded_items_are_counted() {
        let (_dir, store) = store_with(&[]).await;
        let runner = RecordingRunner::new().unrecorded_on(1);

        let stats = run_sweep(1..=2, &BTreeSet::new(), &store, &runner, RunMode::AbortOnFatal)
            .await
            .unwrap();

        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.not_recorded, 1);
    }
}
