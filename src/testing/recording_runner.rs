//! 只记录调用顺序的单题流程

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::FlowError;
use crate::workflow::{FlowOutcome, TaskCtx, TaskRunner};

/// 记录被调用的编号
///
/// `failing_on` 的编号返回 `FlowError::TaskNotFound`，
/// `unrecorded_on` 的编号返回成功但 `recorded = false`
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invoked: Mutex<Vec<u32>>,
    failing: HashSet<u32>,
    unrecorded: HashSet<u32>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, task_id: u32) -> Self {
        self.failing.insert(task_id);
        self
    }

    pub fn unrecorded_on(mut self, task_id: u32) -> Self {
        self.unrecorded.insert(task_id);
        self
    }

    pub fn invoked(&self) -> Vec<u32> {
        self.invoked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl TaskRunner for RecordingRunner {
    async fn run_task(&self, ctx: &TaskCtx) -> Result<FlowOutcome, FlowError> {
        self.invoked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(ctx.task_id);

        if self.failing.contains(&ctx.task_id) {
            return Err(FlowError::TaskNotFound(ctx.task_id));
        }
        Ok(FlowOutcome {
            recorded: !self.unrecorded.contains(&ctx.task_id),
            language_index: None,
        })
    }
}
