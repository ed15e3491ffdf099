//! 任务处理上下文
//!
//! 封装"我正在处理第几号题、是本轮的第几个"这一信息

use std::fmt::Display;

/// 任务处理上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskCtx {
    /// 题目编号
    pub task_id: u32,

    /// 在本轮实际处理的任务中的序号（从1开始，仅用于日志显示）
    pub position: usize,
}

impl TaskCtx {
    pub fn new(task_id: u32, position: usize) -> Self {
        Self { task_id, position }
    }
}

impl Display for TaskCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 #{}]", self.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        assert_eq!(TaskCtx::new(42, 1).to_string(), "[任务 #42]");
    }
}
