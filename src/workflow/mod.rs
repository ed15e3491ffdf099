pub mod task_ctx;
pub mod task_flow;

pub use task_ctx::TaskCtx;
pub use task_flow::{FlowOutcome, FlowSettings, FlowStage, TaskFlow, TaskRunner};
