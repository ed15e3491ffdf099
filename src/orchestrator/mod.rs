//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用生命周期
//! - 加载题目目录、获取已解决列表、加载已处理列表（有时间上限）
//! - 构建单题流程并执行一轮扫描
//! - 扫描结束后清理已处理列表文件，输出统计
//!
//! ### `sweep` - 顺序扫描
//! - 按编号顺序遍历任务范围
//! - 跳过已解决和已处理的任务，其余交给 `TaskRunner`
//! - 按运行模式决定致命错误是终止还是跳过
//!
//! ## 层次关系
//!
//! ```text
//! app (一次运行)
//!     ↓
//! sweep (编号范围)
//!     ↓
//! workflow::TaskFlow (单个任务)
//!     ↓
//! services (能力层：discovery / generation / judge_portal)
//!     ↓
//! infrastructure (基础设施：SubmissionDriver)
//! ```

pub mod app;
pub mod sweep;

pub use app::App;
pub use sweep::{run_sweep, SweepStats};
