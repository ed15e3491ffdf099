//! # ACMP Autosolve
//!
//! 按编号顺序为评测站点上尚未解决的题目生成解答并自动提交
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动隔离的无头浏览器
//! - `infrastructure/` - `SubmissionDriver` 抽象驱动与 chromiumoxide 实现，只暴露能力
//!
//! ### ② 业务能力层（Services）
//! - `discovery` - 三层回退获取已解决题目编号
//! - `generation` - 调用生成服务，额度不足时切换备用模型
//! - `judge_portal` - 按逻辑角色操作评测站点（登录、选语言、写代码、提交）
//!
//! ### ③ 流程层（Workflow）
//! - `TaskCtx` - 上下文封装（任务编号 + 本轮序号）
//! - `TaskFlow` - 单题状态机（Lookup → Generate → Submit → Record → Done）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/sweep` - 顺序扫描，跳过已解决/已处理的任务
//! - `orchestrator/app` - 启动竞争、运行模式、结束清理
//!
//! `store/` 持有已处理任务列表，`testing/` 提供不依赖浏览器和网络的替身实现。

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod testing;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, Locators, RunMode};
pub use error::{AppError, AppResult, FlowError};
pub use infrastructure::{DriverFactory, SubmissionDriver};
pub use models::{Catalog, CatalogItem};
pub use orchestrator::{run_sweep, App, SweepStats};
pub use services::AcquisitionCascade;
pub use store::ProcessedStore;
pub use workflow::{TaskCtx, TaskFlow, TaskRunner};
