//! 业务能力层（Services）
//!
//! 描述"我能做什么"，每个能力只处理一件事：
//! - `discovery` - 获取已解决题目编号（三层回退）
//! - `generation` - 调用生成服务得到解答代码
//! - `judge_portal` - 在评测站点上登录、选语言、写代码、提交

pub mod discovery;
pub mod generation;
pub mod judge_portal;

pub use discovery::AcquisitionCascade;
pub use generation::{CodeGenerator, GenerationPolicy, OpenAiCompatClient};
pub use judge_portal::{JudgePortal, LoginOutcome, PortalTimings};
