//! 已解决题目列表获取
//!
//! 多层级回退：结构定位 → 脚本扫描 → 直接 HTTP 抓取

pub mod cascade;
pub mod extract;
pub mod tiers;

pub use cascade::{AcquisitionCascade, CascadeTier};
pub use extract::{extract_from_document, parse_solved_ids};
pub use tiers::{standard_tiers, HttpFetchTier, ScriptScanTier, SelectorTier};
