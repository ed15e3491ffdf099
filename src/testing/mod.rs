//! 测试替身
//!
//! 提供浏览器驱动、代码生成和单题流程的可控实现，
//! 不需要真实的浏览器或网络即可跑完整个流程。
//!
//! ```rust,ignore
//! use acmp_autosolve::testing::{FakeDriverFactory, ScriptedGenerator};
//!
//! let drivers = FakeDriverFactory::new().with_script_reply("selectedIndex", json!(3));
//! let generator = ScriptedGenerator::new(vec![Ok("int main(){}".to_string())]);
//! ```

mod fake_driver;
mod recording_runner;
mod scripted_generator;

pub use fake_driver::{FakeAction, FakeDriver, FakeDriverFactory};
pub use recording_runner::RecordingRunner;
pub use scripted_generator::ScriptedGenerator;
