pub mod processed;

pub use processed::{remove_files_best_effort, ProcessedStore};
