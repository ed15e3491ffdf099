pub mod loaders;
pub mod task;

pub use loaders::load_catalog;
pub use task::{Catalog, CatalogItem, Example};
