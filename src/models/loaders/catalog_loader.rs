use crate::error::CatalogError;
use crate::models::task::{Catalog, CatalogItem};
use std::path::Path;
use tokio::fs;

/// 从 JSON 文件加载题目目录
///
/// 文件内容是 `CatalogItem` 数组；读取或解析失败都属于致命错误
pub async fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

    let items: Vec<CatalogItem> =
        serde_json::from_str(&content).map_err(|source| CatalogError::ParseFailed {
            path: path.display().to_string(),
            source,
        })?;

    tracing::info!("成功加载 {} 道题目: {}", items.len(), path.display());

    Ok(Catalog::new(items))
}
