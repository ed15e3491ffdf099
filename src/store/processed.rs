//! 已处理任务列表 - 持久化存储
//!
//! 文件内容是整数 JSON 数组，每次标记都会完整重写。
//! 写入先落到同目录的临时文件再 rename，崩溃时旧文件保持完整。

use crate::error::StoreError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct State {
    ids: BTreeSet<u32>,
    loaded: bool,
}

/// 已处理任务存储
///
/// - `load()` 幂等，第二次调用直接返回
/// - 读取不会等待文件 IO，加载过程中读到的是已合并的部分
/// - 加载和写入都由 `write_guard` 串行化，写入前磁盘上的集合一定已经合并进内存
#[derive(Debug)]
pub struct ProcessedStore {
    path: PathBuf,
    state: RwLock<State>,
    write_guard: Mutex<()>,
}

impl ProcessedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(State::default()),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从文件加载已处理列表
    ///
    /// 文件不存在时视为空列表；内容不是整数数组时返回错误
    pub async fn load(&self) -> Result<(), StoreError> {
        if self.state.read().await.loaded {
            return Ok(());
        }

        let _writer = self.write_guard.lock().await;
        if self.state.read().await.loaded {
            return Ok(());
        }

        let ids = self.read_file().await?;
        self.merge_loaded(ids).await;
        Ok(())
    }

    #[cfg(test)]
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    pub async fn is_processed(&self, id: u32) -> bool {
        self.state.read().await.ids.contains(&id)
    }

    pub async fn all(&self) -> BTreeSet<u32> {
        self.state.read().await.ids.clone()
    }

    /// 标记任务为已处理，并把完整集合写回文件
    ///
    /// 如果还没有加载过，先合并磁盘上的集合再写，避免覆盖已有记录
    pub async fn mark_processed(&self, id: u32) -> Result<(), StoreError> {
        let _writer = self.write_guard.lock().await;

        if !self.state.read().await.loaded {
            match self.read_file().await {
                Ok(ids) => self.merge_loaded(ids).await,
                Err(e) => warn!("标记前无法读取已处理列表，按内存集合写入: {}", e),
            }
        }

        let snapshot: Vec<u32> = {
            let mut state = self.state.write().await;
            state.ids.insert(id);
            state.ids.iter().copied().collect()
        };

        let data = serde_json::to_vec(&snapshot)?;
        self.write_atomic(&data).await
    }

    /// 调用方必须持有 `write_guard`
    async fn read_file(&self) -> Result<Vec<u32>, StoreError> {
        match fs::read(&self.path).await {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(data) => {
                serde_json::from_slice::<Vec<u32>>(&data).map_err(|source| StoreError::Malformed {
                    path: self.path.display().to_string(),
                    source,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("已处理列表文件不存在: {}", self.path.display());
                Ok(Vec::new())
            }
            Err(source) => Err(StoreError::ReadFailed {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }

    async fn merge_loaded(&self, ids: Vec<u32>) {
        let mut state = self.state.write().await;
        state.ids.extend(ids);
        state.loaded = true;
    }

    async fn write_atomic(&self, data: &[u8]) -> Result<(), StoreError> {
        let write_failed = |source| StoreError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("processed");
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        fs::write(&tmp_path, data).await.map_err(write_failed)?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(write_failed)?;
        Ok(())
    }
}

/// 尽力删除文件，文件不存在不算错误
///
/// 返回实际删除的文件数量
pub async fn remove_files_best_effort(paths: &[PathBuf]) -> usize {
    let mut removed = 0;
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => {
                info!("文件 {} 已删除", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("文件 {} 不存在 (ok)", path.display());
            }
            Err(e) => warn!("无法删除文件 {}: {}", path.display(), e),
        }
    }
    if removed == 0 {
        info!("检查的路径中没有找到已处理列表文件");
    }
    removed
}
