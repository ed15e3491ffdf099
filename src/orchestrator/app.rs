//! 应用生命周期 - 编排层
//!
//! ## 核心功能
//!
//! 1. **加载题目目录**：失败即终止
//! 2. **获取已解决列表**：整体有时间上限，失败按空列表继续
//! 3. **加载已处理列表**：后台任务与超时竞争，超时后先继续运行
//! 4. **顺序扫描**：委托 `sweep::run_sweep`
//! 5. **清理与统计**：扫描完整结束后删除已处理列表文件，输出统计
//!
//! 浏览器会话不在这里持有，每个任务和每次获取尝试都向 `DriverFactory` 申请新会话。

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::browser::BrowserSettings;
use crate::config::Config;
use crate::error::{AppResult, DiscoveryError};
use crate::infrastructure::{DriverFactory, HeadlessChromeFactory};
use crate::models::load_catalog;
use crate::orchestrator::sweep::{run_sweep, SweepStats};
use crate::services::discovery::{standard_tiers, AcquisitionCascade};
use crate::services::generation::{CodeGenerator, OpenAiCompatClient};
use crate::store::{remove_files_best_effort, ProcessedStore};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::{FlowSettings, TaskFlow};

/// 应用主结构
pub struct App {
    config: Config,
    drivers: Arc<dyn DriverFactory>,
    generator: Arc<dyn CodeGenerator>,
    cascade: AcquisitionCascade,
}

impl App {
    /// 用真实的浏览器和生成服务初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        let drivers: Arc<dyn DriverFactory> =
            Arc::new(HeadlessChromeFactory::new(BrowserSettings {
                executable: config.chrome_executable.clone(),
            }));

        let generator: Arc<dyn CodeGenerator> = Arc::new(OpenAiCompatClient::new(
            &config.api_base,
            &config.api_key,
            &config.toolchain,
            config.generation_timeout,
        ));

        let cascade = AcquisitionCascade::new(standard_tiers(
            drivers.clone(),
            &config.solved_keyword,
        )?);

        Ok(Self::with_components(config, drivers, generator, cascade))
    }

    /// 使用给定组件组装应用
    pub fn with_components(
        config: Config,
        drivers: Arc<dyn DriverFactory>,
        generator: Arc<dyn CodeGenerator>,
        cascade: AcquisitionCascade,
    ) -> Self {
        Self {
            config,
            drivers,
            generator,
            cascade,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> AppResult<SweepStats> {
        log_startup(&self.config);

        let catalog = Arc::new(load_catalog(&self.config.catalog_path).await?);
        if catalog.is_empty() {
            warn!("⚠️ 题目目录为空，所有任务都会因找不到题目而失败");
        }

        let solved = self.discover_solved().await;

        let store = Arc::new(ProcessedStore::new(&self.config.processed_path));
        self.load_store_bounded(&store).await;
        info!("已处理任务: {:?}", store.all().await);

        let flow = TaskFlow::new(
            catalog,
            self.generator.clone(),
            self.drivers.clone(),
            store.clone(),
            FlowSettings::from_config(&self.config),
        );

        let stats = run_sweep(
            self.config.first_task_id..=self.config.last_task_id,
            &solved,
            &store,
            &flow,
            self.config.run_mode,
        )
        .await?;

        info!("所有任务处理完毕，清理已处理列表文件...");
        remove_files_best_effort(&self.config.cleanup_paths).await;

        print_final_stats(
            stats.submitted,
            stats.skipped_solved,
            stats.skipped_processed,
            stats.failed,
        );
        if stats.not_recorded > 0 {
            warn!("⚠️ {} 个任务已提交但没能写入已处理列表", stats.not_recorded);
        }

        Ok(stats)
    }

    /// 获取已解决题目，任何失败都按空集合继续
    async fn discover_solved(&self) -> BTreeSet<u32> {
        info!("🔍 获取已解决题目列表: {}", self.config.profile_url);

        let limit = self.config.discovery_timeout;
        let discovery = self
            .cascade
            .discover(&self.config.profile_url, &self.config.solved_selector);
        let result = match timeout(limit, discovery).await {
            Ok(result) => result,
            Err(_) => Err(DiscoveryError::TimedOut {
                timeout_secs: limit.as_secs(),
            }),
        };

        match result {
            Ok(ids) => {
                info!("已解决题目: {:?}", ids);
                ids
            }
            Err(e) => {
                warn!("⚠️ {}，按没有已解决题目继续", e);
                BTreeSet::new()
            }
        }
    }

    /// 在后台加载已处理列表，最多等待 `store_load_timeout`
    ///
    /// 超时后加载任务继续在后台运行，结果稍后合并进同一个存储
    async fn load_store_bounded(&self, store: &Arc<ProcessedStore>) {
        let loader = {
            let store = Arc::clone(store);
            tokio::spawn(async move { store.load().await })
        };

        let limit = self.config.store_load_timeout;
        match timeout(limit, loader).await {
            Ok(Ok(Ok(()))) => info!("✓ 已处理列表加载完成"),
            Ok(Ok(Err(e))) => warn!("⚠️ 无法加载已处理列表: {}", e),
            Ok(Err(e)) => warn!("⚠️ 已处理列表加载任务异常退出: {}", e),
            Err(_) => warn!(
                "⚠️ 加载已处理列表超过 {:?}，先继续运行（可能重复处理少量任务）",
                limit
            ),
        }
    }
}
