//! 单题处理流程 - 流程层
//!
//! 核心职责：定义"一道题"的完整处理流程
//!
//! 流程顺序：
//! 1. Lookup   - 在题目目录中找到题目
//! 2. Generate - 调用生成服务（额度不足时切换备用模型）
//! 3. Submit   - 在新的浏览器会话中打开题目页、登录、选语言、写代码、提交
//! 4. Record   - 写入已处理列表（失败不致命）
//! 5. Done
//!
//! 状态只向前推进。Lookup、Generate、Submit 阶段的错误原样返回给编排层。

use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FlowError;
use crate::infrastructure::driver::{DriverFactory, SubmissionDriver};
use crate::models::Catalog;
use crate::services::generation::{
    generate_with_fallback, strip_code_fence, CodeGenerator, GenerationPolicy,
};
use crate::services::judge_portal::JudgePortal;
use crate::store::ProcessedStore;
use crate::utils::logging::truncate_text;
use crate::workflow::task_ctx::TaskCtx;

/// 流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Lookup,
    Generate,
    Submit,
    Record,
    Done,
}

impl Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlowStage::Lookup => "查找题目",
            FlowStage::Generate => "生成代码",
            FlowStage::Submit => "提交解答",
            FlowStage::Record => "记录进度",
            FlowStage::Done => "完成",
        };
        f.write_str(name)
    }
}

/// 单题处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOutcome {
    /// 是否成功写入已处理列表
    pub recorded: bool,
    /// 选中的编译器选项下标，没有匹配的选项时为 None
    pub language_index: Option<usize>,
}

/// 编排层看到的单题处理能力
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, ctx: &TaskCtx) -> Result<FlowOutcome, FlowError>;
}

/// 流程参数
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub policy: GenerationPolicy,
    pub portal: JudgePortal,
    /// 题目页面地址模板，`{id}` 会被替换成题目编号
    pub task_url_template: String,
    /// 整个提交阶段的上限，与获取已解决列表的上限相互独立
    pub submission_timeout: Duration,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: GenerationPolicy {
                primary_model: config.model.clone(),
                fallback_model: config.fallback_model.clone(),
                max_tokens: config.max_tokens,
                fallback_max_tokens: config.fallback_max_tokens,
            },
            portal: JudgePortal::from_config(config),
            task_url_template: config.task_url_template.clone(),
            submission_timeout: config.submission_timeout,
        }
    }
}

/// 单题处理流程
///
/// - 不持有浏览器会话，每次提交都向 `DriverFactory` 申请新会话并在结束时关闭
/// - 只依赖业务能力（services）和存储
pub struct TaskFlow {
    catalog: Arc<Catalog>,
    generator: Arc<dyn CodeGenerator>,
    drivers: Arc<dyn DriverFactory>,
    store: Arc<ProcessedStore>,
    settings: FlowSettings,
}

impl TaskFlow {
    pub fn new(
        catalog: Arc<Catalog>,
        generator: Arc<dyn CodeGenerator>,
        drivers: Arc<dyn DriverFactory>,
        store: Arc<ProcessedStore>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            catalog,
            generator,
            drivers,
            store,
            settings,
        }
    }

    fn enter(&self, ctx: &TaskCtx, stage: FlowStage) {
        debug!("{} → {}", ctx, stage);
    }

    fn task_url(&self, task_id: u32) -> String {
        self.settings
            .task_url_template
            .replace("{id}", &task_id.to_string())
    }

    pub async fn run(&self, ctx: &TaskCtx) -> Result<FlowOutcome, FlowError> {
        // ========== Lookup ==========
        self.enter(ctx, FlowStage::Lookup);
        let item = self
            .catalog
            .find(ctx.task_id)
            .ok_or(FlowError::TaskNotFound(ctx.task_id))?;
        info!("{} 📖 {}", ctx, item.name);

        // ========== Generate ==========
        self.enter(ctx, FlowStage::Generate);
        info!("{} 🤖 正在生成解答...", ctx);
        let raw = generate_with_fallback(self.generator.as_ref(), item, &self.settings.policy)
            .await?;
        let code = strip_code_fence(&raw);
        info!("{} ✓ 生成完成，{} 个字符", ctx, code.chars().count());
        debug!("{} 代码预览: {}", ctx, truncate_text(&code, 200));

        // ========== Submit ==========
        self.enter(ctx, FlowStage::Submit);
        let language_index = self.submit_in_fresh_session(ctx, &code).await?;

        // ========== Record ==========
        self.enter(ctx, FlowStage::Record);
        let recorded = match self.store.mark_processed(ctx.task_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} ⚠️ 写入已处理列表失败: {}", ctx, e);
                false
            }
        };

        self.enter(ctx, FlowStage::Done);
        info!("{} ✅ 处理完成", ctx);
        Ok(FlowOutcome {
            recorded,
            language_index,
        })
    }

    /// 申请新会话执行提交，无论结果如何都关闭会话
    async fn submit_in_fresh_session(
        &self,
        ctx: &TaskCtx,
        code: &str,
    ) -> Result<Option<usize>, FlowError> {
        let driver = self.drivers.open().await.map_err(FlowError::Session)?;

        let limit = self.settings.submission_timeout;
        let result = match timeout(limit, self.drive_submission(driver.as_ref(), ctx, code)).await
        {
            Ok(result) => result,
            Err(_) => Err(FlowError::SubmissionTimedOut {
                timeout_secs: limit.as_secs(),
            }),
        };

        if let Err(e) = driver.close().await {
            warn!("{} 关闭浏览器会话失败: {}", ctx, e);
        }
        result
    }

    async fn drive_submission(
        &self,
        driver: &dyn SubmissionDriver,
        ctx: &TaskCtx,
        code: &str,
    ) -> Result<Option<usize>, FlowError> {
        let portal = &self.settings.portal;
        let url = self.task_url(ctx.task_id);

        info!("{} 🌐 打开题目页面", ctx);
        portal.open_task_page(driver, &url).await?;
        portal.login_if_needed(driver).await?;
        let language_index = portal.select_toolchain(driver).await?;
        portal.inject_solution(driver, code).await?;

        info!("{} 📤 提交解答...", ctx);
        portal.submit(driver).await?;
        info!("{} ✓ 解答已提交", ctx);
        Ok(language_index)
    }
}

#[async_trait]
impl TaskRunner for TaskFlow {
    async fn run_task(&self, ctx: &TaskCtx) -> Result<FlowOutcome, FlowError> {
        self.run(ctx).await
    }
}
