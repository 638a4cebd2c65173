//! 渲染图编排
//!
//! [`RenderGraph`] 把各组件串起来：
//! 注册 pass（注册顺序就是每帧的执行顺序），
//! `init` 做一次性的资源创建与初始 layout 迁移，
//! 之后每帧调用 `render_frame` 驱动
//! 声明访问 → 调度任务 → 批量提交。

use ash::vk;
use itertools::Itertools;

use talus_gfx::foundation::gfx_context::GfxContext;
use talus_gfx::swapchain::present_target::{GfxAcquireStatus, PresentTarget};

use talus_gfx::basic::color::LabelColor;

use crate::debug_fmt::format_stage_flags;
use crate::executor::{RgExecutor, RgSemaphoreInfo, RgTaskDesc};
use crate::pass::{RgPass, RgPassContext};
use crate::resource_manager::RgResourceManager;

/// 一帧的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// 正常提交
    Rendered,
    /// 呈现图像获取失败（suboptimal / 超时），本帧跳过
    Skipped,
}

/// 已注册的 pass 及其调度信息
struct RgPassNode {
    name: String,
    pass: Box<dyn RgPass>,
    stage_flags: vk::PipelineStageFlags2,
    external_wait: Option<RgSemaphoreInfo>,
    external_signal: Option<RgSemaphoreInfo>,
}

pub struct RenderGraph {
    passes: Vec<RgPassNode>,
    resources: RgResourceManager,
    executor: RgExecutor,
    initialized: bool,
}

// new & 注册
impl RenderGraph {
    pub fn new(ctx: &GfxContext) -> Self {
        Self {
            passes: Vec::new(),
            resources: RgResourceManager::new(),
            executor: RgExecutor::new(ctx),
            initialized: false,
        }
    }

    /// 图构建阶段访问资源管理器，注册逻辑资源
    #[inline]
    pub fn resources(&mut self) -> &mut RgResourceManager {
        &mut self.resources
    }

    /// 注册一个 pass，返回其索引（即提交顺序中的位置）
    pub fn add_pass(
        &mut self,
        name: impl Into<String>,
        pass: Box<dyn RgPass>,
        stage_flags: vk::PipelineStageFlags2,
        external_signal: Option<RgSemaphoreInfo>,
        external_wait: Option<RgSemaphoreInfo>,
    ) -> u32 {
        assert!(!self.initialized, "RenderGraph: add_pass after init");

        let pass_idx = self.passes.len() as u32;
        self.passes.push(RgPassNode {
            name: name.into(),
            pass,
            stage_flags,
            external_wait,
            external_signal,
        });
        pass_idx
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}

// 初始化
impl RenderGraph {
    /// 一次性初始化
    ///
    /// 解析资源绑定、创建物理资源，然后把每个 image 从 `UNDEFINED`
    /// 迁移到它第一次被访问时需要的 layout：
    /// 初始声明 flush 出的 barrier 落在哨兵槽位，
    /// 通过同步的一次性提交统一录制。
    pub fn init(&mut self, ctx: &GfxContext, present: &dyn PresentTarget) {
        assert!(!self.initialized, "RenderGraph: init called twice");
        let _span = tracy_client::span!("RenderGraph::init");

        // 资源绑定与 descriptor 预留
        for node in &mut self.passes {
            node.pass.bind_resources(&mut self.resources);
        }
        for node in &mut self.passes {
            node.pass.on_reserve_descriptor_sets();
        }

        // 物理资源创建 + image synchronizer 种子
        self.resources.init_resources(ctx, present, self.passes.len());

        for node in &mut self.passes {
            node.pass.on_resources_initialized(ctx, &mut self.resources);
        }

        // 让每个 pass 声明一次 frame 0 的访问：
        // 种子访问被 flush，初始 layout 迁移积累到哨兵槽位
        for (pass_idx, node) in self.passes.iter_mut().enumerate() {
            node.pass.on_pre_record(&mut self.resources, pass_idx as u32);
        }

        let sentinel_idx = self.passes.len();
        let resources = &mut self.resources;
        self.executor.execute_one_time(ctx, 0, |cmd, _| {
            resources.record_pass_barriers(ctx.device(), cmd, sentinel_idx);
        });

        log::info!("render graph initialized: {} passes, {} resources", self.passes.len(), self.resources.resource_count());
        self.initialized = true;
    }
}

// 帧循环
impl RenderGraph {
    /// 渲染一帧
    ///
    /// 获取呈现图像失败（suboptimal / 超时）时返回
    /// [`FrameStatus::Skipped`]，调用方下一帧重试即可。
    /// 稳态下本函数不会阻塞 CPU。
    pub fn render_frame(&mut self, ctx: &GfxContext, present: &mut dyn PresentTarget) -> FrameStatus {
        assert!(self.initialized, "RenderGraph: render_frame before init");
        let _span = tracy_client::span!("RenderGraph::render_frame");

        match present.acquire_next() {
            GfxAcquireStatus::Ready(_image_index) => {}
            GfxAcquireStatus::Suboptimal | GfxAcquireStatus::Timeout => {
                log::warn!("presentation image unavailable, skipping frame");
                return FrameStatus::Skipped;
            }
        }

        // 声明本帧访问：上一帧的未 flush 访问在这里被顶出，
        // barrier 落到各自产生方 pass 的槽位
        for (pass_idx, node) in self.passes.iter_mut().enumerate() {
            node.pass.on_pre_record(&mut self.resources, pass_idx as u32);
        }

        // 调度：每个 pass 一个任务，保持注册顺序
        for node in &self.passes {
            self.executor.schedule_task(RgTaskDesc {
                stage_flags: node.stage_flags,
                external_wait: node.external_wait,
                external_signal: node.external_signal,
                secondary_cmd_count: node.pass.secondary_cmd_count(),
            });
        }

        // 录制并提交；pass 工作负载之后紧跟它名下的 post-pass barrier
        let Self {
            passes,
            resources,
            executor,
            ..
        } = self;
        executor.execute(ctx, |task_idx, cmd, secondary_cmds| {
            let node = &passes[task_idx];
            cmd.begin_label(ctx.device(), &node.name, LabelColor::COLOR_PASS);

            let pass_ctx = RgPassContext {
                gfx: ctx,
                cmd,
                secondary_cmds,
                resource_manager: resources,
            };
            node.pass.on_record(&pass_ctx);

            resources.record_pass_barriers(ctx.device(), cmd, task_idx);
            cmd.end_label(ctx.device());
        });

        FrameStatus::Rendered
    }
}

// 调试
impl RenderGraph {
    /// 打印执行计划：pass 顺序、stage、semaphore 依赖与暂存的 barrier 数量
    pub fn log_execution_plan(&self) {
        log::info!("========== RenderGraph Execution Plan ==========");
        log::info!(
            "order: [{}]",
            self.passes.iter().map(|node| node.name.as_str()).join(" → ")
        );

        for (pass_idx, node) in self.passes.iter().enumerate() {
            let semaphores = match (&node.external_wait, &node.external_signal) {
                (Some(_), Some(_)) => " [wait+signal]",
                (Some(_), None) => " [wait]",
                (None, Some(_)) => " [signal]",
                (None, None) => "",
            };
            log::info!("  [{}] \"{}\" @ {}{}", pass_idx, node.name, format_stage_flags(node.stage_flags), semaphores);

            if self.resources.is_initialized() {
                let (buffer_barriers, image_barriers) = self.resources.pending_barrier_counts(pass_idx);
                if buffer_barriers + image_barriers > 0 {
                    log::info!("      pending barriers: {} buffer, {} image", buffer_barriers, image_barriers);
                }
            }
        }
        log::info!("================================================");
    }
}

// destroy
impl RenderGraph {
    pub fn destroy(self, ctx: &GfxContext) {
        ctx.wait_idle();
        self.executor.destroy(ctx);
        self.resources.destroy(ctx);
    }
}
