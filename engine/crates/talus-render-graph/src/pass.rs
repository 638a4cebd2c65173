//! Pass 定义
//!
//! Pass 是渲染图中的调度单元，生命周期：
//!
//! constructed → `bind_resources`（解析逻辑资源、累加属性需求）
//! → `on_reserve_descriptor_sets`（一次）
//! → `on_resources_initialized`（物理资源就绪，可以读 mapped 指针）
//! → 每帧：`on_pre_record`（声明本帧访问）→ `on_record`（录制 GPU 命令）。
//!
//! pass 持有的是 slotmap 句柄，不是资源引用；
//! 物理资源在录制时通过 [`RgPassContext`] 的 resource manager 解析。

use talus_gfx::commands::command_buffer::GfxCommandBuffer;
use talus_gfx::foundation::gfx_context::GfxContext;

use crate::resource_manager::RgResourceManager;

/// Pass 执行时的上下文
pub struct RgPassContext<'a> {
    pub gfx: &'a GfxContext,

    /// 共享的 primary 命令缓冲区（已经 begin）
    pub cmd: &'a GfxCommandBuffer,

    /// 本 pass 申请的 secondary 命令缓冲区切片
    pub secondary_cmds: &'a [GfxCommandBuffer],

    /// 资源管理器，用于解析物理资源
    pub resource_manager: &'a RgResourceManager,
}

/// 渲染图中的一个 pass
///
/// `on_pre_record` 每帧都会调用，声明的访问可以逐帧变化
/// （例如 acquire 到的 swapchain image 不同）。
/// 到 `on_record` 时，图插入的 barrier 已经保证资源处于正确的 layout。
pub trait RgPass {
    /// 解析逻辑资源句柄并声明属性需求
    ///
    /// 在 `init_resources` 之前调用一次。
    fn bind_resources(&mut self, resource_manager: &mut RgResourceManager);

    /// 需要的 secondary 命令缓冲区数量，executor 据此向池申请
    fn secondary_cmd_count(&self) -> u32 {
        0
    }

    /// 预留 descriptor sets（描述符管线在引擎之外，默认空实现）
    fn on_reserve_descriptor_sets(&mut self) {}

    /// 物理资源创建完毕后的回调；从这里开始可以读取 buffer 的 mapped 指针
    fn on_resources_initialized(&mut self, _ctx: &GfxContext, _resource_manager: &mut RgResourceManager) {}

    /// 声明本帧的资源访问
    fn on_pre_record(&mut self, resource_manager: &mut RgResourceManager, pass_idx: u32);

    /// 录制本帧的 GPU 命令
    fn on_record(&self, ctx: &RgPassContext<'_>);
}
