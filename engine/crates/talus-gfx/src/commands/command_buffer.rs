use ash::vk;
use itertools::Itertools;
use std::ffi::CString;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use crate::foundation::device::GfxDevice;

/// 命令缓冲区封装
///
/// 本体归 [`super::command_pool::GfxCommandPool`] 所有，
/// 这里只是句柄 + level 的轻量拷贝，不负责释放。
#[derive(Clone, Copy)]
pub struct GfxCommandBuffer {
    handle: vk::CommandBuffer,
    level: vk::CommandBufferLevel,
}

impl GfxCommandBuffer {
    pub(crate) fn new(handle: vk::CommandBuffer, level: vk::CommandBufferLevel) -> Self {
        Self { handle, level }
    }

    #[inline]
    pub fn vk_handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    #[inline]
    pub fn level(&self) -> vk::CommandBufferLevel {
        self.level
    }
}

// 录制
impl GfxCommandBuffer {
    pub fn begin(&self, device: &GfxDevice, flags: vk::CommandBufferUsageFlags) {
        // secondary buffer 必须携带 inheritance info；
        // 引擎只使用 compute/transfer 工作负载，render pass 保持 null
        let inheritance = vk::CommandBufferInheritanceInfo::default();
        let mut begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        if self.level == vk::CommandBufferLevel::SECONDARY {
            begin_info = begin_info.inheritance_info(&inheritance);
        }
        unsafe {
            device.begin_command_buffer(self.handle, &begin_info).unwrap();
        }
    }

    pub fn end(&self, device: &GfxDevice) {
        unsafe {
            device.end_command_buffer(self.handle).unwrap();
        }
    }

    /// 将 buffer/image barrier 合并为一条 `vkCmdPipelineBarrier2`
    pub fn pipeline_barrier2(
        &self,
        device: &GfxDevice,
        buffer_barriers: &[GfxBufferBarrier],
        image_barriers: &[GfxImageBarrier],
    ) {
        if buffer_barriers.is_empty() && image_barriers.is_empty() {
            return;
        }

        let vk_buffer_barriers = buffer_barriers.iter().map(|b| b.vk_barrier()).collect_vec();
        let vk_image_barriers = image_barriers.iter().map(|b| b.vk_barrier()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .buffer_memory_barriers(&vk_buffer_barriers)
            .image_memory_barriers(&vk_image_barriers);

        unsafe {
            device.cmd_pipeline_barrier2(self.handle, &dependency_info);
        }
    }

    /// 在 primary buffer 中执行一批 secondary buffer
    pub fn execute_commands(&self, device: &GfxDevice, secondaries: &[GfxCommandBuffer]) {
        debug_assert!(self.level == vk::CommandBufferLevel::PRIMARY);
        if secondaries.is_empty() {
            return;
        }

        let handles = secondaries.iter().map(|cmd| cmd.handle).collect_vec();
        unsafe {
            device.cmd_execute_commands(self.handle, &handles);
        }
    }
}

// debug label
impl GfxCommandBuffer {
    pub fn begin_label(&self, device: &GfxDevice, name: &str, color: [f32; 4]) {
        let name = CString::new(name).unwrap();
        let label = vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(color);
        unsafe {
            device.debug_utils().cmd_begin_debug_utils_label(self.handle, &label);
        }
    }

    pub fn end_label(&self, device: &GfxDevice) {
        unsafe {
            device.debug_utils().cmd_end_debug_utils_label(self.handle);
        }
    }
}
