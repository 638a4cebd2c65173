use ash::vk;
use itertools::Itertools;

use crate::commands::command_buffer::GfxCommandBuffer;

/// Gfx 关于 submitInfo 的封装，更易用
///
/// 一个 `GfxSubmitInfo` 对应 `vkQueueSubmit2` 的一个 batch；
/// 多个 batch 交给 `GfxContext::submit` 作为一次提交。
#[derive(Default)]
pub struct GfxSubmitInfo {
    command_buffer_infos: Vec<vk::CommandBufferSubmitInfo<'static>>,
    wait_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signal_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        let command_buffer_infos = commands
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd.vk_handle()))
            .collect_vec();

        Self {
            command_buffer_infos,
            wait_infos: vec![],
            signal_infos: vec![],
        }
    }

    #[inline]
    pub fn submit_info(&self) -> vk::SubmitInfo2<'_> {
        vk::SubmitInfo2::default()
            .command_buffer_infos(&self.command_buffer_infos)
            .wait_semaphore_infos(&self.wait_infos)
            .signal_semaphore_infos(&self.signal_infos)
    }

    #[inline]
    pub fn wait(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.wait_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }

    #[inline]
    pub fn signal(mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: Option<u64>) -> Self {
        self.signal_infos.push(
            vk::SemaphoreSubmitInfo::default()
                .semaphore(semaphore)
                .stage_mask(stage)
                .value(value.unwrap_or_default()),
        );
        self
    }
}
