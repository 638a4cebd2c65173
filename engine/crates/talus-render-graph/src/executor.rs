//! 批量提交执行器
//!
//! 调度到的任务按照 semaphore 依赖切分为若干 batch：
//! 没有外部 semaphore 的连续任务合并进同一个 primary 命令缓冲区，
//! 携带 semaphore 的任务成为 batch 边界。
//! 所有 batch 作为一次 `vkQueueSubmit2` 提交，共享一个完成 fence；
//! 命令缓冲区带着这个 fence 归还给池，保证 GPU 用完之前不会被复用。

use ash::vk;

use talus_gfx::commands::command_buffer::GfxCommandBuffer;
use talus_gfx::commands::command_pool::GfxCommandPool;
use talus_gfx::commands::fence::GfxFence;
use talus_gfx::commands::submit_info::GfxSubmitInfo;
use talus_gfx::foundation::gfx_context::GfxContext;

/// 外部 semaphore 依赖
#[derive(Clone, Copy, Debug)]
pub struct RgSemaphoreInfo {
    /// Vulkan semaphore 原始句柄
    pub semaphore: vk::Semaphore,
    /// 等待/触发的 pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Timeline semaphore 的值（binary semaphore 为 None）
    pub value: Option<u64>,
}

impl RgSemaphoreInfo {
    /// 创建 binary semaphore 依赖
    #[inline]
    pub fn binary(semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            semaphore,
            stage,
            value: None,
        }
    }

    /// 创建 timeline semaphore 依赖
    #[inline]
    pub fn timeline(semaphore: vk::Semaphore, stage: vk::PipelineStageFlags2, value: u64) -> Self {
        Self {
            semaphore,
            stage,
            value: Some(value),
        }
    }
}

/// 一个已调度、尚未执行的任务
#[derive(Clone, Copy, Debug, Default)]
pub struct RgTaskDesc {
    /// 任务工作负载所在的 pipeline stage
    pub stage_flags: vk::PipelineStageFlags2,
    /// 提交前等待的外部 semaphore
    pub external_wait: Option<RgSemaphoreInfo>,
    /// 完成后触发的外部 semaphore
    pub external_signal: Option<RgSemaphoreInfo>,
    /// 需要的 secondary 命令缓冲区数量
    pub secondary_cmd_count: u32,
}

impl RgTaskDesc {
    /// 是否携带外部 semaphore，即是否构成 batch 边界
    #[inline]
    pub fn has_semaphore_operations(&self) -> bool {
        self.external_wait.is_some() || self.external_signal.is_some()
    }
}

/// 把任务列表切分为 batch
///
/// batch 是一段极大的连续任务区间，其中只有 *最后* 一个任务
/// 可以携带外部 semaphore：携带 semaphore 的任务结束当前 batch。
fn partition_batches(tasks: &[RgTaskDesc]) -> Vec<std::ops::Range<usize>> {
    let mut batches = Vec::new();
    let mut start = 0;
    for (i, task) in tasks.iter().enumerate() {
        if task.has_semaphore_operations() {
            batches.push(start..i + 1);
            start = i + 1;
        }
    }
    if start < tasks.len() {
        batches.push(start..tasks.len());
    }
    batches
}

/// 批量提交调度器
///
/// `schedule_task` 只追加描述；`execute` 统一录制并提交。
/// 帧内任务严格按调度顺序执行。
pub struct RgExecutor {
    tasks: Vec<RgTaskDesc>,
    pool: GfxCommandPool,
}

// new & destroy
impl RgExecutor {
    pub fn new(ctx: &GfxContext) -> Self {
        Self {
            tasks: Vec::new(),
            pool: GfxCommandPool::new(ctx.device(), ctx.queue_family_index(), "executor"),
        }
    }

    pub fn destroy(self, ctx: &GfxContext) {
        self.pool.destroy(ctx.device());
    }
}

// 调度与执行
impl RgExecutor {
    /// 追加一个任务，不触发任何执行
    pub fn schedule_task(&mut self, task: RgTaskDesc) {
        self.tasks.push(task);
    }

    #[inline]
    pub fn scheduled_task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 录制并提交本帧的全部任务
    ///
    /// `record(task_idx, primary, secondaries)` 由调用方实现：
    /// 把任务 `task_idx` 的命令录进共享的 primary
    /// 以及它名下的 secondary 切片。
    ///
    /// 稳态下不会阻塞 CPU：完成 fence 交给命令池轮询。
    pub fn execute(&mut self, ctx: &GfxContext, mut record: impl FnMut(usize, &GfxCommandBuffer, &[GfxCommandBuffer])) {
        let _span = tracy_client::span!("RgExecutor::execute");

        if self.tasks.is_empty() {
            return;
        }

        let device = ctx.device();
        let batches = partition_batches(&self.tasks);

        let mut submit_infos = Vec::with_capacity(batches.len());
        let mut used_primary = Vec::with_capacity(batches.len());
        let mut used_secondary = Vec::new();

        for range in &batches {
            let primary = self.pool.get_cmd(device, vk::CommandBufferLevel::PRIMARY, 1).pop().unwrap();
            let secondary_count: usize =
                self.tasks[range.clone()].iter().map(|t| t.secondary_cmd_count as usize).sum();
            let secondaries = if secondary_count > 0 {
                self.pool.get_cmd(device, vk::CommandBufferLevel::SECONDARY, secondary_count)
            } else {
                Vec::new()
            };

            primary.begin(device, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            let mut secondary_offset = 0;
            for task_idx in range.clone() {
                // 只有 batch 末尾的任务可以携带 semaphore
                debug_assert!(
                    task_idx + 1 == range.end || !self.tasks[task_idx].has_semaphore_operations(),
                    "RgExecutor: semaphore-bearing task must terminate its batch"
                );

                let count = self.tasks[task_idx].secondary_cmd_count as usize;
                record(task_idx, &primary, &secondaries[secondary_offset..secondary_offset + count]);
                secondary_offset += count;
            }
            primary.end(device);

            let mut submit_info = GfxSubmitInfo::new(std::slice::from_ref(&primary));
            let boundary_task = &self.tasks[range.end - 1];
            if let Some(wait) = boundary_task.external_wait {
                submit_info = submit_info.wait(wait.semaphore, wait.stage, wait.value);
            }
            if let Some(signal) = boundary_task.external_signal {
                submit_info = submit_info.signal(signal.semaphore, signal.stage, signal.value);
            }
            submit_infos.push(submit_info);

            used_primary.push(primary);
            used_secondary.extend(secondaries);
        }

        // 所有 batch 一次提交，共享一个完成 fence
        let fence = GfxFence::new(device, false, "executor-frame");
        ctx.submit(&submit_infos, Some(&fence));

        // 命令缓冲区带 fence 归还：整帧 GPU 工作完成之前不会被复用
        self.pool.recycle(used_primary, used_secondary, Some(fence));
        self.tasks.clear();
    }

    /// 同步执行一个一次性任务
    ///
    /// 自带 fence 并阻塞等待完成，只用于初始化类工作
    /// （例如初始 layout 迁移），不要在帧循环里使用。
    pub fn execute_one_time(
        &mut self,
        ctx: &GfxContext,
        secondary_cmd_count: u32,
        record: impl FnOnce(&GfxCommandBuffer, &[GfxCommandBuffer]),
    ) {
        let _span = tracy_client::span!("RgExecutor::execute_one_time");

        let device = ctx.device();
        let primary = self.pool.get_cmd(device, vk::CommandBufferLevel::PRIMARY, 1).pop().unwrap();
        let secondaries = if secondary_cmd_count > 0 {
            self.pool.get_cmd(device, vk::CommandBufferLevel::SECONDARY, secondary_cmd_count as usize)
        } else {
            Vec::new()
        };

        primary.begin(device, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        record(&primary, &secondaries);
        primary.end(device);

        let fence = GfxFence::new(device, false, "executor-one-time");
        ctx.submit(&[GfxSubmitInfo::new(std::slice::from_ref(&primary))], Some(&fence));
        fence.wait(device);
        fence.destroy(device);

        // 已经等待完成，直接归还
        self.pool.recycle(vec![primary], secondaries, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(with_semaphore: bool) -> RgTaskDesc {
        let semaphore = RgSemaphoreInfo::binary(vk::Semaphore::null(), vk::PipelineStageFlags2::COMPUTE_SHADER);
        RgTaskDesc {
            stage_flags: vk::PipelineStageFlags2::COMPUTE_SHADER,
            external_wait: with_semaphore.then_some(semaphore),
            external_signal: None,
            secondary_cmd_count: 0,
        }
    }

    /// 8 个任务，索引 2 和 5 携带 semaphore：
    /// 正好 3 个 batch，边界落在 2 和 5 上
    #[test]
    fn test_partition_at_semaphore_boundaries() {
        let tasks: Vec<_> = (0..8).map(|i| task(i == 2 || i == 5)).collect();

        let batches = partition_batches(&tasks);
        assert_eq!(batches, vec![0..3, 3..6, 6..8]);

        // 携带 semaphore 的任务都位于自己 batch 的末尾
        for range in &batches {
            for i in range.clone() {
                if tasks[i].has_semaphore_operations() {
                    assert_eq!(i + 1, range.end);
                }
            }
        }
    }

    /// 没有 semaphore：全部任务合并进一个 batch
    #[test]
    fn test_partition_coalesces_without_semaphores() {
        let tasks: Vec<_> = (0..5).map(|_| task(false)).collect();
        assert_eq!(partition_batches(&tasks), vec![0..5]);
    }

    /// 每个任务都携带 semaphore：每个任务独占一个 batch
    #[test]
    fn test_partition_all_semaphores() {
        let tasks: Vec<_> = (0..3).map(|_| task(true)).collect();
        assert_eq!(partition_batches(&tasks), vec![0..1, 1..2, 2..3]);
    }

    /// 末尾任务携带 semaphore 时不产生空 batch
    #[test]
    fn test_partition_trailing_semaphore() {
        let tasks = vec![task(false), task(false), task(true)];
        assert_eq!(partition_batches(&tasks), vec![0..3]);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition_batches(&[]).is_empty());
    }
}
