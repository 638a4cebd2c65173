//! 支持异步回收的命令缓冲区池
//!
//! 命令缓冲区有三种状态：
//! - **free**：位于空闲列表中，可以立即取用；
//! - **checked-out**：已交给调用方，尚未归还；
//! - **in-flight**：已随 batch 提交，等待 fence signal 后回收。
//!
//! 回收只依赖非阻塞的 fence 轮询，`get_cmd` 永远不会等待 GPU。

use ash::vk;

use crate::commands::command_buffer::GfxCommandBuffer;
use crate::commands::fence::GfxFence;
use crate::foundation::{debug_type::DebugType, device::GfxDevice};

/// 已提交、等待 fence 的一批命令缓冲区
struct InFlightBatch {
    primary: Vec<vk::CommandBuffer>,
    secondary: Vec<vk::CommandBuffer>,
    fence: GfxFence,
}

pub struct GfxCommandPool {
    pool: vk::CommandPool,

    free_primary: Vec<vk::CommandBuffer>,
    free_secondary: Vec<vk::CommandBuffer>,
    in_flight: Vec<InFlightBatch>,

    /// 每次补充空闲列表时的分配数量，几何增长
    alloc_step_primary: u32,
    alloc_step_secondary: u32,
}

impl DebugType for GfxCommandPool {
    fn debug_type_name() -> &'static str {
        "GfxCommandPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.pool
    }
}

// 创建与销毁
impl GfxCommandPool {
    /// 单次取用数量的上限，超过说明调度出了 bug
    pub const MAX_ALLOC_STEP: u32 = 64;

    pub fn new(device: &GfxDevice, queue_family_index: u32, debug_name: &str) -> Self {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { device.create_command_pool(&create_info, None).unwrap() };

        let pool = Self {
            pool,
            free_primary: Vec::new(),
            free_secondary: Vec::new(),
            in_flight: Vec::new(),
            alloc_step_primary: 1,
            alloc_step_secondary: 1,
        };
        device.set_debug_name(&pool, debug_name);
        pool
    }

    pub fn destroy(self, device: &GfxDevice) {
        for batch in self.in_flight {
            batch.fence.wait(device);
            batch.fence.destroy(device);
        }
        unsafe {
            // 池内所有命令缓冲区随 pool 一起释放
            device.destroy_command_pool(self.pool, None);
        }
    }
}

// 取用与回收
impl GfxCommandPool {
    /// 取出 `count` 个指定 level 的命令缓冲区
    ///
    /// 先回收已经 signal 的 in-flight batch；空闲列表不足时按照
    /// 几何增长的 `alloc_step` 补充。返回的是最近归还的缓冲区（LIFO）。
    ///
    /// # Panic
    /// `count` 超过 [`Self::MAX_ALLOC_STEP`]，视为调度失控。
    pub fn get_cmd(&mut self, device: &GfxDevice, level: vk::CommandBufferLevel, count: usize) -> Vec<GfxCommandBuffer> {
        self.check_in_flight_batches(device);

        assert!(
            count as u32 <= Self::MAX_ALLOC_STEP,
            "GfxCommandPool: requested {} command buffers at once, runaway scheduling?",
            count
        );

        let (free, alloc_step) = match level {
            vk::CommandBufferLevel::PRIMARY => (&mut self.free_primary, &mut self.alloc_step_primary),
            _ => (&mut self.free_secondary, &mut self.alloc_step_secondary),
        };

        let (allocations, next_step) = growth_plan(free.len(), count, *alloc_step, Self::MAX_ALLOC_STEP);
        *alloc_step = next_step;
        for alloc_count in allocations {
            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.pool)
                .level(level)
                .command_buffer_count(alloc_count);
            let buffers = unsafe { device.allocate_command_buffers(&alloc_info).unwrap() };
            free.extend(buffers);
        }

        free.split_off(free.len() - count).into_iter().map(|handle| GfxCommandBuffer::new(handle, level)).collect()
    }

    /// 归还命令缓冲区
    ///
    /// `fence` 为 Some 时，这批缓冲区进入 in-flight 状态，
    /// 直到 fence signal 才回到空闲列表；为 None 时（同步提交已经等待完成）
    /// 立即回到空闲列表。
    pub fn recycle(
        &mut self,
        primary: Vec<GfxCommandBuffer>,
        secondary: Vec<GfxCommandBuffer>,
        fence: Option<GfxFence>,
    ) {
        let primary: Vec<_> = primary.iter().map(|cmd| cmd.vk_handle()).collect();
        let secondary: Vec<_> = secondary.iter().map(|cmd| cmd.vk_handle()).collect();

        match fence {
            Some(fence) => self.in_flight.push(InFlightBatch {
                primary,
                secondary,
                fence,
            }),
            None => {
                self.free_primary.extend(primary);
                self.free_secondary.extend(secondary);
            }
        }
    }

    /// 轮询 in-flight batch，回收已经完成的
    ///
    /// 只做 "signaled 与否" 的查询，从不等待。
    pub fn check_in_flight_batches(&mut self, device: &GfxDevice) {
        let mut i = 0;
        while i < self.in_flight.len() {
            if self.in_flight[i].fence.is_signaled(device) {
                let batch = self.in_flight.swap_remove(i);
                self.free_primary.extend(batch.primary);
                self.free_secondary.extend(batch.secondary);
                batch.fence.destroy(device);
            } else {
                i += 1;
            }
        }
    }
}

/// 计算补足空闲列表所需的分配序列
///
/// 返回每次分配的数量以及下一次使用的 alloc step。
/// step 每被用掉一次就翻倍，封顶在 `max_step`。
fn growth_plan(free_count: usize, requested: usize, mut step: u32, max_step: u32) -> (Vec<u32>, u32) {
    let mut allocations = Vec::new();
    let mut free_count = free_count;
    while free_count < requested {
        allocations.push(step);
        free_count += step as usize;
        step = (step * 2).min(max_step);
    }
    (allocations, step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_plan_doubles() {
        // 依次请求 1、3、10 个，期间没有任何归还
        let (allocs, step) = growth_plan(0, 1, 1, GfxCommandPool::MAX_ALLOC_STEP);
        assert_eq!(allocs, vec![1]);
        assert_eq!(step, 2);

        // 上一轮取走 1 个，空闲为 0
        let (allocs, step) = growth_plan(0, 3, step, GfxCommandPool::MAX_ALLOC_STEP);
        assert_eq!(allocs, vec![2, 4]);
        assert_eq!(step, 8);

        // 又取走 3 个，剩 3 个空闲
        let (allocs, step) = growth_plan(3, 10, step, GfxCommandPool::MAX_ALLOC_STEP);
        assert_eq!(allocs, vec![8]);
        assert_eq!(step, 16);
    }

    #[test]
    fn test_growth_plan_respects_cap() {
        let (allocs, step) = growth_plan(0, 60, 32, GfxCommandPool::MAX_ALLOC_STEP);
        assert_eq!(allocs, vec![32, 64]);
        // step 封顶，不再翻倍
        assert_eq!(step, GfxCommandPool::MAX_ALLOC_STEP);
    }

    #[test]
    fn test_growth_plan_enough_free() {
        let (allocs, step) = growth_plan(5, 3, 4, GfxCommandPool::MAX_ALLOC_STEP);
        assert!(allocs.is_empty());
        assert_eq!(step, 4);
    }
}
