use ash::vk;
use itertools::Itertools;
use std::cell::Cell;

use crate::commands::fence::GfxFence;
use crate::commands::submit_info::GfxSubmitInfo;
use crate::foundation::device::GfxDevice;

/// 显式的设备上下文
///
/// 持有逻辑设备、提交队列以及物理设备的内存属性，
/// 在引擎启动时构造一次，之后以引用的形式传入所有组件。
///
/// 录制与提交都发生在单个 CPU 线程上，`GfxContext` 不做任何内部加锁。
pub struct GfxContext {
    device: GfxDevice,
    queue: vk::Queue,
    queue_family_index: u32,
    memory_properties: vk::PhysicalDeviceMemoryProperties,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxContext {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> Self {
        let device = GfxDevice::new(instance, pdevice, queue_family_index);
        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(pdevice) };

        log::info!(
            "GfxContext created: queue family {}, {} memory types",
            queue_family_index,
            memory_properties.memory_type_count
        );

        Self {
            device,
            queue,
            queue_family_index,
            memory_properties,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        }
    }

    pub fn destroy(self) {
        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        self.device.wait_idle();
        self.device.destroy();
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn device(&self) -> &GfxDevice {
        &self.device
    }
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
    #[inline]
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }
}

// tools
impl GfxContext {
    /// 将多个 batch 作为一次 `vkQueueSubmit2` 提交，
    /// batch 之间保持提交顺序，fence 在所有 batch 完成后 signal。
    pub fn submit(&self, batches: &[GfxSubmitInfo], fence: Option<&GfxFence>) {
        let submit_infos = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe {
            self.device
                .queue_submit2(self.queue, &submit_infos, fence.map_or(vk::Fence::null(), |f| f.handle()))
                .unwrap();
        }
    }

    #[inline]
    pub fn wait_idle(&self) {
        self.device.wait_idle();
    }
}

impl Drop for GfxContext {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxContext must be destroyed before being dropped.");
    }
}
