use ash::vk;

use crate::foundation::{debug_type::DebugType, device::GfxDevice};

/// # Destroy
/// 不应该实现 Drop，因为可以 Clone，需要手动 destroy
#[derive(Clone)]
pub struct GfxFence {
    fence: vk::Fence,
}

impl DebugType for GfxFence {
    fn debug_type_name() -> &'static str {
        "GfxFence"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.fence
    }
}

// 创建与销毁
impl GfxFence {
    /// # param
    /// * signaled - 是否创建时就 signaled
    pub fn new(device: &GfxDevice, signaled: bool, debug_name: &str) -> Self {
        let fence_flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default().flags(fence_flags), None).unwrap() };

        let fence = Self { fence };
        device.set_debug_name(&fence, debug_name);
        fence
    }

    #[inline]
    pub fn destroy(self, device: &GfxDevice) {
        unsafe {
            device.destroy_fence(self.fence, None);
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

// tools
impl GfxFence {
    /// 阻塞等待 fence
    #[inline]
    pub fn wait(&self, device: &GfxDevice) {
        unsafe {
            device.wait_for_fences(std::slice::from_ref(&self.fence), true, u64::MAX).unwrap();
        }
    }

    /// 非阻塞查询，signaled 与否立刻返回
    #[inline]
    pub fn is_signaled(&self, device: &GfxDevice) -> bool {
        unsafe { device.get_fence_status(self.fence).unwrap() }
    }

    #[inline]
    pub fn reset(&self, device: &GfxDevice) {
        unsafe {
            device.reset_fences(std::slice::from_ref(&self.fence)).unwrap();
        }
    }
}
