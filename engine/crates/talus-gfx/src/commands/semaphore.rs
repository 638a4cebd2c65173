use ash::vk;

use crate::foundation::{debug_type::DebugType, device::GfxDevice};

/// # Destroy
/// 不应该实现 Drop，因为可以 Clone，需要手动 destroy
#[derive(Clone)]
pub struct GfxSemaphore {
    semaphore: vk::Semaphore,
}

impl DebugType for GfxSemaphore {
    fn debug_type_name() -> &'static str {
        "GfxSemaphore"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.semaphore
    }
}

// 创建与销毁
impl GfxSemaphore {
    pub fn new(device: &GfxDevice, debug_name: &str) -> Self {
        let semaphore = unsafe { device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None).unwrap() };

        let semaphore = Self { semaphore };
        device.set_debug_name(&semaphore, debug_name);
        semaphore
    }

    #[inline]
    pub fn destroy(self, device: &GfxDevice) {
        unsafe {
            device.destroy_semaphore(self.semaphore, None);
        }
    }
}

// getters
impl GfxSemaphore {
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}
