use ash::vk;
use itertools::Itertools;
use std::cell::Cell;
use std::{
    ffi::{CStr, CString},
    ops::Deref,
};

use crate::foundation::debug_type::DebugType;

/// Vulkan 逻辑设备封装
///
/// 包含核心设备 API 以及引擎需要的扩展函数指针。
/// 这些函数指针在应用生命周期中保持不变，可以安全共享。
///
/// # 扩展支持
/// - Swapchain (KHR)
/// - Debug Utils (EXT)
///
/// synchronization2 已经是 core-1.3 的功能，只需要在 feature 中启用。
pub struct GfxDevice {
    /// 核心 Vulkan 设备 API
    pub(crate) device: ash::Device,
    /// 调试工具扩展 API
    pub(crate) debug_utils: ash::ext::debug_utils::Device,
    /// 交换链扩展 API
    pub(crate) swapchain: ash::khr::swapchain::Device,

    #[cfg(debug_assertions)]
    destroyed: Cell<bool>,
}

// 构造与销毁
impl GfxDevice {
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> Self {
        let device_exts = Self::basic_device_exts().iter().map(|e| e.as_ptr()).collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        let queue_priorities = [1.0_f32];
        let queue_create_info = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)];

        let mut sync2_feature = vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true);
        let all_features = vk::PhysicalDeviceFeatures2::default().features(Self::physical_device_basic_features());
        let mut all_features = all_features.push_next(&mut sync2_feature);

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_info)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.create_device(pdevice, &device_create_info, None).unwrap() };

        let vk_debug_utils_device = ash::ext::debug_utils::Device::new(instance, &device);
        let vk_swapchain = ash::khr::swapchain::Device::new(instance, &device);

        Self {
            device,
            debug_utils: vk_debug_utils_device,
            swapchain: vk_swapchain,

            #[cfg(debug_assertions)]
            destroyed: Cell::new(false),
        }
    }

    pub fn destroy(&self) {
        log::info!("destroying device");

        #[cfg(debug_assertions)]
        self.destroyed.set(true);

        unsafe {
            self.device.destroy_device(None);
        }
    }
}

// 创建过程的辅助函数
impl GfxDevice {
    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default().fragment_stores_and_atomics(true)
    }

    /// 必要的 device extensions
    fn basic_device_exts() -> Vec<&'static CStr> {
        vec![ash::khr::swapchain::NAME]
    }
}

// getters
impl GfxDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::Device {
        self.device.handle()
    }
    #[inline]
    pub fn debug_utils(&self) -> &ash::ext::debug_utils::Device {
        &self.debug_utils
    }
    #[inline]
    pub fn swapchain(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain
    }
}

// tools
impl GfxDevice {
    #[inline]
    pub fn set_object_debug_name<T: vk::Handle + Copy>(&self, handle: T, name: impl AsRef<str>) {
        let name = CString::new(name.as_ref()).unwrap();
        unsafe {
            self.debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default().object_name(name.as_c_str()).object_handle(handle),
                )
                .unwrap();
        }
    }

    pub fn set_debug_name<T: DebugType>(&self, handle: &T, name: impl AsRef<str>) {
        let debug_name = format!("{}::{}", T::debug_type_name(), name.as_ref());
        let debug_name = CString::new(debug_name.as_str()).unwrap();
        unsafe {
            self.debug_utils
                .set_debug_utils_object_name(
                    &vk::DebugUtilsObjectNameInfoEXT::default()
                        .object_name(debug_name.as_c_str())
                        .object_handle(handle.vk_handle()),
                )
                .unwrap();
        }
    }

    #[inline]
    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().unwrap();
        }
    }
}

impl Deref for GfxDevice {
    type Target = ash::Device;
    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
impl Drop for GfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        debug_assert!(self.destroyed.get(), "GfxDevice must be destroyed before being dropped.");
    }
}
impl DebugType for GfxDevice {
    fn debug_type_name() -> &'static str {
        "GfxDevice"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.device.handle()
    }
}
