use ash::vk;

/// 可以被 debug utils 命名的 Vulkan 对象
///
/// 实现该 trait 的封装类型都可以通过
/// `GfxDevice::set_debug_name` 获得 `类型::名称` 形式的调试名。
pub trait DebugType {
    fn debug_type_name() -> &'static str;

    fn vk_handle(&self) -> impl vk::Handle;
}
