//! Talus 的 GFX 层
//!
//! 对 Vulkan 设备层的薄封装：设备上下文、命令缓冲区与命令池、
//! 同步原语（fence/semaphore/barrier）、物理资源（buffer/image）
//! 以及延迟批量分配的 device memory 分配器。
//!
//! 所有组件都通过显式的 [`foundation::gfx_context::GfxContext`]
//! 访问设备，没有任何全局单例。

pub mod basic;
pub mod commands;
pub mod foundation;
pub mod memory;
pub mod resources;
pub mod swapchain;
