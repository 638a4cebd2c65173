//! 呈现目标接口
//!
//! swapchain、surface、窗口系统都在引擎之外；
//! 引擎只依赖这里定义的接口：呈现目标的 extent/format，
//! 以及带超时的图像获取。

use ash::vk;

/// 获取呈现图像的超时，单位纳秒
pub const ACQUIRE_TIMEOUT_NS: u64 = 5_000_000_000;

/// 图像获取的结果
///
/// `Suboptimal` 和 `Timeout` 都不是错误：
/// 帧循环应当跳过当前帧的呈现，下一帧重试。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GfxAcquireStatus {
    /// 获取成功，携带图像索引
    Ready(u32),
    /// swapchain 需要重建，本帧跳过
    Suboptimal,
    /// 在 [`ACQUIRE_TIMEOUT_NS`] 内没有可用图像，本帧跳过
    Timeout,
}

/// 呈现目标
///
/// 由 swapchain 封装层实现；实现方自行管理 acquire 所需的 semaphore。
pub trait PresentTarget {
    fn extent(&self) -> vk::Extent2D;

    fn format(&self) -> vk::Format;

    /// 获取下一张呈现图像，超时上限为 [`ACQUIRE_TIMEOUT_NS`]
    fn acquire_next(&mut self) -> GfxAcquireStatus;
}
