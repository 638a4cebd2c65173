//! 资源访问描述
//!
//! [`RgAccess`] 描述一次对资源的访问（stage + access + layout），
//! [`RgAccessDependency`] 描述两次访问之间需要插入的 barrier。

use ash::vk;

/// 一次对资源的访问
///
/// `layout` 只对 image 有意义；buffer 的 layout 恒为 `UNDEFINED`，
/// 这一点由构造函数保证：[`RgAccess::buffer`] 不接受 layout 参数。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgAccess {
    /// Pipeline stage
    pub stage: vk::PipelineStageFlags2,
    /// Access mask
    pub access: vk::AccessFlags2,
    /// Image layout（buffer 恒为 `UNDEFINED`）
    pub layout: vk::ImageLayout,
}

impl Default for RgAccess {
    fn default() -> Self {
        Self::NONE
    }
}

// new & 常量定义
impl RgAccess {
    /// 创建 image 访问
    #[inline]
    pub const fn image(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2, layout: vk::ImageLayout) -> Self {
        Self { stage, access, layout }
    }

    /// 创建 buffer 访问
    ///
    /// buffer 没有 layout 概念，固定为 `UNDEFINED`。
    #[inline]
    pub const fn buffer(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self {
            stage,
            access,
            layout: vk::ImageLayout::UNDEFINED,
        }
    }

    // ============ 预定义访问常量 ============

    /// 空访问（synchronizer 的初始状态）
    pub const NONE: Self = Self::buffer(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE);

    /// 未定义状态（资源初始化时的种子访问）
    pub const UNDEFINED: Self =
        Self::image(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::UNDEFINED);

    /// 颜色附件写入
    pub const COLOR_ATTACHMENT_WRITE: Self = Self::image(
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    );

    /// 着色器只读采样（片段着色器）
    pub const SHADER_READ_FRAGMENT: Self = Self::image(
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 着色器只读采样（计算着色器）
    pub const SHADER_READ_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_SAMPLED_READ,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    );

    /// 存储图像写入（计算着色器）
    pub const STORAGE_IMAGE_WRITE_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::ImageLayout::GENERAL,
    );

    /// 存储图像读写（计算着色器）
    pub const STORAGE_IMAGE_READ_WRITE_COMPUTE: Self = Self::image(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
        vk::ImageLayout::GENERAL,
    );

    /// 图像传输源
    pub const TRANSFER_SRC: Self = Self::image(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    );

    /// 图像传输目标
    pub const TRANSFER_DST: Self = Self::image(
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    );

    /// 呈现（swapchain image）
    pub const PRESENT: Self =
        Self::image(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE, vk::ImageLayout::PRESENT_SRC_KHR);

    /// Uniform 缓冲区读取（计算着色器）
    pub const UNIFORM_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::UNIFORM_READ);

    /// 存储缓冲区读取（计算着色器）
    pub const STORAGE_BUFFER_READ_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_READ);

    /// 存储缓冲区写入（计算着色器）
    pub const STORAGE_BUFFER_WRITE_COMPUTE: Self =
        Self::buffer(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE);

    /// 存储缓冲区读写（计算着色器）
    pub const STORAGE_BUFFER_READ_WRITE_COMPUTE: Self = Self::buffer(
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::SHADER_STORAGE_READ.as_raw() | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw(),
        ),
    );

    /// 缓冲区传输源
    pub const TRANSFER_SRC_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);

    /// 缓冲区传输目标
    pub const TRANSFER_DST_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);

    /// 间接命令缓冲区读取
    pub const INDIRECT_BUFFER: Self =
        Self::buffer(vk::PipelineStageFlags2::DRAW_INDIRECT, vk::AccessFlags2::INDIRECT_COMMAND_READ);
}

// 辅助方法
impl RgAccess {
    /// 写操作的 access flags
    const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_WRITE.as_raw()
            | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
            | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
            | vk::AccessFlags2::HOST_WRITE.as_raw()
            | vk::AccessFlags2::MEMORY_WRITE.as_raw()
            | vk::AccessFlags2::ACCELERATION_STRUCTURE_WRITE_KHR.as_raw(),
    );

    /// 检查是否为写操作
    #[inline]
    pub fn is_modify(&self) -> bool {
        self.access.intersects(Self::WRITE_ACCESS)
    }

    /// 将另一次访问合并进来
    ///
    /// 只有 layout 相同的访问才可以合并；这由调用方
    /// （synchronizer 的 flush 判定）保证。
    #[inline]
    pub fn merge(&mut self, other: RgAccess) {
        debug_assert_eq!(self.layout, other.layout, "RgAccess::merge: layouts must match");
        self.stage |= other.stage;
        self.access |= other.access;
    }
}

/// 两次访问之间需要插入的 barrier
///
/// `src_pass_idx` 指向发出 src 访问的 pass：
/// barrier 作为该 pass 的 post-pass barrier 录制，
/// 从而排在 dst pass 的工作之前。
#[derive(Clone, Copy, Debug, Default)]
pub struct RgAccessDependency {
    pub src: RgAccess,
    pub dst: RgAccess,
    pub src_pass_idx: u32,
}

impl RgAccessDependency {
    /// 两侧 access flags 都为空表示 "没有 barrier 要发"
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.src.access == vk::AccessFlags2::NONE && self.dst.access == vk::AccessFlags2::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_modify() {
        assert!(RgAccess::STORAGE_IMAGE_WRITE_COMPUTE.is_modify());
        assert!(RgAccess::STORAGE_BUFFER_WRITE_COMPUTE.is_modify());
        assert!(RgAccess::TRANSFER_DST.is_modify());
        assert!(RgAccess::COLOR_ATTACHMENT_WRITE.is_modify());

        assert!(!RgAccess::SHADER_READ_COMPUTE.is_modify());
        assert!(!RgAccess::STORAGE_BUFFER_READ_COMPUTE.is_modify());
        assert!(!RgAccess::UNIFORM_COMPUTE.is_modify());
        assert!(!RgAccess::PRESENT.is_modify());
        assert!(!RgAccess::NONE.is_modify());
    }

    #[test]
    fn test_merge_unions_flags() {
        let mut access = RgAccess::STORAGE_BUFFER_READ_COMPUTE;
        access.merge(RgAccess::buffer(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::UNIFORM_READ));

        assert!(access.stage.contains(vk::PipelineStageFlags2::COMPUTE_SHADER));
        assert!(access.stage.contains(vk::PipelineStageFlags2::FRAGMENT_SHADER));
        assert!(access.access.contains(vk::AccessFlags2::SHADER_STORAGE_READ));
        assert!(access.access.contains(vk::AccessFlags2::UNIFORM_READ));
    }

    #[test]
    fn test_empty_dependency() {
        assert!(RgAccessDependency::default().is_empty());

        let dep = RgAccessDependency {
            src: RgAccess::STORAGE_BUFFER_WRITE_COMPUTE,
            dst: RgAccess::STORAGE_BUFFER_READ_COMPUTE,
            src_pass_idx: 0,
        };
        assert!(!dep.is_empty());
    }
}
