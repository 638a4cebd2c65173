//! 访问同步器
//!
//! [`RgResourceSynchronizer`] 为单个物理资源维护 *唯一一条未 flush 的访问*，
//! 在每次新的访问声明时决定是否需要 barrier。
//!
//! [`RgPassSynchronizer`] 为每个物理资源持有一个 synchronizer，
//! 并把生成的 barrier 按照 **产生方 pass** 的索引归类暂存；
//! pass 录制时一次性取走（drain）自己名下的 barrier。
//!
//! 一对 producer/consumer 只需要一条 barrier，即使中间还有若干
//! 相互兼容的只读访问；按访问逐条发 barrier 会把本可并行的读序列化。

use ash::vk;

use talus_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use talus_gfx::commands::command_buffer::GfxCommandBuffer;
use talus_gfx::foundation::device::GfxDevice;

use crate::access::{RgAccess, RgAccessDependency};

/// 单个物理资源的访问同步器
///
/// 不变量：任何时刻至多缓存一条待 flush 的访问。
/// 新的访问要么合并进去（不需要依赖时），要么把它作为
/// [`RgAccessDependency`] flush 出去并取而代之。
pub struct RgResourceSynchronizer {
    /// 当前未 flush 的访问
    current: RgAccess,
    /// 最近一次贡献 `current` 的 pass
    ///
    /// 合并时也会刷新：flush 出的 `src_pass_idx` 指向合并访问中
    /// *最后* 一个 pass，保证 barrier 排在所有相关访问之后。
    current_pass_idx: u32,
}

impl Default for RgResourceSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RgResourceSynchronizer {
    pub fn new() -> Self {
        Self {
            current: RgAccess::NONE,
            current_pass_idx: 0,
        }
    }

    /// 两次访问之间是否需要依赖
    ///
    /// 任意一方是写操作，或者 layout 不同（buffer 双方恒为
    /// `UNDEFINED`，不会因此误判）。
    fn is_dep_needed(current: &RgAccess, incoming: &RgAccess) -> bool {
        current.is_modify() || incoming.is_modify() || current.layout != incoming.layout
    }

    /// 声明一次新的访问
    ///
    /// 调用方保证同一资源的 `pass_idx` 按执行顺序递增（每帧内）。
    /// 返回空依赖（[`RgAccessDependency::is_empty`]）表示不需要 barrier。
    pub fn add_access(&mut self, pass_idx: u32, mut access: RgAccess) -> RgAccessDependency {
        let mut dep = RgAccessDependency::default();

        if Self::is_dep_needed(&self.current, &access) {
            // layout 继承：目标访问不关心 layout（UNDEFINED）时，
            // 沿用上一次访问的 layout，避免一次多余的迁移
            if access.layout == vk::ImageLayout::UNDEFINED && self.current.layout != access.layout {
                access.layout = self.current.layout;
            }

            dep = RgAccessDependency {
                src: self.current,
                dst: access,
                src_pass_idx: self.current_pass_idx,
            };
            self.current = access;
        } else {
            self.current.merge(access);
        }

        self.current_pass_idx = pass_idx;
        dep
    }

    /// 当前未 flush 的访问（调试用）
    #[inline]
    pub fn current_access(&self) -> RgAccess {
        self.current
    }
}

/// barrier 生成所需的物理资源信息
#[derive(Clone, Copy)]
pub enum RgPhysicalRef {
    Buffer { buffer: vk::Buffer },
    Image { image: vk::Image, aspect: vk::ImageAspectFlags },
}

/// 全部资源的访问同步器 + 按 pass 归类的 barrier 暂存
///
/// barrier 列表有 `pass_count + 1` 个槽位：
/// 最后一个槽位是 "frame 0 之前 / 最后一个 pass 之后" 的哨兵，
/// 资源初始化时的 layout 迁移会落在这里，由图的 init 阶段统一录制。
pub struct RgPassSynchronizer {
    resource_syncs: Vec<RgResourceSynchronizer>,
    physical: Vec<RgPhysicalRef>,

    pass_buffer_barriers: Vec<Vec<GfxBufferBarrier>>,
    pass_image_barriers: Vec<Vec<GfxImageBarrier>>,
}

impl RgPassSynchronizer {
    pub fn new(physical: Vec<RgPhysicalRef>, pass_count: usize) -> Self {
        let resource_count = physical.len();
        Self {
            resource_syncs: (0..resource_count).map(|_| RgResourceSynchronizer::new()).collect(),
            physical,
            pass_buffer_barriers: vec![Vec::new(); pass_count + 1],
            pass_image_barriers: vec![Vec::new(); pass_count + 1],
        }
    }

    #[inline]
    pub fn resource_count(&self) -> usize {
        self.resource_syncs.len()
    }

    /// 不含哨兵槽位的 pass 数量
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.pass_buffer_barriers.len() - 1
    }

    /// 声明一次访问；需要 barrier 时生成并暂存到产生方 pass 名下
    ///
    /// # Panic
    /// `resource_idx` / `pass_idx` 越界是图构建阶段的编程错误，直接终止。
    pub fn add_access(&mut self, resource_idx: usize, access: RgAccess, pass_idx: u32) {
        assert!(
            resource_idx < self.resource_syncs.len(),
            "RgPassSynchronizer: resource_idx {} out of range ({} resources)",
            resource_idx,
            self.resource_syncs.len()
        );
        assert!(
            (pass_idx as usize) < self.pass_buffer_barriers.len(),
            "RgPassSynchronizer: pass_idx {} out of range ({} passes)",
            pass_idx,
            self.pass_count()
        );

        let dep = self.resource_syncs[resource_idx].add_access(pass_idx, access);
        if dep.is_empty() {
            return;
        }

        let slot = dep.src_pass_idx as usize;
        match self.physical[resource_idx] {
            RgPhysicalRef::Buffer { buffer } => {
                self.pass_buffer_barriers[slot].push(
                    GfxBufferBarrier::new()
                        .buffer(buffer, 0, vk::WHOLE_SIZE)
                        .src_mask(dep.src.stage, dep.src.access)
                        .dst_mask(dep.dst.stage, dep.dst.access),
                );
            }
            RgPhysicalRef::Image { image, aspect } => {
                self.pass_image_barriers[slot].push(
                    GfxImageBarrier::new()
                        .image(image)
                        .layout_transfer(dep.src.layout, dep.dst.layout)
                        .src_mask(dep.src.stage, dep.src.access)
                        .dst_mask(dep.dst.stage, dep.dst.access)
                        .image_aspect_flag(aspect),
                );
            }
        }
    }

    /// 取走某个 pass 暂存的全部 barrier
    ///
    /// 取走而不是拷贝：每条 barrier 只在产生方 pass 录制时发出一次。
    pub fn drain_pass_barriers(&mut self, pass_idx: usize) -> (Vec<GfxBufferBarrier>, Vec<GfxImageBarrier>) {
        (
            std::mem::take(&mut self.pass_buffer_barriers[pass_idx]),
            std::mem::take(&mut self.pass_image_barriers[pass_idx]),
        )
    }

    /// 某个 pass 当前暂存的 barrier 数量 (buffer, image)
    pub fn pending_barrier_counts(&self, pass_idx: usize) -> (usize, usize) {
        (self.pass_buffer_barriers[pass_idx].len(), self.pass_image_barriers[pass_idx].len())
    }

    /// 将某个 pass 暂存的 barrier 录制为一条 pipeline barrier
    pub fn record_pass_barriers(&mut self, device: &GfxDevice, cmd: &GfxCommandBuffer, pass_idx: usize) {
        let (buffer_barriers, image_barriers) = self.drain_pass_barriers(pass_idx);
        cmd.pipeline_barrier2(device, &buffer_barriers, &image_barriers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    /// 两个 pass 共享一个 buffer：pass 0 写、pass 1 读，
    /// 期望 flush 出一条 src_pass_idx = 0 的依赖
    #[test]
    fn test_write_then_read_single_dependency() {
        let mut sync = RgResourceSynchronizer::new();

        let dep = sync.add_access(0, RgAccess::STORAGE_BUFFER_WRITE_COMPUTE);
        // 初始状态是空访问，首次写只产生 src 为空的过渡
        assert_eq!(dep.src.access, vk::AccessFlags2::NONE);

        let dep = sync.add_access(1, RgAccess::STORAGE_BUFFER_READ_COMPUTE);
        assert!(!dep.is_empty());
        assert_eq!(dep.src_pass_idx, 0);
        assert_eq!(dep.src.access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(dep.src.stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(dep.dst.access, vk::AccessFlags2::SHADER_STORAGE_READ);
    }

    /// 三个 pass 全部只读：不允许产生任何 barrier
    #[test]
    fn test_read_only_sequence_no_barrier() {
        let mut sync = RgResourceSynchronizer::new();

        for pass_idx in 0..3 {
            let dep = sync.add_access(pass_idx, RgAccess::STORAGE_BUFFER_READ_COMPUTE);
            assert!(dep.is_empty(), "read-only access at pass {} must merge", pass_idx);
        }

        // 合并后的访问保留了全部 flags
        assert!(sync.current_access().access.contains(vk::AccessFlags2::SHADER_STORAGE_READ));
    }

    /// 图像 layout 迁移：TRANSFER_DST 写 → SHADER_READ 读
    #[test]
    fn test_image_layout_transition() {
        let mut sync = RgResourceSynchronizer::new();

        sync.add_access(0, RgAccess::TRANSFER_DST);
        let dep = sync.add_access(1, RgAccess::SHADER_READ_FRAGMENT);

        assert!(!dep.is_empty());
        assert_eq!(dep.src.layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(dep.dst.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(dep.src_pass_idx, 0);
    }

    /// layout 继承：目标访问不指定 layout 时沿用源 layout，
    /// 而不是强制迁移回 UNDEFINED
    #[test]
    fn test_layout_inheritance() {
        let mut sync = RgResourceSynchronizer::new();

        sync.add_access(0, RgAccess::SHADER_READ_FRAGMENT);

        // 写访问，但不关心 layout
        let write_dont_care =
            RgAccess::image(vk::PipelineStageFlags2::COMPUTE_SHADER, vk::AccessFlags2::SHADER_STORAGE_WRITE, vk::ImageLayout::UNDEFINED);
        let dep = sync.add_access(1, write_dont_care);

        assert!(!dep.is_empty());
        assert_eq!(dep.dst.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        // 继承后的 layout 也会成为新的 current
        assert_eq!(sync.current_access().layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    /// 合并也会刷新 pass_idx：flush 出的 src_pass_idx 指向
    /// 合并访问中最后一个 pass
    #[test]
    fn test_merge_refreshes_pass_idx() {
        let mut sync = RgResourceSynchronizer::new();

        sync.add_access(0, RgAccess::STORAGE_BUFFER_READ_COMPUTE);
        let dep = sync.add_access(1, RgAccess::STORAGE_BUFFER_READ_COMPUTE);
        assert!(dep.is_empty());

        let dep = sync.add_access(2, RgAccess::STORAGE_BUFFER_WRITE_COMPUTE);
        assert!(!dep.is_empty());
        assert_eq!(dep.src_pass_idx, 1, "merged access must carry the last contributing pass");
    }

    /// 资源初始化的种子访问：UNDEFINED → 第一个真实访问
    /// 生成 layout 迁移 barrier
    #[test]
    fn test_seeded_image_first_access() {
        let pass_count = 3_u32;
        let mut sync = RgResourceSynchronizer::new();

        // init_resources 在哨兵槽位种入 UNDEFINED 访问
        let dep = sync.add_access(pass_count, RgAccess::UNDEFINED);
        assert!(dep.is_empty());

        // frame 0 的第一个真实访问
        let dep = sync.add_access(0, RgAccess::STORAGE_IMAGE_WRITE_COMPUTE);
        assert!(!dep.is_empty());
        assert_eq!(dep.src_pass_idx, pass_count, "initial transition belongs to the sentinel slot");
        assert_eq!(dep.src.layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(dep.dst.layout, vk::ImageLayout::GENERAL);
    }

    /// 写后写也需要 barrier
    #[test]
    fn test_write_after_write() {
        let mut sync = RgResourceSynchronizer::new();

        sync.add_access(0, RgAccess::STORAGE_BUFFER_WRITE_COMPUTE);
        let dep = sync.add_access(1, RgAccess::STORAGE_BUFFER_WRITE_COMPUTE);

        assert!(!dep.is_empty());
        assert_eq!(dep.src_pass_idx, 0);
    }

    fn test_pass_synchronizer(pass_count: usize) -> RgPassSynchronizer {
        let physical = vec![
            RgPhysicalRef::Buffer {
                buffer: vk::Buffer::from_raw(1),
            },
            RgPhysicalRef::Image {
                image: vk::Image::from_raw(2),
                aspect: vk::ImageAspectFlags::COLOR,
            },
        ];
        RgPassSynchronizer::new(physical, pass_count)
    }

    /// barrier 归类在产生方 pass 名下，drain 之后不会重复出现
    #[test]
    fn test_barriers_accumulate_under_producer_and_drain_once() {
        let mut sync = test_pass_synchronizer(2);

        // pass 0 读与初始空访问合并，不产生 barrier
        sync.add_access(0, RgAccess::STORAGE_BUFFER_READ_COMPUTE, 0);
        assert_eq!(sync.pending_barrier_counts(0), (0, 0));

        // pass 1 写，flush 出 read→write，归在产生方 pass 0 名下
        sync.add_access(0, RgAccess::STORAGE_BUFFER_WRITE_COMPUTE, 1);
        assert_eq!(sync.pending_barrier_counts(0), (1, 0));
        assert_eq!(sync.pending_barrier_counts(1), (0, 0));

        let (buffer_barriers, image_barriers) = sync.drain_pass_barriers(0);
        assert_eq!(buffer_barriers.len(), 1);
        assert!(image_barriers.is_empty());

        // 只发一次
        let (buffer_barriers, _) = sync.drain_pass_barriers(0);
        assert!(buffer_barriers.is_empty());
    }

    /// 图像 barrier 携带正确的 layout 迁移
    #[test]
    fn test_image_barrier_layouts() {
        let mut sync = test_pass_synchronizer(2);
        let image_idx = 1;

        sync.add_access(image_idx, RgAccess::TRANSFER_DST, 0);
        sync.add_access(image_idx, RgAccess::SHADER_READ_COMPUTE, 1);

        // 首次访问从空状态 flush 出 UNDEFINED→TRANSFER_DST，
        // 第二次访问 flush 出真正的迁移，两条都归在 pass 0 名下
        let (_, image_barriers) = sync.drain_pass_barriers(0);
        assert_eq!(image_barriers.len(), 2);
        assert_eq!(image_barriers[0].old_layout(), vk::ImageLayout::UNDEFINED);
        assert_eq!(image_barriers[0].new_layout(), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(image_barriers[1].old_layout(), vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(image_barriers[1].new_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }

    #[test]
    #[should_panic(expected = "resource_idx")]
    fn test_resource_idx_out_of_range_panics() {
        let mut sync = test_pass_synchronizer(2);
        sync.add_access(99, RgAccess::STORAGE_BUFFER_READ_COMPUTE, 0);
    }
}
