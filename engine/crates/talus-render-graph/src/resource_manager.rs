//! 逻辑资源到物理资源的生命周期管理
//!
//! 流程分三步：
//! 1. 图构建阶段：`add_buffer` / `add_image` 注册逻辑资源，
//!    pass 通过 `require_*_properties` 累加属性需求；
//! 2. `init_resources`：展平为物理资源（buffer 在前、image 在后），
//!    统一 reserve 内存、一次批量分配、逐个绑定，
//!    并为每个 image 的 synchronizer 种入 `UNDEFINED` 初始访问；
//! 3. 帧循环阶段：`declare_*_access` 声明访问、
//!    `record_pass_barriers` 录制暂存的 barrier。

use ash::vk;
use slotmap::SlotMap;

use talus_gfx::commands::command_buffer::GfxCommandBuffer;
use talus_gfx::foundation::device::GfxDevice;
use talus_gfx::foundation::gfx_context::GfxContext;
use talus_gfx::memory::allocator::GfxMemoryAllocator;
use talus_gfx::resources::buffer::GfxBuffer;
use talus_gfx::resources::image::GfxImage;
use talus_gfx::swapchain::present_target::PresentTarget;

use crate::access::RgAccess;
use crate::resource::{RgBufferDesc, RgBufferHandle, RgBufferResource, RgImageDesc, RgImageHandle, RgImageResource};
use crate::sync::{RgPassSynchronizer, RgPhysicalRef};

pub struct RgResourceManager {
    buffers: SlotMap<RgBufferHandle, RgBufferResource>,
    images: SlotMap<RgImageHandle, RgImageResource>,

    /// 注册顺序，展平 resource_idx 时使用
    buffer_order: Vec<RgBufferHandle>,
    image_order: Vec<RgImageHandle>,

    /// `init_resources` 之后按 resource_idx 排列
    physical_buffers: Vec<GfxBuffer>,
    physical_images: Vec<GfxImage>,

    allocator: Option<GfxMemoryAllocator>,
    synchronizer: Option<RgPassSynchronizer>,
}

impl Default for RgResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

// new & 注册
impl RgResourceManager {
    pub fn new() -> Self {
        Self {
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            buffer_order: Vec::new(),
            image_order: Vec::new(),
            physical_buffers: Vec::new(),
            physical_images: Vec::new(),
            allocator: None,
            synchronizer: None,
        }
    }

    /// 注册逻辑 buffer，返回图生命周期内稳定的句柄
    pub fn add_buffer(&mut self, name: impl Into<String>, desc: RgBufferDesc) -> RgBufferHandle {
        assert!(!self.is_initialized(), "RgResourceManager: add_buffer after init_resources");

        let handle = self.buffers.insert(RgBufferResource::new(name, desc));
        self.buffer_order.push(handle);
        handle
    }

    /// 注册逻辑 image
    pub fn add_image(&mut self, name: impl Into<String>, desc: RgImageDesc) -> RgImageHandle {
        assert!(!self.is_initialized(), "RgResourceManager: add_image after init_resources");

        let handle = self.images.insert(RgImageResource::new(name, desc));
        self.image_order.push(handle);
        handle
    }

    /// pass 声明对逻辑 buffer 的属性需求，取并集
    pub fn require_buffer_properties(&mut self, handle: RgBufferHandle, desc: &RgBufferDesc) {
        self.buffers.get_mut(handle).expect("RgResourceManager: invalid buffer handle").require_properties(desc);
    }

    /// pass 声明对逻辑 image 的属性需求
    pub fn require_image_properties(&mut self, handle: RgImageHandle, desc: &RgImageDesc) {
        self.images.get_mut(handle).expect("RgResourceManager: invalid image handle").require_properties(desc);
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.synchronizer.is_some()
    }

    #[inline]
    pub fn resource_count(&self) -> usize {
        self.buffers.len() + self.images.len()
    }
}

// 物理资源创建
impl RgResourceManager {
    /// 创建全部物理资源并完成内存绑定
    ///
    /// 返回之后所有物理资源都已分配并绑定；
    /// 此后 `require_*_properties` 为致命错误。
    pub fn init_resources(&mut self, ctx: &GfxContext, present: &dyn PresentTarget, pass_count: usize) {
        assert!(!self.is_initialized(), "RgResourceManager: init_resources called twice");
        let _span = tracy_client::span!("RgResourceManager::init_resources");

        let mut allocator = GfxMemoryAllocator::new(*ctx.memory_properties());
        let buffer_count = self.buffer_order.len() as u32;

        // 展平：所有 buffer 在前
        let mut buffer_slices = Vec::with_capacity(self.buffer_order.len());
        for (i, handle) in self.buffer_order.iter().enumerate() {
            let resource = &mut self.buffers[*handle];
            resource.resource_idx = Some(i as u32);

            // 没有显式内存需求的 buffer 回落到 DEVICE_LOCAL
            let memory_flags = if resource.desc.memory_flags.is_empty() {
                vk::MemoryPropertyFlags::DEVICE_LOCAL
            } else {
                resource.desc.memory_flags
            };

            let buffer = GfxBuffer::new(ctx, resource.desc.size, resource.desc.usage, i as u32, &resource.name);
            buffer_slices.push(allocator.reserve(buffer.memory_requirements(ctx), memory_flags));
            self.physical_buffers.push(buffer);
        }

        // 所有 image 在后；未指定的 extent/format 回落到呈现目标
        let mut image_slices = Vec::with_capacity(self.image_order.len());
        for (j, handle) in self.image_order.iter().enumerate() {
            let resource = &mut self.images[*handle];
            let resource_idx = buffer_count + j as u32;
            resource.resource_idx = Some(resource_idx);

            let extent = resource.desc.extent.unwrap_or_else(|| present.extent());
            let format = resource.desc.format.unwrap_or_else(|| present.format());
            let image = GfxImage::new(ctx, extent, format, resource.desc.usage, resource_idx, &resource.name);
            image_slices
                .push(allocator.reserve(image.memory_requirements(ctx), vk::MemoryPropertyFlags::DEVICE_LOCAL));
            self.physical_images.push(image);
        }

        // 每种 memory type 一次真实分配，然后逐个绑定
        allocator.allocate(ctx);
        for (buffer, slice) in self.physical_buffers.iter_mut().zip(buffer_slices) {
            buffer.bind_memory(ctx, &allocator, slice);
        }
        for (image, slice) in self.physical_images.iter().zip(image_slices) {
            image.bind_memory(ctx, &allocator, slice);
        }

        // 访问同步器：物理句柄 + barrier 暂存槽位
        let physical_refs = self
            .physical_buffers
            .iter()
            .map(|b| RgPhysicalRef::Buffer { buffer: b.vk_buffer() })
            .chain(self.physical_images.iter().map(|i| RgPhysicalRef::Image {
                image: i.handle(),
                aspect: i.aspect(),
            }))
            .collect();
        let mut synchronizer = RgPassSynchronizer::new(physical_refs, pass_count);

        // 为每个 image 种入 UNDEFINED 初始访问，落在哨兵槽位：
        // frame 0 的第一次真实访问会正确生成初始 layout 迁移
        for image in &self.physical_images {
            synchronizer.add_access(image.resource_idx() as usize, RgAccess::UNDEFINED, pass_count as u32);
        }

        log::info!(
            "resources initialized: {} buffers, {} images, {} passes",
            self.physical_buffers.len(),
            self.physical_images.len(),
            pass_count
        );

        self.allocator = Some(allocator);
        self.synchronizer = Some(synchronizer);
    }
}

// 访问声明与 barrier 录制
impl RgResourceManager {
    fn synchronizer_mut(&mut self) -> &mut RgPassSynchronizer {
        self.synchronizer.as_mut().expect("RgResourceManager: not initialized")
    }

    /// 声明对 buffer 的访问
    pub fn declare_buffer_access(&mut self, handle: RgBufferHandle, access: RgAccess, pass_idx: u32) {
        debug_assert_eq!(access.layout, vk::ImageLayout::UNDEFINED, "buffer access must not carry a layout");

        let resource = self.buffers.get(handle).expect("RgResourceManager: invalid buffer handle");
        let resource_idx = resource.resource_idx.expect("RgResourceManager: declare_access before init_resources");
        self.synchronizer_mut().add_access(resource_idx as usize, access, pass_idx);
    }

    /// 声明对 image 的访问
    pub fn declare_image_access(&mut self, handle: RgImageHandle, access: RgAccess, pass_idx: u32) {
        let resource = self.images.get(handle).expect("RgResourceManager: invalid image handle");
        let resource_idx = resource.resource_idx.expect("RgResourceManager: declare_access before init_resources");
        self.synchronizer_mut().add_access(resource_idx as usize, access, pass_idx);
    }

    /// 录制某个 pass 暂存的全部 barrier（取走，不拷贝）
    pub fn record_pass_barriers(&mut self, device: &GfxDevice, cmd: &GfxCommandBuffer, pass_idx: usize) {
        self.synchronizer_mut().record_pass_barriers(device, cmd, pass_idx);
    }

    /// 某个 pass 暂存的 barrier 数量 (buffer, image)，调试用
    pub fn pending_barrier_counts(&self, pass_idx: usize) -> (usize, usize) {
        self.synchronizer.as_ref().expect("RgResourceManager: not initialized").pending_barrier_counts(pass_idx)
    }
}

// 物理资源访问
impl RgResourceManager {
    /// 逻辑句柄对应的物理 buffer
    pub fn buffer(&self, handle: RgBufferHandle) -> &GfxBuffer {
        let resource = self.buffers.get(handle).expect("RgResourceManager: invalid buffer handle");
        let idx = resource.resource_idx.expect("RgResourceManager: not initialized") as usize;
        &self.physical_buffers[idx]
    }

    /// 逻辑句柄对应的物理 image
    pub fn image(&self, handle: RgImageHandle) -> &GfxImage {
        let resource = self.images.get(handle).expect("RgResourceManager: invalid image handle");
        let idx = resource.resource_idx.expect("RgResourceManager: not initialized") as usize;
        &self.physical_images[idx - self.physical_buffers.len()]
    }

    /// 按需创建并缓存 image view
    pub fn image_view(&mut self, ctx: &GfxContext, handle: RgImageHandle) -> vk::ImageView {
        let resource = self.images.get(handle).expect("RgResourceManager: invalid image handle");
        let idx = resource.resource_idx.expect("RgResourceManager: not initialized") as usize;
        let buffer_count = self.physical_buffers.len();
        self.physical_images[idx - buffer_count].get_or_create_view(ctx)
    }
}

// destroy
impl RgResourceManager {
    pub fn destroy(self, ctx: &GfxContext) {
        for buffer in self.physical_buffers {
            buffer.destroy(ctx);
        }
        for image in self.physical_images {
            image.destroy(ctx);
        }
        if let Some(allocator) = self.allocator {
            allocator.destroy(ctx);
        }
    }
}
