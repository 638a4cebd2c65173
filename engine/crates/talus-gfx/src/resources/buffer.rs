use ash::vk;
use std::ptr;

use crate::foundation::{debug_type::DebugType, gfx_context::GfxContext};
use crate::memory::allocator::{GfxMemoryAllocator, GfxMemorySlice};

/// 物理缓冲区
///
/// 创建时没有绑定内存；由资源管理器统一 reserve 内存之后，
/// 通过 [`GfxBuffer::bind_memory`] 绑定到 allocator 计算出的子区间上。
/// 创建之后 size/usage 不再变化。
pub struct GfxBuffer {
    handle: vk::Buffer,
    size: vk::DeviceSize,

    /// 在所有 buffer + image 展平后的数组中的位置
    resource_idx: u32,

    /// 绑定 HOST_VISIBLE 内存后才有值
    map_ptr: Option<*mut u8>,

    debug_name: String,

    _usage: vk::BufferUsageFlags,
}

impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// init & destroy
impl GfxBuffer {
    pub fn new(
        ctx: &GfxContext,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        resource_idx: u32,
        name: impl AsRef<str>,
    ) -> Self {
        assert!(buffer_size > 0, "GfxBuffer::new: zero-sized buffer {}", name.as_ref());

        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { ctx.device().create_buffer(&buffer_ci, None).unwrap() };

        let buffer = Self {
            handle: buffer,
            size: buffer_size,
            resource_idx,
            map_ptr: None,
            debug_name: name.as_ref().to_string(),
            _usage: buffer_usage,
        };
        ctx.device().set_debug_name(&buffer, name);
        buffer
    }

    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_buffer(self.handle, None);
        }
    }
}

// 内存绑定
impl GfxBuffer {
    pub fn memory_requirements(&self, ctx: &GfxContext) -> vk::MemoryRequirements {
        unsafe { ctx.device().get_buffer_memory_requirements(self.handle) }
    }

    /// 绑定到 allocator 中的子区间；每个 buffer 只能绑定一次
    pub fn bind_memory(&mut self, ctx: &GfxContext, allocator: &GfxMemoryAllocator, slice: GfxMemorySlice) {
        unsafe {
            ctx.device().bind_buffer_memory(self.handle, allocator.memory(slice), slice.offset).unwrap();
        }
        self.map_ptr = allocator.mapped_ptr(slice);
    }
}

// getters
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn resource_idx(&self) -> u32 {
        self.resource_idx
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

// tools
impl GfxBuffer {
    #[inline]
    pub fn mapped_ptr(&self) -> *mut u8 {
        self.map_ptr.unwrap_or_else(|| {
            panic!("GfxBuffer {}: not bound to HOST_VISIBLE memory", self.debug_name);
        })
    }

    /// 通过 mem map 将数据写入 buffer
    ///
    /// 要求 buffer 绑定在 HOST_VISIBLE | HOST_COHERENT 内存上。
    pub fn write_slice<T: bytemuck::Pod>(&self, data: &[T]) {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        assert!(bytes.len() as vk::DeviceSize <= self.size, "GfxBuffer {}: write overflows buffer", self.debug_name);
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped_ptr(), bytes.len());
        }
    }

    /// 用一个 `bytemuck::Pod` 值整体覆盖 buffer 开头
    pub fn write<T: bytemuck::Pod>(&self, value: &T) {
        self.write_slice(std::slice::from_ref(value));
    }
}
