//! 延迟批量分配的 device memory 分配器
//!
//! 分配分为两个阶段：
//! 1. **reserve 阶段**：每个物理资源按 `vkGetBufferMemoryRequirements` 的
//!    结果申请一个子区间，每种 memory type 维护一个 bump 游标；
//! 2. **allocate 阶段**：对每种被用到的 memory type 只调用一次
//!    `vkAllocateMemory`，之后各资源按照计算好的 offset 绑定。
//!
//! 多个资源共享同一个 allocation 的不同子区间，aliasing 对上层完全不可见。

use ash::vk;

use crate::foundation::gfx_context::GfxContext;

/// 单个 memory type 的 arena
///
/// reserve 阶段 `size` 是 bump 游标；`allocate` 之后 `size` 固定，
/// `memory` 持有真实的 allocation。
pub struct GfxMemoryBlock {
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    type_index: u32,
    mapped_ptr: Option<*mut u8>,
}

/// reserve 阶段返回的子区间，之后用于绑定资源
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxMemorySlice {
    pub type_index: u32,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl GfxMemoryBlock {
    fn new(type_index: u32) -> Self {
        Self {
            memory: vk::DeviceMemory::null(),
            size: 0,
            type_index,
            mapped_ptr: None,
        }
    }

    /// 将 offset 向上对齐到 alignment 的整数倍
    ///
    /// alignment 来自 `vk::MemoryRequirements`，保证是 2 的幂。
    #[inline]
    pub fn aligned_offset(offset: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
        debug_assert!(alignment.is_power_of_two());
        (offset + alignment - 1) & !(alignment - 1)
    }

    /// bump 游标，返回子区间的起始 offset
    fn reserve(&mut self, size: vk::DeviceSize, alignment: vk::DeviceSize) -> vk::DeviceSize {
        let offset = Self::aligned_offset(self.size, alignment);
        self.size = offset + size;
        offset
    }
}

/// Device memory 分配器
///
/// 每种 memory type 一个 [`GfxMemoryBlock`]。
/// 所有 `reserve` 调用必须发生在 `allocate` 之前。
pub struct GfxMemoryAllocator {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    blocks: Vec<GfxMemoryBlock>,
    allocated: bool,
}

// new & reserve
impl GfxMemoryAllocator {
    pub fn new(memory_properties: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self {
            memory_properties,
            blocks: Vec::new(),
            allocated: false,
        }
    }

    /// 为一个资源申请子区间
    ///
    /// # Panic
    /// - `allocate` 之后再调用
    /// - 找不到同时满足 `requirements.memory_type_bits` 和 `flags` 的 memory type
    pub fn reserve(&mut self, requirements: vk::MemoryRequirements, flags: vk::MemoryPropertyFlags) -> GfxMemorySlice {
        assert!(!self.allocated, "GfxMemoryAllocator: reserve after allocate is not allowed");

        let type_index = self.find_memory_type(requirements.memory_type_bits, flags);

        let block_idx = match self.blocks.iter().position(|b| b.type_index == type_index) {
            Some(idx) => idx,
            None => {
                self.blocks.push(GfxMemoryBlock::new(type_index));
                self.blocks.len() - 1
            }
        };

        let offset = self.blocks[block_idx].reserve(requirements.size, requirements.alignment);
        GfxMemorySlice {
            type_index,
            offset,
            size: requirements.size,
        }
    }

    fn find_memory_type(&self, type_bits: u32, flags: vk::MemoryPropertyFlags) -> u32 {
        for i in 0..self.memory_properties.memory_type_count {
            let type_matches = (type_bits & (1 << i)) != 0;
            let flags_match = self.memory_properties.memory_types[i as usize].property_flags.contains(flags);
            if type_matches && flags_match {
                return i;
            }
        }
        panic!("GfxMemoryAllocator: no memory type satisfies bits {:#b} with flags {:?}", type_bits, flags);
    }
}

// allocate & bind
impl GfxMemoryAllocator {
    /// 对每种被用到的 memory type 执行一次真实分配，
    /// HOST_VISIBLE 的 block 会被整体 map 一次。
    pub fn allocate(&mut self, ctx: &GfxContext) {
        assert!(!self.allocated, "GfxMemoryAllocator: allocate called twice");
        let _span = tracy_client::span!("GfxMemoryAllocator::allocate");
        self.allocated = true;

        let device = ctx.device();
        for block in &mut self.blocks {
            let alloc_info =
                vk::MemoryAllocateInfo::default().allocation_size(block.size).memory_type_index(block.type_index);
            block.memory = unsafe { device.allocate_memory(&alloc_info, None).unwrap() };

            let host_visible = self.memory_properties.memory_types[block.type_index as usize]
                .property_flags
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE);
            if host_visible {
                let ptr = unsafe {
                    device.map_memory(block.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty()).unwrap()
                };
                block.mapped_ptr = Some(ptr as *mut u8);
            }

            log::info!(
                "memory block allocated: type {}, {} bytes, host visible: {}",
                block.type_index,
                block.size,
                host_visible
            );
        }
    }

    /// slice 所在 block 的 `vk::DeviceMemory`，绑定资源时使用
    pub fn memory(&self, slice: GfxMemorySlice) -> vk::DeviceMemory {
        assert!(self.allocated, "GfxMemoryAllocator: memory queried before allocate");
        self.block(slice.type_index).memory
    }

    /// slice 对应的 host 指针；block 不是 HOST_VISIBLE 时返回 None
    pub fn mapped_ptr(&self, slice: GfxMemorySlice) -> Option<*mut u8> {
        let block = self.block(slice.type_index);
        debug_assert!(slice.offset + slice.size <= block.size);
        block.mapped_ptr.map(|ptr| unsafe { ptr.add(slice.offset as usize) })
    }

    fn block(&self, type_index: u32) -> &GfxMemoryBlock {
        self.blocks.iter().find(|b| b.type_index == type_index).expect("GfxMemoryAllocator: unknown memory type")
    }
}

// destroy
impl GfxMemoryAllocator {
    pub fn destroy(mut self, ctx: &GfxContext) {
        let device = ctx.device();
        for block in &mut self.blocks {
            if block.memory != vk::DeviceMemory::null() {
                unsafe {
                    if block.mapped_ptr.take().is_some() {
                        device.unmap_memory(block.memory);
                    }
                    device.free_memory(block.memory, None);
                }
                block.memory = vk::DeviceMemory::null();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_memory_properties() -> vk::PhysicalDeviceMemoryProperties {
        // type 0: DEVICE_LOCAL, type 1: HOST_VISIBLE | HOST_COHERENT
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = 2;
        props.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        props.memory_types[1] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            heap_index: 1,
        };
        props
    }

    fn requirements(size: u64, alignment: u64) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size,
            alignment,
            memory_type_bits: 0b11,
        }
    }

    #[test]
    fn test_aligned_offset() {
        assert_eq!(GfxMemoryBlock::aligned_offset(0, 256), 0);
        assert_eq!(GfxMemoryBlock::aligned_offset(1, 256), 256);
        assert_eq!(GfxMemoryBlock::aligned_offset(256, 256), 256);
        assert_eq!(GfxMemoryBlock::aligned_offset(257, 16), 272);
    }

    #[test]
    fn test_reserve_no_overlap() {
        let requests: [(u64, u64); 4] = [(100, 64), (7, 1), (256, 256), (33, 16)];

        let mut allocator = GfxMemoryAllocator::new(test_memory_properties());
        let slices: Vec<_> = requests
            .iter()
            .map(|&(size, align)| allocator.reserve(requirements(size, align), vk::MemoryPropertyFlags::DEVICE_LOCAL))
            .collect();

        // 所有子区间落在同一个 block、满足对齐要求且互不重叠
        for (slice, (_, align)) in slices.iter().zip(requests) {
            assert_eq!(slice.type_index, 0);
            assert_eq!(slice.offset % align, 0);
        }
        for (i, a) in slices.iter().enumerate() {
            for b in &slices[i + 1..] {
                assert!(a.offset + a.size <= b.offset || b.offset + b.size <= a.offset);
            }
        }
    }

    #[test]
    fn test_reserve_separates_memory_types() {
        let mut allocator = GfxMemoryAllocator::new(test_memory_properties());

        let device_local = allocator.reserve(requirements(128, 16), vk::MemoryPropertyFlags::DEVICE_LOCAL);
        let host_visible = allocator.reserve(requirements(128, 16), vk::MemoryPropertyFlags::HOST_VISIBLE);

        assert_eq!(device_local.type_index, 0);
        assert_eq!(host_visible.type_index, 1);
        // 不同 type 的区间相互独立，都从 0 开始
        assert_eq!(device_local.offset, 0);
        assert_eq!(host_visible.offset, 0);
    }

    #[test]
    #[should_panic(expected = "no memory type satisfies")]
    fn test_reserve_without_matching_type_panics() {
        let mut allocator = GfxMemoryAllocator::new(test_memory_properties());
        allocator.reserve(requirements(128, 16), vk::MemoryPropertyFlags::PROTECTED);
    }
}
