//! 逻辑资源
//!
//! pass 在图构建阶段持有的是逻辑 buffer/image 的句柄（slotmap key），
//! 不是指针；多个 pass 通过 `require_properties` 向同一个逻辑资源
//! 累加属性需求，取并集（尺寸取 max、flags 取 OR），
//! 因此声明顺序无关紧要。
//!
//! `init_resources` 之后逻辑资源被冻结，物理资源按
//! "所有 buffer 在前、所有 image 在后" 的顺序展平，
//! 获得连续的 `resource_idx`。

use ash::vk;
use slotmap::new_key_type;

new_key_type! {
    /// 逻辑 buffer 句柄
    pub struct RgBufferHandle;
    /// 逻辑 image 句柄
    pub struct RgImageHandle;
}

/// 逻辑 buffer 的属性需求
#[derive(Clone, Copy, Debug)]
pub struct RgBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory_flags: vk::MemoryPropertyFlags,
}

impl Default for RgBufferDesc {
    fn default() -> Self {
        Self {
            size: 0,
            usage: vk::BufferUsageFlags::empty(),
            memory_flags: vk::MemoryPropertyFlags::empty(),
        }
    }
}

impl RgBufferDesc {
    pub fn new(size: vk::DeviceSize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    #[inline]
    pub fn usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage |= usage;
        self
    }

    /// 不指定时物理创建阶段回落到 DEVICE_LOCAL；
    /// 需要 CPU 访问时传入 HOST_VISIBLE | HOST_COHERENT
    #[inline]
    pub fn memory(mut self, flags: vk::MemoryPropertyFlags) -> Self {
        self.memory_flags |= flags;
        self
    }
}

/// 逻辑 image 的属性需求
///
/// extent/format 不指定时，在 `init_resources` 阶段
/// 回落到呈现目标的 extent/format。
#[derive(Clone, Copy, Debug, Default)]
pub struct RgImageDesc {
    pub extent: Option<vk::Extent2D>,
    pub format: Option<vk::Format>,
    pub usage: vk::ImageUsageFlags,
}

impl RgImageDesc {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn extent(mut self, extent: vk::Extent2D) -> Self {
        self.extent = Some(extent);
        self
    }

    #[inline]
    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = Some(format);
        self
    }

    #[inline]
    pub fn usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage |= usage;
        self
    }
}

/// 逻辑 buffer
pub struct RgBufferResource {
    pub(crate) name: String,
    pub(crate) desc: RgBufferDesc,
    /// `init_resources` 展平后才有值
    pub(crate) resource_idx: Option<u32>,
}

impl RgBufferResource {
    pub(crate) fn new(name: impl Into<String>, desc: RgBufferDesc) -> Self {
        Self {
            name: name.into(),
            desc,
            resource_idx: None,
        }
    }

    /// 累加属性需求：尺寸取 max、flags 取 OR
    ///
    /// # Panic
    /// 物理资源创建之后再调用。
    pub(crate) fn require_properties(&mut self, desc: &RgBufferDesc) {
        assert!(
            self.resource_idx.is_none(),
            "RgBufferResource {}: require_properties after init_resources",
            self.name
        );

        self.desc.size = self.desc.size.max(desc.size);
        self.desc.usage |= desc.usage;
        self.desc.memory_flags |= desc.memory_flags;
    }
}

/// 逻辑 image
pub struct RgImageResource {
    pub(crate) name: String,
    pub(crate) desc: RgImageDesc,
    pub(crate) resource_idx: Option<u32>,
}

impl RgImageResource {
    pub(crate) fn new(name: impl Into<String>, desc: RgImageDesc) -> Self {
        Self {
            name: name.into(),
            desc,
            resource_idx: None,
        }
    }

    /// 累加属性需求
    ///
    /// extent 按分量取 max；format 必须一致（或只有一方指定）。
    pub(crate) fn require_properties(&mut self, desc: &RgImageDesc) {
        assert!(
            self.resource_idx.is_none(),
            "RgImageResource {}: require_properties after init_resources",
            self.name
        );

        self.desc.extent = match (self.desc.extent, desc.extent) {
            (Some(a), Some(b)) => Some(vk::Extent2D {
                width: a.width.max(b.width),
                height: a.height.max(b.height),
            }),
            (a, b) => a.or(b),
        };

        match (self.desc.format, desc.format) {
            (Some(a), Some(b)) => {
                assert_eq!(a, b, "RgImageResource {}: conflicting formats {:?} vs {:?}", self.name, a, b);
            }
            (None, Some(b)) => self.desc.format = Some(b),
            _ => {}
        }

        self.desc.usage |= desc.usage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 属性需求取并集，与声明顺序无关
    #[test]
    fn test_buffer_property_union_is_order_independent() {
        let descs = [
            RgBufferDesc::new(256).usage(vk::BufferUsageFlags::STORAGE_BUFFER),
            RgBufferDesc::new(1024).usage(vk::BufferUsageFlags::TRANSFER_DST),
            RgBufferDesc::new(64)
                .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
                .memory(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT),
        ];

        // 所有排列得到同样的最终属性
        let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in permutations {
            let mut resource = RgBufferResource::new("test", RgBufferDesc::default());
            for i in order {
                resource.require_properties(&descs[i]);
            }

            assert_eq!(resource.desc.size, 1024);
            assert_eq!(
                resource.desc.usage,
                vk::BufferUsageFlags::STORAGE_BUFFER
                    | vk::BufferUsageFlags::TRANSFER_DST
                    | vk::BufferUsageFlags::UNIFORM_BUFFER
            );
            assert_eq!(
                resource.desc.memory_flags,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            );
        }
    }

    /// 重复声明同样的需求是幂等的
    #[test]
    fn test_property_union_idempotent() {
        let desc = RgBufferDesc::new(512).usage(vk::BufferUsageFlags::STORAGE_BUFFER);

        let mut resource = RgBufferResource::new("test", RgBufferDesc::default());
        resource.require_properties(&desc);
        let once = resource.desc;
        resource.require_properties(&desc);

        assert_eq!(resource.desc.size, once.size);
        assert_eq!(resource.desc.usage, once.usage);
    }

    #[test]
    fn test_image_extent_takes_max_per_component() {
        let mut resource = RgImageResource::new("test", RgImageDesc::default());

        resource.require_properties(&RgImageDesc::new().extent(vk::Extent2D {
            width: 800,
            height: 600,
        }));
        resource.require_properties(&RgImageDesc::new().extent(vk::Extent2D {
            width: 640,
            height: 720,
        }));

        assert_eq!(
            resource.desc.extent,
            Some(vk::Extent2D {
                width: 800,
                height: 720
            })
        );
    }

    #[test]
    #[should_panic(expected = "conflicting formats")]
    fn test_image_format_conflict_panics() {
        let mut resource = RgImageResource::new("test", RgImageDesc::default());
        resource.require_properties(&RgImageDesc::new().format(vk::Format::R8G8B8A8_UNORM));
        resource.require_properties(&RgImageDesc::new().format(vk::Format::R16G16B16A16_SFLOAT));
    }

    #[test]
    #[should_panic(expected = "after init_resources")]
    fn test_require_after_init_panics() {
        let mut resource = RgBufferResource::new("test", RgBufferDesc::new(16));
        resource.resource_idx = Some(0);
        resource.require_properties(&RgBufferDesc::new(32));
    }
}
