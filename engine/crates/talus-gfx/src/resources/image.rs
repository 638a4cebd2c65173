use ash::vk;

use crate::commands::barrier::infer_image_aspect;
use crate::foundation::{debug_type::DebugType, gfx_context::GfxContext};
use crate::memory::allocator::{GfxMemoryAllocator, GfxMemorySlice};
use crate::resources::image_view::GfxImageView;

/// 物理图像
///
/// 创建时没有绑定内存，由资源管理器统一分配后绑定。
/// extent/format/usage 在创建后不再变化；
/// image view 按需创建并缓存。
pub struct GfxImage {
    handle: vk::Image,

    extent: vk::Extent2D,
    format: vk::Format,

    /// 在所有 buffer + image 展平后的数组中的位置
    resource_idx: u32,

    view: Option<GfxImageView>,

    name: String,

    _usage: vk::ImageUsageFlags,
}

impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxImage {
    pub fn new(
        ctx: &GfxContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        resource_idx: u32,
        name: impl AsRef<str>,
    ) -> Self {
        let image_ci = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .format(format)
            .usage(usage)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { ctx.device().create_image(&image_ci, None).unwrap() };

        let image = Self {
            handle: image,
            extent,
            format,
            resource_idx,
            view: None,
            name: name.as_ref().to_string(),
            _usage: usage,
        };
        ctx.device().set_debug_name(&image, name);
        image
    }

    pub fn destroy(self, ctx: &GfxContext) {
        if let Some(view) = self.view {
            view.destroy(ctx);
        }
        unsafe {
            ctx.device().destroy_image(self.handle, None);
        }
    }
}

// 内存绑定
impl GfxImage {
    pub fn memory_requirements(&self, ctx: &GfxContext) -> vk::MemoryRequirements {
        unsafe { ctx.device().get_image_memory_requirements(self.handle) }
    }

    pub fn bind_memory(&self, ctx: &GfxContext, allocator: &GfxMemoryAllocator, slice: GfxMemorySlice) {
        unsafe {
            ctx.device().bind_image_memory(self.handle, allocator.memory(slice), slice.offset).unwrap();
        }
    }
}

// getters
impl GfxImage {
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_image_aspect(self.format)
    }

    #[inline]
    pub fn resource_idx(&self) -> u32 {
        self.resource_idx
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.name
    }
}

// tools
impl GfxImage {
    /// 按需创建并缓存整图 2D view
    ///
    /// 必须在内存绑定之后调用。
    pub fn get_or_create_view(&mut self, ctx: &GfxContext) -> vk::ImageView {
        if self.view.is_none() {
            self.view = Some(GfxImageView::new(ctx, self.handle, self.format, &self.name));
        }
        self.view.as_ref().unwrap().handle()
    }

    /// 已创建的 view；没有时返回 None
    #[inline]
    pub fn view(&self) -> Option<vk::ImageView> {
        self.view.as_ref().map(|v| v.handle())
    }
}
