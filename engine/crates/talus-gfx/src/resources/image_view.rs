use ash::vk;

use crate::commands::barrier::infer_image_aspect;
use crate::foundation::{debug_type::DebugType, gfx_context::GfxContext};

pub struct GfxImageView {
    handle: vk::ImageView,

    format: vk::Format,
}

impl DebugType for GfxImageView {
    fn debug_type_name() -> &'static str {
        "GfxImageView"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

// new & init
impl GfxImageView {
    /// 创建覆盖整个 image 的 2D view，aspect 根据 format 推断
    pub fn new(ctx: &GfxContext, image: vk::Image, format: vk::Format, name: impl AsRef<str>) -> Self {
        let info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(infer_image_aspect(format))
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let handle = unsafe { ctx.device().create_image_view(&info, None).expect("Failed to create GfxImageView") };
        let image_view = Self { handle, format };
        ctx.device().set_debug_name(&image_view, &name);
        image_view
    }
}

// destroy
impl GfxImageView {
    pub fn destroy(self, ctx: &GfxContext) {
        unsafe {
            ctx.device().destroy_image_view(self.handle, None);
        }
    }
}

// getters
impl GfxImageView {
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }
}
