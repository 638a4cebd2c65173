//! Pipeline barrier 的构建器封装
//!
//! 录制阶段收集 [`GfxImageBarrier`] / [`GfxBufferBarrier`]，
//! 最终通过 `GfxCommandBuffer::pipeline_barrier2` 一次性录制。

use ash::vk;

/// 图像 barrier 描述，可转换为 `vk::ImageMemoryBarrier2`
#[derive(Clone, Copy, Debug, Default)]
pub struct GfxImageBarrier {
    image: vk::Image,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    aspect: vk::ImageAspectFlags,
}

impl GfxImageBarrier {
    pub fn new() -> Self {
        Self {
            aspect: vk::ImageAspectFlags::COLOR,
            ..Default::default()
        }
    }

    #[inline]
    pub fn image(mut self, image: vk::Image) -> Self {
        self.image = image;
        self
    }

    #[inline]
    pub fn layout_transfer(mut self, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> Self {
        self.old_layout = old_layout;
        self.new_layout = new_layout;
        self
    }

    #[inline]
    pub fn src_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.src_stage = stage;
        self.src_access = access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.dst_stage = stage;
        self.dst_access = access;
        self
    }

    #[inline]
    pub fn image_aspect_flag(mut self, aspect: vk::ImageAspectFlags) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn vk_barrier(&self) -> vk::ImageMemoryBarrier2<'static> {
        vk::ImageMemoryBarrier2::default()
            .image(self.image)
            .src_stage_mask(self.src_stage)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stage)
            .dst_access_mask(self.dst_access)
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(self.aspect)
                    .base_mip_level(0)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .base_array_layer(0)
                    .layer_count(vk::REMAINING_ARRAY_LAYERS),
            )
    }

    #[inline]
    pub fn old_layout(&self) -> vk::ImageLayout {
        self.old_layout
    }

    #[inline]
    pub fn new_layout(&self) -> vk::ImageLayout {
        self.new_layout
    }
}

/// 缓冲区 barrier 描述，可转换为 `vk::BufferMemoryBarrier2`
#[derive(Clone, Copy, Debug, Default)]
pub struct GfxBufferBarrier {
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
}

impl GfxBufferBarrier {
    pub fn new() -> Self {
        Self {
            size: vk::WHOLE_SIZE,
            ..Default::default()
        }
    }

    #[inline]
    pub fn buffer(mut self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        self.buffer = buffer;
        self.offset = offset;
        self.size = size;
        self
    }

    #[inline]
    pub fn src_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.src_stage = stage;
        self.src_access = access;
        self
    }

    #[inline]
    pub fn dst_mask(mut self, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        self.dst_stage = stage;
        self.dst_access = access;
        self
    }

    pub fn vk_barrier(&self) -> vk::BufferMemoryBarrier2<'static> {
        vk::BufferMemoryBarrier2::default()
            .buffer(self.buffer)
            .offset(self.offset)
            .size(self.size)
            .src_stage_mask(self.src_stage)
            .src_access_mask(self.src_access)
            .dst_stage_mask(self.dst_stage)
            .dst_access_mask(self.dst_access)
    }
}

/// 根据 format 推断图像的 aspect flags
pub fn infer_image_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }

        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }

        _ => vk::ImageAspectFlags::COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_image_aspect() {
        assert_eq!(infer_image_aspect(vk::Format::R8G8B8A8_UNORM), vk::ImageAspectFlags::COLOR);
        assert_eq!(infer_image_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            infer_image_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
    }
}
