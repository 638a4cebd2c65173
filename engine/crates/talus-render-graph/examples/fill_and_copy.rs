//! 无窗口的最小渲染图示例
//!
//! 两个 transfer pass 共享一个 buffer：
//! - `fill` 用 `vkCmdFillBuffer` 写入魔数；
//! - `readback` 把它拷贝到 HOST_VISIBLE 的 buffer。
//!
//! 渲染图会自动在两个 pass 之间插入 write→read barrier。
//! 跑完一帧后从 mapped 指针读回数据做校验。

use ash::vk;

use talus_gfx::foundation::gfx_context::GfxContext;
use talus_gfx::swapchain::present_target::{GfxAcquireStatus, PresentTarget};
use talus_render_graph::{
    FrameStatus, RenderGraph, RgAccess, RgBufferDesc, RgBufferHandle, RgPass, RgPassContext, RgResourceManager,
};

const ELEMENT_COUNT: usize = 256;
const FILL_VALUE: u32 = 0x4242_4242;
const BUFFER_SIZE: vk::DeviceSize = (ELEMENT_COUNT * size_of::<u32>()) as vk::DeviceSize;

/// 没有窗口系统时的呈现目标：acquire 永远成功
struct HeadlessTarget;

impl PresentTarget for HeadlessTarget {
    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: 1920,
            height: 1080,
        }
    }

    fn format(&self) -> vk::Format {
        vk::Format::B8G8R8A8_UNORM
    }

    fn acquire_next(&mut self) -> GfxAcquireStatus {
        GfxAcquireStatus::Ready(0)
    }
}

struct FillPass {
    buffer: RgBufferHandle,
}

impl RgPass for FillPass {
    fn bind_resources(&mut self, resource_manager: &mut RgResourceManager) {
        resource_manager.require_buffer_properties(
            self.buffer,
            &RgBufferDesc::new(BUFFER_SIZE).usage(vk::BufferUsageFlags::TRANSFER_DST),
        );
    }

    fn on_pre_record(&mut self, resource_manager: &mut RgResourceManager, pass_idx: u32) {
        resource_manager.declare_buffer_access(self.buffer, RgAccess::TRANSFER_DST_BUFFER, pass_idx);
    }

    fn on_record(&self, ctx: &RgPassContext<'_>) {
        let buffer = ctx.resource_manager.buffer(self.buffer);
        unsafe {
            ctx.gfx.device().cmd_fill_buffer(ctx.cmd.vk_handle(), buffer.vk_buffer(), 0, vk::WHOLE_SIZE, FILL_VALUE);
        }
    }
}

struct ReadbackPass {
    src: RgBufferHandle,
    dst: RgBufferHandle,
}

impl RgPass for ReadbackPass {
    fn bind_resources(&mut self, resource_manager: &mut RgResourceManager) {
        resource_manager
            .require_buffer_properties(self.src, &RgBufferDesc::default().usage(vk::BufferUsageFlags::TRANSFER_SRC));
        resource_manager.require_buffer_properties(
            self.dst,
            &RgBufferDesc::new(BUFFER_SIZE)
                .usage(vk::BufferUsageFlags::TRANSFER_DST)
                .memory(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT),
        );
    }

    fn on_pre_record(&mut self, resource_manager: &mut RgResourceManager, pass_idx: u32) {
        resource_manager.declare_buffer_access(self.src, RgAccess::TRANSFER_SRC_BUFFER, pass_idx);
        resource_manager.declare_buffer_access(self.dst, RgAccess::TRANSFER_DST_BUFFER, pass_idx);
    }

    fn on_record(&self, ctx: &RgPassContext<'_>) {
        let src = ctx.resource_manager.buffer(self.src);
        let dst = ctx.resource_manager.buffer(self.dst);
        let region = vk::BufferCopy {
            size: BUFFER_SIZE,
            ..Default::default()
        };
        unsafe {
            ctx.gfx.device().cmd_copy_buffer(ctx.cmd.vk_handle(), src.vk_buffer(), dst.vk_buffer(), &[region]);
        }
    }
}

fn main() {
    talus_crate_tools::init_log::init_log();

    // instance 与 physical device 的选择不属于引擎，示例里就地完成
    let entry = unsafe { ash::Entry::load().expect("failed to load Vulkan") };
    let app_info = vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_3);
    let instance_exts = [ash::ext::debug_utils::NAME.as_ptr()];
    let instance_ci =
        vk::InstanceCreateInfo::default().application_info(&app_info).enabled_extension_names(&instance_exts);
    let instance = unsafe { entry.create_instance(&instance_ci, None).unwrap() };

    let pdevices = unsafe { instance.enumerate_physical_devices().unwrap() };
    let (pdevice, queue_family_index) = pdevices
        .iter()
        .find_map(|&pdevice| {
            let props = unsafe { instance.get_physical_device_queue_family_properties(pdevice) };
            props
                .iter()
                .position(|p| p.queue_flags.contains(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER))
                .map(|i| (pdevice, i as u32))
        })
        .expect("no queue family with COMPUTE | TRANSFER");

    let ctx = GfxContext::new(&instance, pdevice, queue_family_index);
    let mut present = HeadlessTarget;

    // 图构建：资源 + 两个 pass，注册顺序即执行顺序
    let mut graph = RenderGraph::new(&ctx);
    let scratch = graph.resources().add_buffer("scratch", RgBufferDesc::default());
    let readback = graph.resources().add_buffer("readback", RgBufferDesc::default());

    graph.add_pass("fill", Box::new(FillPass { buffer: scratch }), vk::PipelineStageFlags2::TRANSFER, None, None);
    graph.add_pass(
        "readback",
        Box::new(ReadbackPass {
            src: scratch,
            dst: readback,
        }),
        vk::PipelineStageFlags2::TRANSFER,
        None,
        None,
    );

    graph.init(&ctx, &present);
    graph.log_execution_plan();

    let status = graph.render_frame(&ctx, &mut present);
    assert_eq!(status, FrameStatus::Rendered);
    ctx.wait_idle();

    // 从 mapped 指针读回结果
    let mapped = graph.resources().buffer(readback).mapped_ptr();
    let data = unsafe { std::slice::from_raw_parts(mapped as *const u32, ELEMENT_COUNT) };
    assert!(data.iter().all(|&v| v == FILL_VALUE), "readback mismatch: {:#x?}", &data[..4]);
    log::info!("readback verified: {} elements of {:#x}", ELEMENT_COUNT, FILL_VALUE);

    graph.destroy(&ctx);
    ctx.destroy();
    unsafe {
        instance.destroy_instance(None);
    }
}
