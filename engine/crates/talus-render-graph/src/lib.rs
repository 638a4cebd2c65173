//! Talus 渲染图
//!
//! 声明式的 GPU 工作调度层：pass 声明自己读写的逻辑资源，
//! 引擎负责
//! - 物理资源的创建、内存共享分配与绑定；
//! - pass 之间 *最小且正确* 的 pipeline barrier；
//! - 命令缓冲区的批量录制与带 semaphore 依赖的队列提交。
//!
//! # 核心概念
//!
//! - **RgBufferHandle / RgImageHandle**: 逻辑资源句柄（slotmap key）
//! - **RgAccess / RgAccessDependency**: 访问描述与 barrier 依赖
//! - **RgResourceSynchronizer / RgPassSynchronizer**: 访问同步器
//! - **RgResourceManager**: 逻辑资源到物理资源的管理
//! - **RgPass**: pass trait，声明访问并录制命令
//! - **RgExecutor**: 按 semaphore 边界切 batch 的批量提交调度器
//! - **RenderGraph**: 编排以上所有组件
//!
//! # 执行模型
//!
//! 单 CPU 线程驱动录制与提交，并发只存在于 CPU/GPU 重叠：
//! 命令池用非阻塞的 fence 轮询回收 in-flight 命令缓冲区，
//! 稳态帧循环中没有任何 CPU 阻塞点。
//!
//! # 使用示例
//!
//! ```ignore
//! let mut graph = RenderGraph::new(&ctx);
//!
//! let buffer = graph.resources().add_buffer("particles", RgBufferDesc::new(1024));
//! graph.add_pass("simulate", Box::new(SimulatePass::new(buffer)), vk::PipelineStageFlags2::COMPUTE_SHADER, None, None);
//! graph.add_pass("draw", Box::new(DrawPass::new(buffer)), vk::PipelineStageFlags2::COMPUTE_SHADER, None, None);
//!
//! graph.init(&ctx, &present);
//! loop {
//!     graph.render_frame(&mut ctx, &mut present);
//! }
//! ```

mod access;
mod debug_fmt;
mod executor;
mod graph;
mod pass;
mod resource;
mod resource_manager;
mod sync;

// Re-exports
pub use access::{RgAccess, RgAccessDependency};
pub use debug_fmt::{format_access_flags, format_stage_flags};
pub use executor::{RgExecutor, RgSemaphoreInfo, RgTaskDesc};
pub use graph::{FrameStatus, RenderGraph};
pub use pass::{RgPass, RgPassContext};
pub use resource::{RgBufferDesc, RgBufferHandle, RgImageDesc, RgImageHandle};
pub use resource_manager::RgResourceManager;
pub use sync::{RgPassSynchronizer, RgPhysicalRef, RgResourceSynchronizer};
