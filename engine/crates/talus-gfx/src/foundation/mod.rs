pub mod debug_type;
pub mod device;
pub mod gfx_context;
