// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash with safety and ergonomics

pub mod commands;
pub mod context;
pub mod device;
pub mod swapchain;

pub use commands::FrameCommands;
pub use context::VulkanContext;
pub use device::VulkanDevice;
pub use swapchain::Swapchain;
