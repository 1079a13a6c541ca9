// Command buffers - one graphics and one compute buffer per frame slot
//
// Buffers are allocated from a pool belonging to the family they are
// submitted on, so graphics and compute get separate pools when the device
// exposes a dedicated compute family.

use anyhow::Result;
use ash::vk;
use std::sync::Arc;

use super::VulkanDevice;
use crate::gpu::{SlotIndex, FRAMES_IN_FLIGHT};

pub struct FrameCommands {
    graphics_pool: vk::CommandPool,
    compute_pool: vk::CommandPool,
    graphics_buffers: Vec<vk::CommandBuffer>,
    compute_buffers: Vec<vk::CommandBuffer>,
    device: Arc<VulkanDevice>,
}

impl FrameCommands {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self> {
        let graphics_pool = create_pool(&device, device.graphics_queue_family)?;
        let compute_pool = if device.compute_queue_family == device.graphics_queue_family {
            graphics_pool
        } else {
            create_pool(&device, device.compute_queue_family)?
        };

        let graphics_buffers = allocate(&device, graphics_pool)?;
        let compute_buffers = allocate(&device, compute_pool)?;

        log::info!(
            "Allocated {} graphics + {} compute command buffers",
            graphics_buffers.len(),
            compute_buffers.len()
        );

        Ok(Self {
            graphics_pool,
            compute_pool,
            graphics_buffers,
            compute_buffers,
            device,
        })
    }

    pub fn graphics(&self, slot: SlotIndex) -> vk::CommandBuffer {
        self.graphics_buffers[slot]
    }

    pub fn compute(&self, slot: SlotIndex) -> vk::CommandBuffer {
        self.compute_buffers[slot]
    }
}

fn create_pool(device: &VulkanDevice, queue_family: u32) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(queue_family)
        // RESET: slots reset their own buffer each frame
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    Ok(unsafe { device.device.create_command_pool(&pool_info, None) }?)
}

fn allocate(device: &VulkanDevice, pool: vk::CommandPool) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::builder()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(FRAMES_IN_FLIGHT as u32);

    Ok(unsafe { device.device.allocate_command_buffers(&alloc_info) }?)
}

impl Drop for FrameCommands {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_command_pool(self.graphics_pool, None);
            if self.compute_pool != self.graphics_pool {
                self.device.device.destroy_command_pool(self.compute_pool, None);
            }
        }
    }
}
