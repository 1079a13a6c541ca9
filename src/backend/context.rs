// VulkanContext - the real GpuContext over ash
//
// Bundles device + swapchain + per-slot command buffers behind the narrow
// seam the frame controller programs against. The swapchain sits behind a
// mutex because recreation rewrites it while the trait only hands out
// shared references.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use parking_lot::Mutex;

use super::{FrameCommands, Swapchain, VulkanDevice};
use crate::error::{FrameSyncError, Result};
use crate::gpu::{
    AcquireOutcome, Extent, FenceWait, GpuContext, PresentOutcome, SlotIndex,
};

pub struct VulkanContext {
    device: Arc<VulkanDevice>,
    swapchain: Mutex<Swapchain>,
    commands: FrameCommands,
}

impl VulkanContext {
    pub fn new(device: Arc<VulkanDevice>, swapchain: Swapchain, commands: FrameCommands) -> Self {
        Self {
            device,
            swapchain: Mutex::new(swapchain),
            commands,
        }
    }

    pub fn device(&self) -> &Arc<VulkanDevice> {
        &self.device
    }

    /// Swapchain image behind an index returned by acquisition. Valid for
    /// the current frame only.
    pub fn image(&self, index: u32) -> vk::Image {
        self.swapchain.lock().images[index as usize]
    }
}

fn fault(context: &str, e: impl std::fmt::Display) -> FrameSyncError {
    FrameSyncError::fault(context, e)
}

impl GpuContext for VulkanContext {
    type Semaphore = vk::Semaphore;
    type Fence = vk::Fence;
    type CommandBuffer = vk::CommandBuffer;

    fn create_semaphore(&self) -> Result<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device.device.create_semaphore(&info, None) }
            .map_err(|e| fault("vkCreateSemaphore", e))
    }

    fn create_fence_signaled(&self) -> Result<vk::Fence> {
        let info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        unsafe { self.device.device.create_fence(&info, None) }
            .map_err(|e| fault("vkCreateFence", e))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.device.destroy_semaphore(semaphore, None) };
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.device.destroy_fence(fence, None) };
    }

    fn wait_fence(&self, fence: vk::Fence, timeout: Option<Duration>) -> Result<FenceWait> {
        let timeout_ns = timeout.map_or(u64::MAX, |t| t.as_nanos().min(u64::MAX as u128) as u64);
        let result =
            unsafe { self.device.device.wait_for_fences(&[fence], true, timeout_ns) };
        match result {
            Ok(()) => Ok(FenceWait::Signaled),
            Err(vk::Result::TIMEOUT) => Ok(FenceWait::TimedOut),
            Err(e) => Err(fault("vkWaitForFences", e)),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device.device.reset_fences(&[fence]) }
            .map_err(|e| fault("vkResetFences", e))
    }

    fn graphics_buffer(&self, slot: SlotIndex) -> vk::CommandBuffer {
        self.commands.graphics(slot)
    }

    fn compute_buffer(&self, slot: SlotIndex) -> vk::CommandBuffer {
        self.commands.compute(slot)
    }

    fn reset_commands(&self, buffer: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.device
                .device
                .reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(|e| fault("vkResetCommandBuffer", e))
    }

    fn begin_commands(&self, buffer: vk::CommandBuffer) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.device.device.begin_command_buffer(buffer, &info) }
            .map_err(|e| fault("vkBeginCommandBuffer", e))
    }

    fn end_commands(&self, buffer: vk::CommandBuffer) -> Result<()> {
        unsafe { self.device.device.end_command_buffer(buffer) }
            .map_err(|e| fault("vkEndCommandBuffer", e))
    }

    fn acquire_image(&self, signal: vk::Semaphore) -> Result<AcquireOutcome> {
        self.swapchain
            .lock()
            .acquire_next_image(signal)
            .map_err(|e| fault("acquire", format!("{e:#}")))
    }

    fn submit_graphics(
        &self,
        buffer: vk::CommandBuffer,
        waits: &[vk::Semaphore],
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        // Every wait gates color output: nothing is written to the image
        // before acquisition (and compute, when present) has signaled
        let wait_stages =
            vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; waits.len()];
        let command_buffers = [buffer];
        let signal_semaphores = [signal];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(waits)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.graphics_queue,
                &[submit_info.build()],
                fence,
            )
        }
        .map_err(|e| fault("vkQueueSubmit(graphics)", e))
    }

    fn submit_compute(
        &self,
        buffer: vk::CommandBuffer,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> Result<()> {
        let command_buffers = [buffer];
        let signal_semaphores = [signal];

        let submit_info = vk::SubmitInfo::builder()
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.device.queue_submit(
                self.device.compute_queue,
                &[submit_info.build()],
                fence,
            )
        }
        .map_err(|e| fault("vkQueueSubmit(compute)", e))
    }

    fn present(&self, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome> {
        self.swapchain
            .lock()
            .present(self.device.present_queue, image_index, wait)
            .map_err(|e| fault("present", format!("{e:#}")))
    }

    fn recreate_surface(&self, extent: Extent) -> Result<()> {
        self.swapchain
            .lock()
            .recreate(extent.width, extent.height)
            .map_err(|e| fault("swapchain recreation", format!("{e:#}")))
    }
}
