// GPU seam - narrow interface between the controller and the device
//
// Design: the controller never touches ash directly. Everything it needs
// from the device, the swapchain and the command source goes through this
// trait, so the real Vulkan backend and a recording fake are interchangeable.

use std::fmt::Debug;
use std::time::Duration;

use crate::error::Result;

/// Number of frames that may be in flight simultaneously. Each has its own
/// slot of synchronization primitives and command buffers.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Index of an in-flight frame slot, always in `0..FRAMES_IN_FLIGHT`.
pub type SlotIndex = usize;

/// Surface dimensions in pixels, pushed by the caller every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

/// Outcome of waiting on a CPU-wait fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceWait {
    Signaled,
    /// Only possible with a bounded timeout; unbounded waits block forever.
    TimedOut,
}

/// Outcome of requesting the next presentable image.
///
/// Suboptimal is folded into `Acquired`: the image is still presentable, so
/// the frame proceeds and recreation happens opportunistically at present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    /// The surface no longer matches the swapchain; nothing was acquired.
    OutOfDate,
}

/// Outcome of presenting an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented { suboptimal: bool },
    OutOfDate,
}

/// What `acquire_next_image` hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// A presentable image, valid for this frame only.
    Ready(u32),
    /// The surface was invalidated and recreated; abandon this frame
    /// cleanly and do not submit.
    SkipFrame,
}

/// Everything the frame controller needs from the GPU.
///
/// Implemented by [`VulkanContext`](crate::backend::VulkanContext) over ash,
/// and by integer-handle fakes in tests. All methods that talk to a queue or
/// the surface take `&self`; implementations guard mutable state internally.
pub trait GpuContext {
    type Semaphore: Copy + Eq + Debug;
    type Fence: Copy + Eq + Debug;
    type CommandBuffer: Copy + Debug;

    // Primitive lifecycle. Created once at controller construction,
    // destroyed once at teardown, never recreated for resize.
    fn create_semaphore(&self) -> Result<Self::Semaphore>;
    /// Fences are created pre-signaled so the first frame does not block.
    fn create_fence_signaled(&self) -> Result<Self::Fence>;
    fn destroy_semaphore(&self, semaphore: Self::Semaphore);
    fn destroy_fence(&self, fence: Self::Fence);

    /// Block until `fence` signals. `None` waits without bound.
    fn wait_fence(&self, fence: Self::Fence, timeout: Option<Duration>) -> Result<FenceWait>;
    fn reset_fence(&self, fence: Self::Fence) -> Result<()>;

    // Command source: one graphics and one compute buffer per slot,
    // independently recordable and resettable.
    fn graphics_buffer(&self, slot: SlotIndex) -> Self::CommandBuffer;
    fn compute_buffer(&self, slot: SlotIndex) -> Self::CommandBuffer;
    fn reset_commands(&self, buffer: Self::CommandBuffer) -> Result<()>;
    fn begin_commands(&self, buffer: Self::CommandBuffer) -> Result<()>;
    fn end_commands(&self, buffer: Self::CommandBuffer) -> Result<()>;

    /// Request the next presentable image, signaling `signal` when it is
    /// actually available to be written.
    fn acquire_image(&self, signal: Self::Semaphore) -> Result<AcquireOutcome>;

    /// Submit graphics work. Every semaphore in `waits` gates the
    /// color-attachment-output stage; `signal` and `fence` fire on retire.
    fn submit_graphics(
        &self,
        buffer: Self::CommandBuffer,
        waits: &[Self::Semaphore],
        signal: Self::Semaphore,
        fence: Self::Fence,
    ) -> Result<()>;

    /// Submit compute work with no waits; `signal` and `fence` fire on
    /// retire.
    fn submit_compute(
        &self,
        buffer: Self::CommandBuffer,
        signal: Self::Semaphore,
        fence: Self::Fence,
    ) -> Result<()>;

    /// Queue `image_index` for display once `wait` signals.
    fn present(&self, image_index: u32, wait: Self::Semaphore) -> Result<PresentOutcome>;

    /// Rebuild the presentation surface for a new extent. Invalidates any
    /// image index acquired before the call.
    fn recreate_surface(&self, extent: Extent) -> Result<()>;
}
