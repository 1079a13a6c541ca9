// Frame controller - the per-frame state machine
//
// One frame: acquire -> (optional compute) -> graphics -> present -> rotate.
// Two slots alternate so one frame can be recorded while the previous one
// is still in flight on the GPU. All ordering between the graphics queue,
// the compute queue and the presentation engine is expressed through the
// per-slot primitives in `FrameSlots`; the CPU side is single-threaded.

use std::time::Duration;

use crate::error::{FrameSyncError, Result};
use crate::gpu::{
    AcquireOutcome, AcquiredImage, Extent, GpuContext, PresentOutcome, SlotIndex, FRAMES_IN_FLIGHT,
};
use crate::sync::slots::FrameSlots;

/// Compute-to-graphics dependency for one frame.
///
/// Produced by [`FrameSync::submit_compute`], consumed by value exactly once
/// by [`FrameSync::submit`]. A frame without compute passes the default. The
/// move makes it impossible for one frame's compute dependency to leak into
/// the next frame's wait set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPlan<S> {
    /// Graphics waits on image acquisition only.
    NoComputeDependency,
    /// Graphics additionally waits on the given compute-finished semaphore.
    /// Omitting this wait when compute ran is a race; adding it when
    /// compute did not run would deadlock, since nothing would signal it.
    ComputeDependency(S),
}

impl<S> Default for SubmissionPlan<S> {
    fn default() -> Self {
        Self::NoComputeDependency
    }
}

/// Controller tuning, filled from `[sync]` in config.toml.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Bound for CPU-side fence waits. `None` (the default) blocks without
    /// timeout, matching the expectation that a GPU which never retires
    /// work is a fatal fault with no fallback.
    pub wait_timeout: Option<Duration>,
}

/// Double-buffered frame-synchronization controller.
///
/// Owns the per-slot primitives, the active-slot cursor and the pending
/// surface extent. All calls come from one CPU thread; the GPU queues run
/// asynchronously against it and against each other.
pub struct FrameSync<G: GpuContext> {
    gpu: G,
    slots: FrameSlots<G>,
    /// The one hot slot. Advanced exactly one modulo-2 step per completed
    /// presentation, mutated nowhere else.
    active: SlotIndex,
    /// Must be refreshed via `push_extent` every frame before submission;
    /// cleared on rotation. Recreation paths read it.
    pending_extent: Option<Extent>,
    wait_timeout: Option<Duration>,
}

impl<G: GpuContext> FrameSync<G> {
    /// Create all synchronization primitives up front. Failure here is
    /// fatal to the caller: the controller cannot run without them.
    pub fn new(gpu: G, options: SyncOptions) -> Result<Self> {
        let slots = FrameSlots::new(&gpu)?;
        log::info!(
            "frame controller ready: {} slots in flight, fence timeout {:?}",
            FRAMES_IN_FLIGHT,
            options.wait_timeout,
        );
        Ok(Self {
            gpu,
            slots,
            active: 0,
            pending_extent: None,
            wait_timeout: options.wait_timeout,
        })
    }

    /// Access the underlying GPU context, e.g. to record commands into the
    /// active slot's buffers between begin and end.
    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    /// Index of the currently hot slot.
    pub fn current_slot(&self) -> SlotIndex {
        self.active
    }

    /// Refresh the surface dimensions. Must be called once per frame before
    /// submission; recreation on an invalidated surface needs them.
    pub fn push_extent(&mut self, width: u32, height: u32) {
        self.pending_extent = Some(Extent { width, height });
    }

    // ------------------------------------------------------------------
    // Acquisition
    // ------------------------------------------------------------------

    /// Request the next presentable image, signaling the active slot's
    /// acquire semaphore when it becomes available.
    ///
    /// Out-of-date surfaces are recreated with the pushed extent and the
    /// frame is abandoned via [`AcquiredImage::SkipFrame`]; the caller must
    /// not submit in that case. Suboptimal acquisition proceeds as success:
    /// the image is still presentable, recreation happens opportunistically
    /// at present. The returned index is valid for this frame only.
    pub fn acquire_next_image(&mut self) -> Result<AcquiredImage> {
        let slot = self.slots.slot(self.active);
        match self.gpu.acquire_image(slot.image_available)? {
            AcquireOutcome::Acquired { index, .. } => Ok(AcquiredImage::Ready(index)),
            AcquireOutcome::OutOfDate => {
                self.recreate_surface()?;
                Ok(AcquiredImage::SkipFrame)
            }
        }
    }

    // ------------------------------------------------------------------
    // Compute stage
    // ------------------------------------------------------------------

    /// Block until the compute queue retires the active slot's work.
    pub fn wait_compute(&self) -> Result<()> {
        self.slots.wait_compute(&self.gpu, self.active, self.wait_timeout)
    }

    /// Un-signal the compute fence and reset the compute command buffer.
    /// Only valid after [`wait_compute`](Self::wait_compute) returned.
    pub fn reset_compute(&self) -> Result<()> {
        self.slots.reset_compute(&self.gpu, self.active)
    }

    /// Open the active slot's compute command buffer for recording.
    pub fn begin_compute(&self) -> Result<()> {
        self.gpu.begin_commands(self.gpu.compute_buffer(self.active))
    }

    /// Close compute recording. Failure indicates a recording-API contract
    /// violation upstream and is fatal.
    pub fn end_compute(&self) -> Result<()> {
        self.gpu.end_commands(self.gpu.compute_buffer(self.active))
    }

    /// Enqueue the recorded compute buffer to the compute queue, signaling
    /// the compute semaphore and fence on retirement. Requires a prior
    /// `begin_compute`/`end_compute` pair this slot; without one there are
    /// no buffered commands and the submission is undefined.
    ///
    /// The returned plan carries the compute-finished semaphore into this
    /// frame's graphics wait set.
    pub fn submit_compute(&self) -> Result<SubmissionPlan<G::Semaphore>> {
        let slot = self.slots.slot(self.active);
        self.gpu
            .submit_compute(self.gpu.compute_buffer(self.active), slot.compute_finished, slot.compute_in_flight)?;
        Ok(SubmissionPlan::ComputeDependency(slot.compute_finished))
    }

    // ------------------------------------------------------------------
    // Graphics stage
    // ------------------------------------------------------------------

    /// Block until the graphics queue retires the active slot's work.
    pub fn wait_graphics(&self) -> Result<()> {
        self.slots.wait_graphics(&self.gpu, self.active, self.wait_timeout)
    }

    /// Un-signal the graphics fence and reset the graphics command buffer.
    /// Only valid after [`wait_graphics`](Self::wait_graphics) returned;
    /// earlier, the GPU may still be reading the buffer.
    pub fn reset_graphics(&self) -> Result<()> {
        self.slots.reset_graphics(&self.gpu, self.active)
    }

    /// Open the active slot's graphics command buffer for recording.
    pub fn begin_graphics(&self) -> Result<()> {
        self.gpu.begin_commands(self.gpu.graphics_buffer(self.active))
    }

    /// Close graphics recording. Fatal on failure, like `end_compute`.
    pub fn end_graphics(&self) -> Result<()> {
        self.gpu.end_commands(self.gpu.graphics_buffer(self.active))
    }

    /// Submit the active slot's graphics work.
    ///
    /// The wait set is composed from `plan`: graphics never starts color
    /// output before the image is acquired, and - only when a compute pass
    /// fed this frame - not before compute results are visible. Submission
    /// signals the render-finished semaphore and the graphics fence, which
    /// gates CPU reuse of the command buffer.
    ///
    /// Errors with [`FrameSyncError::ContractViolation`] if no extent was
    /// pushed this frame: recreation on a failed present needs it, so the
    /// caller must push dimensions before every submission.
    pub fn submit(&mut self, image_index: u32, plan: SubmissionPlan<G::Semaphore>) -> Result<()> {
        if self.pending_extent.is_none() {
            return Err(FrameSyncError::ContractViolation(
                "surface extent not pushed this frame; call push_extent() before submit()",
            ));
        }

        let slot = self.slots.slot(self.active);
        let waits_with_compute;
        let waits_plain;
        let waits: &[G::Semaphore] = match plan {
            SubmissionPlan::ComputeDependency(compute_finished) => {
                waits_with_compute = [slot.image_available, compute_finished];
                &waits_with_compute
            }
            SubmissionPlan::NoComputeDependency => {
                waits_plain = [slot.image_available];
                &waits_plain
            }
        };

        self.gpu.submit_graphics(
            self.gpu.graphics_buffer(self.active),
            waits,
            slot.render_finished,
            slot.graphics_in_flight,
        )
    }

    // ------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------

    /// Present `image_index` once rendering finishes, then rotate slots.
    ///
    /// Out-of-date and suboptimal results trigger surface recreation with
    /// the pushed extent; any other failure is fatal. Rotation happens here
    /// and only here, exactly once per completed frame - recreation does
    /// not skip it.
    pub fn present(&mut self, image_index: u32) -> Result<()> {
        let slot = self.slots.slot(self.active);
        match self.gpu.present(image_index, slot.render_finished)? {
            PresentOutcome::Presented { suboptimal: false } => {}
            PresentOutcome::Presented { suboptimal: true } | PresentOutcome::OutOfDate => {
                self.recreate_surface()?;
            }
        }
        self.active = (self.active + 1) % FRAMES_IN_FLIGHT;
        self.pending_extent = None;
        Ok(())
    }

    fn recreate_surface(&self) -> Result<()> {
        let extent = self.pending_extent.ok_or(FrameSyncError::ContractViolation(
            "surface invalidated but no extent pushed this frame; call push_extent() first",
        ))?;
        log::info!("surface invalidated, recreating at {}x{}", extent.width, extent.height);
        self.gpu.recreate_surface(extent)
    }
}

impl<G: GpuContext> Drop for FrameSync<G> {
    fn drop(&mut self) {
        log::info!("frame controller teardown: draining in-flight slots");
        self.slots.destroy(&self.gpu);
    }
}
