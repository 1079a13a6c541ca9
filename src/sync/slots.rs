// Per-slot synchronization primitives
//
// Five primitives per in-flight frame: three GPU-wait semaphores, two
// CPU-wait fences. Created once, reused every rotation.

use std::time::Duration;

use crate::error::{FrameSyncError, Result};
use crate::gpu::{FenceWait, GpuContext, SlotIndex, FRAMES_IN_FLIGHT};

/// Synchronization primitives for one in-flight frame.
pub struct FrameSlot<G: GpuContext> {
    /// Signaled by the presentation engine when the acquired image may be
    /// written; waited on by graphics before color output.
    pub image_available: G::Semaphore,
    /// Signaled when graphics work finishes; waited on by presentation.
    pub render_finished: G::Semaphore,
    /// Signaled when compute work finishes; waited on by graphics, but only
    /// in frames that actually submitted compute.
    pub compute_finished: G::Semaphore,
    /// CPU-side gate: signaled when the graphics queue retires this slot's
    /// work. Starts signaled so the first frame does not block.
    pub graphics_in_flight: G::Fence,
    /// CPU-side gate for the compute queue, same lifecycle.
    pub compute_in_flight: G::Fence,
}

impl<G: GpuContext> FrameSlot<G> {
    fn new(gpu: &G) -> Result<Self> {
        Ok(Self {
            image_available: gpu.create_semaphore()?,
            render_finished: gpu.create_semaphore()?,
            compute_finished: gpu.create_semaphore()?,
            graphics_in_flight: gpu.create_fence_signaled()?,
            compute_in_flight: gpu.create_fence_signaled()?,
        })
    }

    fn destroy(&self, gpu: &G) {
        gpu.destroy_semaphore(self.image_available);
        gpu.destroy_semaphore(self.render_finished);
        gpu.destroy_semaphore(self.compute_finished);
        gpu.destroy_fence(self.graphics_in_flight);
        gpu.destroy_fence(self.compute_in_flight);
    }
}

/// The full set of in-flight frame slots.
///
/// Operations take an explicit `slot` index; the set holds no cursor of its
/// own. The controller is the only place that decides which slot is hot.
pub struct FrameSlots<G: GpuContext> {
    slots: Vec<FrameSlot<G>>,
}

impl<G: GpuContext> FrameSlots<G> {
    /// Create primitives for all slots. Construction failure is fatal to
    /// the caller; primitives created before the failure are released here.
    pub fn new(gpu: &G) -> Result<Self> {
        let mut slots = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for _ in 0..FRAMES_IN_FLIGHT {
            match FrameSlot::new(gpu) {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    for slot in &slots {
                        slot.destroy(gpu);
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { slots })
    }

    pub fn slot(&self, slot: SlotIndex) -> &FrameSlot<G> {
        &self.slots[slot]
    }

    /// Block until the graphics queue retires `slot`'s work.
    ///
    /// `timeout` of `None` blocks without bound: if the GPU never retires
    /// the work there is no useful fallback. A bounded timeout elapsing
    /// surfaces [`FrameSyncError::DeviceUnresponsive`].
    pub fn wait_graphics(&self, gpu: &G, slot: SlotIndex, timeout: Option<Duration>) -> Result<()> {
        wait_checked(gpu, self.slots[slot].graphics_in_flight, timeout)
    }

    /// Un-signal the graphics fence and reset the slot's graphics command
    /// buffer to empty-but-reusable.
    ///
    /// Caller contract: only after [`wait_graphics`](Self::wait_graphics)
    /// returned for the same slot. Calling it earlier races with in-flight
    /// GPU reads of the command buffer.
    pub fn reset_graphics(&self, gpu: &G, slot: SlotIndex) -> Result<()> {
        gpu.reset_fence(self.slots[slot].graphics_in_flight)?;
        gpu.reset_commands(gpu.graphics_buffer(slot))
    }

    /// Block until the compute queue retires `slot`'s work.
    pub fn wait_compute(&self, gpu: &G, slot: SlotIndex, timeout: Option<Duration>) -> Result<()> {
        wait_checked(gpu, self.slots[slot].compute_in_flight, timeout)
    }

    /// Compute counterpart of [`reset_graphics`](Self::reset_graphics),
    /// with the same after-wait contract.
    pub fn reset_compute(&self, gpu: &G, slot: SlotIndex) -> Result<()> {
        gpu.reset_fence(self.slots[slot].compute_in_flight)?;
        gpu.reset_commands(gpu.compute_buffer(slot))
    }

    /// Teardown: wait for every slot's fences before destroying anything,
    /// so no primitive dies while the GPU still references it. Waits are
    /// best-effort; destruction proceeds regardless.
    pub fn destroy(&self, gpu: &G) {
        for (i, slot) in self.slots.iter().enumerate() {
            if gpu.wait_fence(slot.graphics_in_flight, None).is_err() {
                log::warn!("graphics fence wait failed during teardown (slot {i})");
            }
            if gpu.wait_fence(slot.compute_in_flight, None).is_err() {
                log::warn!("compute fence wait failed during teardown (slot {i})");
            }
        }
        for slot in &self.slots {
            slot.destroy(gpu);
        }
    }
}

fn wait_checked<G: GpuContext>(gpu: &G, fence: G::Fence, timeout: Option<Duration>) -> Result<()> {
    match gpu.wait_fence(fence, timeout)? {
        FenceWait::Signaled => Ok(()),
        FenceWait::TimedOut => Err(FrameSyncError::DeviceUnresponsive {
            // TimedOut is only reachable with a bounded timeout
            waited: timeout.unwrap_or_default(),
        }),
    }
}
