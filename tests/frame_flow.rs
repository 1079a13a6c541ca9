// Frame-flow properties over a recording fake GPU.
//
// The fake hands out integer handles, retires submissions instantly
// (signaling their fences) and logs every call, so the tests can assert on
// wait-set composition, slot rotation and teardown ordering without a
// device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use vk_frames::error::Result;
use vk_frames::gpu::{
    AcquireOutcome, AcquiredImage, Extent, FenceWait, GpuContext, PresentOutcome, SlotIndex,
};
use vk_frames::{FrameSync, FrameSyncError, SubmissionPlan, SyncOptions};

type Handle = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Acquire { signal: Handle },
    SubmitCompute { signal: Handle, fence: Handle },
    SubmitGraphics { waits: Vec<Handle>, signal: Handle, fence: Handle },
    Present { image: u32, wait: Handle },
    Recreate(Extent),
    WaitFence { fence: Handle, was_signaled: bool },
    DestroySemaphore(Handle),
    DestroyFence(Handle),
}

#[derive(Default)]
struct FakeState {
    next_handle: Handle,
    // (fence, signaled)
    fences: Vec<(Handle, bool)>,
    ops: Vec<Op>,
    acquire_results: VecDeque<AcquireOutcome>,
    present_results: VecDeque<PresentOutcome>,
}

impl FakeState {
    fn fence_signaled(&self, fence: Handle) -> bool {
        self.fences.iter().find(|(f, _)| *f == fence).map(|(_, s)| *s).unwrap()
    }

    fn set_fence(&mut self, fence: Handle, signaled: bool) {
        for entry in &mut self.fences {
            if entry.0 == fence {
                entry.1 = signaled;
            }
        }
    }
}

#[derive(Clone, Default)]
struct FakeGpu {
    state: Rc<RefCell<FakeState>>,
}

impl FakeGpu {
    fn new() -> Self {
        Self::default()
    }

    fn push_acquire(&self, outcome: AcquireOutcome) {
        self.state.borrow_mut().acquire_results.push_back(outcome);
    }

    fn push_present(&self, outcome: PresentOutcome) {
        self.state.borrow_mut().present_results.push_back(outcome);
    }

    fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    fn graphics_submissions(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, Op::SubmitGraphics { .. }))
            .collect()
    }
}

impl GpuContext for FakeGpu {
    type Semaphore = Handle;
    type Fence = Handle;
    type CommandBuffer = Handle;

    fn create_semaphore(&self) -> Result<Handle> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        Ok(state.next_handle)
    }

    fn create_fence_signaled(&self) -> Result<Handle> {
        let mut state = self.state.borrow_mut();
        state.next_handle += 1;
        let fence = state.next_handle;
        state.fences.push((fence, true));
        Ok(fence)
    }

    fn destroy_semaphore(&self, semaphore: Handle) {
        self.state.borrow_mut().ops.push(Op::DestroySemaphore(semaphore));
    }

    fn destroy_fence(&self, fence: Handle) {
        self.state.borrow_mut().ops.push(Op::DestroyFence(fence));
    }

    fn wait_fence(&self, fence: Handle, timeout: Option<Duration>) -> Result<FenceWait> {
        let mut state = self.state.borrow_mut();
        let signaled = state.fence_signaled(fence);
        state.ops.push(Op::WaitFence { fence, was_signaled: signaled });
        if signaled {
            Ok(FenceWait::Signaled)
        } else if timeout.is_some() {
            Ok(FenceWait::TimedOut)
        } else {
            // An unbounded wait would block the test forever; pretend the
            // GPU eventually retired the work
            Ok(FenceWait::Signaled)
        }
    }

    fn reset_fence(&self, fence: Handle) -> Result<()> {
        self.state.borrow_mut().set_fence(fence, false);
        Ok(())
    }

    fn graphics_buffer(&self, slot: SlotIndex) -> Handle {
        1000 + slot as Handle
    }

    fn compute_buffer(&self, slot: SlotIndex) -> Handle {
        2000 + slot as Handle
    }

    fn reset_commands(&self, _buffer: Handle) -> Result<()> {
        Ok(())
    }

    fn begin_commands(&self, _buffer: Handle) -> Result<()> {
        Ok(())
    }

    fn end_commands(&self, _buffer: Handle) -> Result<()> {
        Ok(())
    }

    fn acquire_image(&self, signal: Handle) -> Result<AcquireOutcome> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Acquire { signal });
        Ok(state
            .acquire_results
            .pop_front()
            .unwrap_or(AcquireOutcome::Acquired { index: 0, suboptimal: false }))
    }

    fn submit_graphics(
        &self,
        _buffer: Handle,
        waits: &[Handle],
        signal: Handle,
        fence: Handle,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::SubmitGraphics { waits: waits.to_vec(), signal, fence });
        // The fake GPU retires work instantly
        state.set_fence(fence, true);
        Ok(())
    }

    fn submit_compute(&self, _buffer: Handle, signal: Handle, fence: Handle) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::SubmitCompute { signal, fence });
        state.set_fence(fence, true);
        Ok(())
    }

    fn present(&self, image_index: u32, wait: Handle) -> Result<PresentOutcome> {
        let mut state = self.state.borrow_mut();
        state.ops.push(Op::Present { image: image_index, wait });
        Ok(state
            .present_results
            .pop_front()
            .unwrap_or(PresentOutcome::Presented { suboptimal: false }))
    }

    fn recreate_surface(&self, extent: Extent) -> Result<()> {
        self.state.borrow_mut().ops.push(Op::Recreate(extent));
        Ok(())
    }
}

fn controller(gpu: &FakeGpu) -> FrameSync<FakeGpu> {
    FrameSync::new(gpu.clone(), SyncOptions::default()).unwrap()
}

/// Run one full frame; returns false if acquisition skipped it.
fn run_frame(frames: &mut FrameSync<FakeGpu>, with_compute: bool) -> bool {
    frames.push_extent(800, 600);
    let image = match frames.acquire_next_image().unwrap() {
        AcquiredImage::Ready(index) => index,
        AcquiredImage::SkipFrame => return false,
    };

    frames.wait_graphics().unwrap();
    frames.reset_graphics().unwrap();

    let plan = if with_compute {
        frames.wait_compute().unwrap();
        frames.reset_compute().unwrap();
        frames.begin_compute().unwrap();
        frames.end_compute().unwrap();
        frames.submit_compute().unwrap()
    } else {
        SubmissionPlan::default()
    };

    frames.begin_graphics().unwrap();
    frames.end_graphics().unwrap();
    frames.submit(image, plan).unwrap();
    frames.present(image).unwrap();
    true
}

#[test]
fn slot_index_alternates_once_per_presented_frame() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    assert_eq!(frames.current_slot(), 0);
    for expected in [1, 0, 1, 0] {
        assert!(run_frame(&mut frames, false));
        assert_eq!(frames.current_slot(), expected);
    }
}

#[test]
fn skipped_frame_does_not_rotate_slots() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    assert!(run_frame(&mut frames, false));
    assert_eq!(frames.current_slot(), 1);

    gpu.push_acquire(AcquireOutcome::OutOfDate);
    assert!(!run_frame(&mut frames, false));
    assert_eq!(frames.current_slot(), 1, "invalidated acquisition must not rotate");
}

#[test]
fn wait_set_includes_compute_semaphore_only_when_compute_ran() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    // Frame with compute, then one without, on the same fake
    assert!(run_frame(&mut frames, true));
    assert!(run_frame(&mut frames, false));

    let submissions = gpu.graphics_submissions();
    assert_eq!(submissions.len(), 2);

    let compute_signal = gpu
        .ops()
        .iter()
        .find_map(|op| match op {
            Op::SubmitCompute { signal, .. } => Some(*signal),
            _ => None,
        })
        .expect("compute frame must have submitted");

    match &submissions[0] {
        Op::SubmitGraphics { waits, .. } => {
            assert_eq!(waits.len(), 2, "compute frame waits on acquire + compute");
            assert_eq!(waits[1], compute_signal);
        }
        _ => unreachable!(),
    }

    // The plan was moved into submit; nothing can leak into the next frame
    match &submissions[1] {
        Op::SubmitGraphics { waits, .. } => {
            assert_eq!(waits.len(), 1, "plain frame waits on acquire only");
            assert_ne!(waits[0], compute_signal);
        }
        _ => unreachable!(),
    }
}

#[test]
fn graphics_wait_observes_submission_ordering() {
    let gpu = FakeGpu::new();
    let mut frames =
        FrameSync::new(gpu.clone(), SyncOptions { wait_timeout: Some(Duration::from_millis(100)) })
            .unwrap();

    frames.push_extent(800, 600);
    let image = match frames.acquire_next_image().unwrap() {
        AcquiredImage::Ready(index) => index,
        AcquiredImage::SkipFrame => panic!("fake acquired"),
    };

    // Pre-signaled fence: the first wait returns immediately
    frames.wait_graphics().unwrap();
    frames.reset_graphics().unwrap();

    // After reset and before any submission the fence cannot signal
    let err = frames.wait_graphics().unwrap_err();
    assert!(matches!(err, FrameSyncError::DeviceUnresponsive { .. }));

    frames.begin_graphics().unwrap();
    frames.end_graphics().unwrap();
    frames.submit(image, SubmissionPlan::default()).unwrap();

    // Submission signals the fake fence; the wait now succeeds
    frames.wait_graphics().unwrap();
}

#[test]
fn submit_without_extent_is_a_contract_violation() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    frames.begin_graphics().unwrap();
    frames.end_graphics().unwrap();
    let err = frames.submit(0, SubmissionPlan::default()).unwrap_err();
    assert!(matches!(err, FrameSyncError::ContractViolation(_)));
    assert!(gpu.graphics_submissions().is_empty(), "nothing may reach the queue");
}

#[test]
fn out_of_date_acquire_recreates_and_skips() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    gpu.push_acquire(AcquireOutcome::OutOfDate);
    frames.push_extent(640, 480);
    assert_eq!(frames.acquire_next_image().unwrap(), AcquiredImage::SkipFrame);

    let ops = gpu.ops();
    assert!(ops.contains(&Op::Recreate(Extent { width: 640, height: 480 })));
    assert!(gpu.graphics_submissions().is_empty());
}

#[test]
fn out_of_date_acquire_without_extent_is_a_contract_violation() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    gpu.push_acquire(AcquireOutcome::OutOfDate);
    let err = frames.acquire_next_image().unwrap_err();
    assert!(matches!(err, FrameSyncError::ContractViolation(_)));
}

#[test]
fn out_of_date_present_recreates_and_still_rotates() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    gpu.push_present(PresentOutcome::OutOfDate);
    assert!(run_frame(&mut frames, false));

    assert!(gpu.ops().contains(&Op::Recreate(Extent { width: 800, height: 600 })));
    assert_eq!(frames.current_slot(), 1, "recreation does not skip rotation");
}

#[test]
fn suboptimal_present_also_recreates() {
    let gpu = FakeGpu::new();
    let mut frames = controller(&gpu);

    gpu.push_present(PresentOutcome::Presented { suboptimal: true });
    assert!(run_frame(&mut frames, false));
    assert!(gpu.ops().iter().any(|op| matches!(op, Op::Recreate(_))));
}

#[test]
fn teardown_waits_before_destroying_primitives() {
    let gpu = FakeGpu::new();
    let frames = controller(&gpu);
    drop(frames);

    let ops = gpu.ops();
    let first_destroy = ops
        .iter()
        .position(|op| matches!(op, Op::DestroySemaphore(_) | Op::DestroyFence(_)))
        .expect("teardown destroys primitives");

    // Both fences of both slots are drained before anything dies
    let waits_before = ops[..first_destroy]
        .iter()
        .filter(|op| matches!(op, Op::WaitFence { .. }))
        .count();
    assert_eq!(waits_before, 4);

    // Exactly the five primitives per slot the controller created
    let destroyed_semaphores =
        ops.iter().filter(|op| matches!(op, Op::DestroySemaphore(_))).count();
    let destroyed_fences = ops.iter().filter(|op| matches!(op, Op::DestroyFence(_))).count();
    assert_eq!(destroyed_semaphores, 6);
    assert_eq!(destroyed_fences, 4);
}
