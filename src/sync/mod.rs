// Frame synchronization - CPU/GPU handoff across two in-flight frames

pub mod controller;
pub mod slots;

pub use controller::{FrameSync, SubmissionPlan, SyncOptions};
pub use slots::{FrameSlot, FrameSlots};
