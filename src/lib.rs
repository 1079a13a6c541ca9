// vk-frames - double-buffered Vulkan frame-synchronization controller
//
// Coordinates CPU/GPU handoff across two in-flight frames: image
// acquisition, compute and graphics submission ordering, presentation, and
// surface-invalidation recovery. What gets drawn or computed is entirely up
// to the caller; this crate decides only when and in what order GPU work
// may run relative to presentation.

pub mod backend;
pub mod config;
pub mod error;
pub mod gpu;
pub mod sync;

pub use config::Config;
pub use error::FrameSyncError;
pub use gpu::{AcquiredImage, Extent, GpuContext, SlotIndex, FRAMES_IN_FLIGHT};
pub use sync::{FrameSync, SubmissionPlan, SyncOptions};
