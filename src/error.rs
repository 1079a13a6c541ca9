// Error taxonomy for the frame-synchronization controller
//
// Three categories, three very different fates:
// - contract violations: the caller broke the per-frame protocol
// - device unresponsive: a bounded fence wait elapsed (opt-in, see config)
// - device faults: the GPU or driver reported a non-success we cannot retry

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`FrameSync`](crate::FrameSync) and the GPU seam.
///
/// Recoverable surface conditions (out-of-date / suboptimal swapchain) are
/// *not* errors; they are absorbed by the stage that detects them and show
/// up as [`AcquiredImage::SkipFrame`](crate::gpu::AcquiredImage) or a
/// silent recreation at present time.
#[derive(Debug, Error)]
pub enum FrameSyncError {
    /// The caller broke the per-frame protocol. Never retried, never
    /// tolerated: this indicates a bug in the code driving the controller.
    #[error("frame protocol violation: {0}")]
    ContractViolation(&'static str),

    /// A bounded fence wait elapsed without the GPU retiring its work.
    /// Only reachable when `[sync] wait_timeout_ms` is configured; the
    /// default is to block without timeout.
    #[error("device unresponsive: fence not signaled within {waited:?}")]
    DeviceUnresponsive { waited: Duration },

    /// Any other non-success from primitive creation, command recording,
    /// queue submission, acquisition or presentation. Queue-level faults
    /// leave the device in an unknown state, so there is no retry path.
    #[error("device fault: {0}")]
    DeviceFault(String),
}

impl FrameSyncError {
    pub(crate) fn fault(context: &str, code: impl std::fmt::Display) -> Self {
        Self::DeviceFault(format!("{context}: {code}"))
    }
}

pub type Result<T, E = FrameSyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FrameSyncError::ContractViolation("extent not pushed");
        assert_eq!(
            err.to_string(),
            "frame protocol violation: extent not pushed"
        );

        let err = FrameSyncError::fault("vkQueueSubmit", "ERROR_DEVICE_LOST");
        assert_eq!(err.to_string(), "device fault: vkQueueSubmit: ERROR_DEVICE_LOST");
    }
}
