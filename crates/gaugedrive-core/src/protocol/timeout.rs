//! Response timeout policy
//!
//! The gauge acknowledges a command once the needle has finished moving, which
//! can be immediate when the position does not change. The host therefore
//! waits at most the transition time rounded up to whole seconds, plus one
//! second of slack.

use std::time::Duration;

/// Maximum time to wait for a reply to a command with the given duration
///
/// Returns 1 second for `duration_ms == 0`, otherwise
/// `ceil(duration_ms / 1000) + 1` seconds.
pub fn compute_window(duration_ms: u16) -> Duration {
    if duration_ms == 0 {
        return Duration::from_secs(1);
    }
    let secs = u64::from(duration_ms).div_ceil(1000) + 1;
    Duration::from_secs(secs)
}
