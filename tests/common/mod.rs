//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// How long to wait for a message that is expected to arrive
pub fn test_timeout() -> Duration {
    Duration::from_secs(3)
}

/// How long to wait before concluding that nothing will arrive
pub fn quiet_period() -> Duration {
    Duration::from_millis(200)
}
