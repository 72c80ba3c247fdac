// crates/mldb-client/src/readiness.rs
// ============================================================================
// Module: Readiness Polling
// Description: Polls the service until it answers.
// Purpose: Wait for a freshly started service without arbitrary sleeps.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`wait_for_ready`] pings the service at a fixed interval until it answers
//! or the caller's deadline passes. The CLI and the system-test harness call
//! it before running any scenario.

use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use crate::client::MldbClient;
use crate::client::MldbError;

/// Delay between readiness pings.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Polls `GET /v1/ping` until it succeeds or `timeout` expires.
///
/// # Errors
///
/// Returns the last ping error wrapped in [`MldbError::Transport`] once the
/// timeout expires.
pub fn wait_for_ready(client: &MldbClient, timeout: Duration) -> Result<(), MldbError> {
    let start = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match client.ping() {
            Ok(()) => return Ok(()),
            Err(err) => {
                if start.elapsed() > timeout {
                    return Err(MldbError::Transport(format!(
                        "service readiness timeout after {attempts} attempts: {err}"
                    )));
                }
                sleep(POLL_INTERVAL);
            }
        }
    }
}
