//! Ctrl-C handling for plan and apply runs
//!
//! The first interrupt cancels the run: tasks already running finish, the
//! rest are skipped and the partial report is still shown and recorded.
//! A second interrupt exits immediately.

use anyhow::{Context, Result};
use declarative::Cancellation;

/// Exit code after a second interrupt (128 + SIGINT)
const FORCED_EXIT: i32 = 130;

/// Route Ctrl-C to `cancel` for the rest of the process
pub fn install(cancel: &Cancellation) -> Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if !request_stop(&cancel) {
            std::process::exit(FORCED_EXIT);
        }
    })
    .context("Failed to install Ctrl-C handler")
}

/// Cancel on the first call; `false` once the run was already cancelled
fn request_stop(cancel: &Cancellation) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    eprintln!("Interrupted, waiting for running tasks (press Ctrl-C again to quit)");
    cancel.cancel();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_interrupt_cancels_second_forces_exit() {
        let cancel = Cancellation::new();
        let seen_by_run = cancel.clone();

        assert!(request_stop(&cancel));
        assert!(seen_by_run.is_cancelled());
        assert!(!request_stop(&cancel));
    }
}
