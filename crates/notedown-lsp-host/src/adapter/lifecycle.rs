//! Process termination for language server adapters.

use std::process::Child;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::ADAPTER_TARGET;
use crate::workspace::WorkspaceRoot;

/// Time a server gets to exit on its own after `exit`.
const GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Waits for `child` to exit, killing it once the grace period lapses.
pub(super) fn terminate_child(child: &mut Child, root: &WorkspaceRoot) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: ADAPTER_TARGET, root = %root, ?status, "language server exited");
            return;
        }
        Ok(None) => warn!(
            target: ADAPTER_TARGET,
            root = %root,
            "language server did not exit gracefully, waiting before killing"
        ),
        Err(error) => warn!(
            target: ADAPTER_TARGET,
            root = %root,
            error = %error,
            "failed to check process status, waiting before killing"
        ),
    }

    thread::sleep(GRACE_PERIOD);
    if let Ok(Some(status)) = child.try_wait() {
        debug!(
            target: ADAPTER_TARGET,
            root = %root,
            ?status,
            "language server exited during grace period"
        );
        return;
    }
    kill(child, root);
}

/// Kills `child` and reaps it.
pub(super) fn kill(child: &mut Child, root: &WorkspaceRoot) {
    if let Err(error) = child.kill() {
        warn!(
            target: ADAPTER_TARGET,
            root = %root,
            error = %error,
            "failed to kill language server process"
        );
        return;
    }
    if let Err(error) = child.wait() {
        debug!(target: ADAPTER_TARGET, root = %root, error = %error, "failed to reap language server");
    }
}
