//! Internal state of a language server process.

use std::io::BufWriter;
use std::process::{Child, ChildStdin};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::transport::FramedWriter;

/// Writer shared between the caller and the reader thread, which answers
/// server-initiated requests.
pub(super) type SharedWriter = Arc<Mutex<FramedWriter<BufWriter<ChildStdin>>>>;

/// Lifecycle of the language server process.
pub enum ProcessState {
    /// Process is running and ready for communication.
    Running {
        /// The child process handle.
        child: Child,
        /// Framed stdin of the child.
        writer: SharedWriter,
        /// Thread reading the child's stdout.
        reader: JoinHandle<()>,
    },
    /// Process has been stopped.
    Stopped,
}

impl std::fmt::Debug for ProcessState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running { child, .. } => write!(formatter, "running (pid: {})", child.id()),
            Self::Stopped => formatter.write_str("stopped"),
        }
    }
}
