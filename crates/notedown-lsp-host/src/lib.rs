//! Language Server Protocol coordination for Notedown workspaces.
//!
//! The crate locates workspace roots by their marker directory, decides which
//! content flavor a document is parsed with, and owns one language server
//! session per root. Servers sit behind the [`LanguageServer`] trait so tests
//! and embedding editors can inject lightweight implementations without
//! spawning the real `notedown serve` process; [`adapter`] provides the
//! process-backed implementation.
//!
//! The [`CommandBridge`] translates the server's custom
//! `workspace/executeCommand` extensions into typed values for editor
//! handlers.

pub mod adapter;
mod bridge;
mod capability;
mod command;
mod errors;
mod flavor;
mod host;
mod notice;
mod reply;
mod server;
mod uri;
mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use bridge::{BridgeReply, CommandBridge};
pub use capability::{CapabilityKind, CapabilitySource, CapabilityState, CapabilitySummary};
pub use command::{
    ConcealKind, ConcealRange, ListItemBoundaries, NotedownCommand, UnknownCommand,
    code_execution_arguments, conceal_arguments, list_item_arguments, parse_conceal_ranges,
    parse_workspace_edit,
};
pub use errors::{HostOperation, LspHostError};
pub use flavor::ContentFlavor;
pub use host::{HostSettings, LspHost, SessionHandle, SessionId, SessionStatus};
pub use notice::{CollectingNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use reply::{PendingReply, ReplyError, ReplyOutcome, ReplySender, ServerFault};
pub use server::{
    LanguageServer, LanguageServerError, ServerCapabilitySet, ServerFactory, ServerNotification,
};
pub use uri::{UriConversionError, path_to_uri, uri_to_path};
pub use workspace::{DEFAULT_MARKER, WorkspaceLocator, WorkspaceRoot};
