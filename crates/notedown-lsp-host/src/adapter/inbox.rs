//! Routing of inbound frames from the reader thread.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use super::ADAPTER_TARGET;
use super::error::TransportError;
use super::jsonrpc::{JsonRpcMessage, JsonRpcResult, ServerRequest};
use super::transport::{FramedReader, FramedWriter};
use crate::reply::ReplySender;
use crate::server::ServerNotification;

/// State shared between a process adapter and its reader thread.
#[derive(Debug)]
pub(super) struct Inbox {
    pending: Mutex<HashMap<i64, ReplySender>>,
    notifications: Mutex<Vec<ServerNotification>>,
    alive: AtomicBool,
}

impl Inbox {
    pub(super) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            notifications: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        }
    }

    /// Tracks `sender` under `id`, first dropping senders whose caller has
    /// already given up.
    pub(super) fn register(&self, id: i64, sender: ReplySender) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let before = pending.len();
        pending.retain(|_, waiting| !waiting.is_abandoned());
        let swept = before - pending.len();
        if swept > 0 {
            trace!(target: ADAPTER_TARGET, swept, "dropped abandoned replies");
        }
        pending.insert(id, sender);
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    pub(super) fn cancel(&self, id: i64) {
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(&id);
    }

    fn take(&self, id: i64) -> Option<ReplySender> {
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .remove(&id)
    }

    fn push_notification(&self, notification: ServerNotification) {
        self.notifications
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(notification);
    }

    pub(super) fn drain_notifications(&self) -> Vec<ServerNotification> {
        let mut queue = self
            .notifications
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        std::mem::take(&mut *queue)
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Marks the stream dead and disconnects every waiting caller.
    pub(super) fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clear();
    }
}

/// Reads frames until the stream ends, then closes the inbox.
pub(super) fn read_loop<R, W>(
    mut reader: FramedReader<R>,
    inbox: &Inbox,
    writer: &Mutex<FramedWriter<W>>,
) where
    R: BufRead,
    W: Write,
{
    loop {
        let bytes = match reader.receive() {
            Ok(bytes) => bytes,
            Err(TransportError::Closed) => {
                debug!(target: ADAPTER_TARGET, "language server closed its output");
                break;
            }
            Err(error) => {
                warn!(target: ADAPTER_TARGET, error = %error, "language server stream failed");
                break;
            }
        };

        match JsonRpcMessage::from_bytes(&bytes) {
            Ok(message) => route(message, inbox, writer),
            Err(error) => warn!(target: ADAPTER_TARGET, error = %error, "discarding undecodable frame"),
        }
    }
    inbox.close();
}

fn route<W: Write>(message: JsonRpcMessage, inbox: &Inbox, writer: &Mutex<FramedWriter<W>>) {
    match message {
        JsonRpcMessage::Response(response) => {
            let Some(id) = response.id else {
                warn!(target: ADAPTER_TARGET, "discarding response without id");
                return;
            };
            match inbox.take(id) {
                Some(sender) => {
                    if !sender.complete(response.into_outcome()) {
                        debug!(target: ADAPTER_TARGET, id, "caller stopped waiting for reply");
                    }
                }
                None => debug!(target: ADAPTER_TARGET, id, "no caller waiting for reply"),
            }
        }
        JsonRpcMessage::ServerRequest(request) => answer_with_null(&request, writer),
        JsonRpcMessage::Notification(notification) => {
            trace!(target: ADAPTER_TARGET, method = %notification.method, "queued notification");
            inbox.push_notification(notification);
        }
    }
}

fn answer_with_null<W: Write>(request: &ServerRequest, writer: &Mutex<FramedWriter<W>>) {
    debug!(
        target: ADAPTER_TARGET,
        method = %request.method,
        "answering server request with null"
    );
    let payload = match serde_json::to_vec(&JsonRpcResult::null(request.id.clone())) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(target: ADAPTER_TARGET, error = %error, "failed to encode reply");
            return;
        }
    };
    let mut writer = writer.lock().unwrap_or_else(|poison| poison.into_inner());
    if let Err(error) = writer.send(&payload) {
        warn!(target: ADAPTER_TARGET, error = %error, "failed to answer server request");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::reply::{PendingReply, ReplyError};

    fn frame(json: &str) -> Vec<u8> {
        let mut bytes = format!("Content-Length: {}\r\n\r\n", json.len()).into_bytes();
        bytes.extend_from_slice(json.as_bytes());
        bytes
    }

    fn run(frames: &[&str], inbox: &Inbox) -> Vec<u8> {
        let input: Vec<u8> = frames.iter().flat_map(|json| frame(json)).collect();
        let writer = Mutex::new(FramedWriter::new(Vec::new()));
        read_loop(FramedReader::new(Cursor::new(input)), inbox, &writer);
        writer
            .into_inner()
            .unwrap_or_else(|poison| poison.into_inner())
            .get_ref()
            .clone()
    }

    #[rstest]
    fn routes_replies_by_id() {
        let inbox = Inbox::new();
        let (sender, reply) = PendingReply::channel("workspace/executeCommand");
        inbox.register(5, sender);
        let (other_sender, other) = PendingReply::channel("textDocument/foldingRange");
        inbox.register(6, other_sender);

        run(&[r#"{"jsonrpc":"2.0","id":5,"result":[1]}"#], &inbox);

        assert_eq!(reply.wait(Duration::ZERO), Ok(json!([1])));
        assert!(matches!(
            other.wait(Duration::ZERO),
            Err(ReplyError::Disconnected { .. })
        ));
    }

    #[rstest]
    fn abandoned_replies_are_swept_on_register() {
        let inbox = Inbox::new();
        let (timed_out, reply) = PendingReply::channel("textDocument/completion");
        inbox.register(1, timed_out);
        assert!(reply.wait(Duration::from_millis(1)).is_err());
        let (superseded, dropped) = PendingReply::channel("workspace/executeCommand");
        inbox.register(2, superseded);
        drop(dropped);
        let (live, mut waiting) = PendingReply::channel("textDocument/codeAction");

        inbox.register(3, live);

        assert_eq!(inbox.pending_count(), 1);
        run(&[r#"{"jsonrpc":"2.0","id":3,"result":[]}"#], &inbox);
        assert_eq!(waiting.poll(), Some(Ok(json!([]))));
    }

    #[rstest]
    fn queues_notifications() {
        let inbox = Inbox::new();

        run(
            &[r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"hi"}}"#],
            &inbox,
        );

        let notifications = inbox.drain_notifications();
        assert_eq!(notifications.len(), 1);
        assert!(inbox.drain_notifications().is_empty());
    }

    #[rstest]
    fn answers_server_requests() {
        let inbox = Inbox::new();

        let written = run(
            &[r#"{"jsonrpc":"2.0","id":9,"method":"workspace/configuration","params":{}}"#],
            &inbox,
        );

        let expected = frame(r#"{"jsonrpc":"2.0","id":9,"result":null}"#);
        assert_eq!(written, expected);
    }

    #[rstest]
    fn end_of_stream_closes_inbox() {
        let inbox = Inbox::new();
        assert!(inbox.is_alive());

        run(&[r#"not json"#], &inbox);

        assert!(!inbox.is_alive());
    }
}
