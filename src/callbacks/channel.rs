//! Adapter for callbacks served by an async task.
//!
//! [`channel`] returns a [`Callback`] to register with the bridge and the
//! receiving end of a queue. Each call sends a [`CallbackRequest`] and blocks
//! the calling thread until the task answers through [`CallbackRequest::respond`].
//! The blocking side must not run on an async worker thread; evaluate from a
//! plain thread or inside `tokio::task::spawn_blocking`.

use std::sync::Arc;

use serde_json::Value as Json;
use tokio::sync::{mpsc, oneshot};

use super::Callback;

/// One pending call.
#[derive(Debug)]
pub struct CallbackRequest {
    pub args: Vec<Json>,
    reply: oneshot::Sender<Result<Json, String>>,
}

impl CallbackRequest {
    pub fn respond(self, result: Result<Json, String>) {
        // The caller only goes away if its thread died; nothing to report to.
        let _ = self.reply.send(result);
    }
}

/// Create a channel-backed callback with room for `buffer` queued calls.
pub fn channel(buffer: usize) -> (Callback, mpsc::Receiver<CallbackRequest>) {
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    let callback: Callback = Arc::new(move |args: &[Json]| -> Result<Json, String> {
        let (reply, response) = oneshot::channel();
        let request = CallbackRequest {
            args: args.to_vec(),
            reply,
        };
        sender
            .blocking_send(request)
            .map_err(|_| "callback receiver has been dropped".to_string())?;
        response
            .blocking_recv()
            .map_err(|_| "callback request dropped without a reply".to_string())?
    });
    (callback, receiver)
}
