//! Duplex attach channel: WebSocket upgrade to a session's stdin/stdout/stderr.
//!
//! The attach hub bypasses the orchestrator entirely: the upgrade
//! handshake checks ownership directly against the session store, then
//! opens the backend's duplex streams and pumps frames until the workload
//! exits.

mod hub;
#[cfg(test)]
mod mocks;
mod wire;

pub use hub::AttachHub;
pub use wire::{BoxError, WsSink, WsStream};

use axum::extract::ws::WebSocket;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Split a live WebSocket into the transport-agnostic sink/stream pair the
/// hub drives, boxing `axum::Error` into [`BoxError`] at the seam so the
/// rest of the hub never names it.
pub fn split_websocket(socket: WebSocket) -> (WsSink, WsStream) {
    let (sink, stream) = socket.split();
    let sink = sink.sink_map_err(|err| Box::new(err) as BoxError);
    let stream = stream.map(|item| item.map_err(|err| Box::new(err) as BoxError));
    (Box::pin(sink), Box::pin(stream))
}

/// Entry point for the axum route: check preconditions against the store,
/// then (only on success) upgrade and hand off to the hub. `on_upgrade`'s
/// closure can't return a `Result`, so a failed attach past this point is
/// reported as an `error` frame over the channel rather than an HTTP
/// status, since the handshake has already completed by then.
pub async fn handle_attach(
    hub: Arc<AttachHub>,
    ctx: sessionctl_types::RequestContext,
    session_id: String,
    ws: axum::extract::WebSocketUpgrade,
) -> Result<axum::response::Response, sessionctl_types::SessionCtlError> {
    use axum::response::IntoResponse;

    let session = hub.check_preconditions(&ctx, &session_id).await?;

    Ok(ws
        .on_upgrade(move |socket| async move {
            let (sink, stream) = split_websocket(socket);
            hub.run(ctx, session, sink, stream).await;
        })
        .into_response())
}
