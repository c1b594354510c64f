//! The attach hub: ownership precondition check plus the four-task wiring
//! that pumps frames between a WebSocket and a backend's duplex streams.

use crate::wire::{BoxError, WsSink, WsStream};
use axum::extract::ws::Message;
use futures::{SinkExt, StreamExt};
use sessionctl_protocol::{decode_frame, encode_frame, CodecError, Frame};
use sessionctl_types::{
    Backend, BackendAttach, RequestContext, Session, SessionCtlError, SessionCtlResult, SessionStatus, SessionStore,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

const OUTPUT_BUFFER_SIZE: usize = 4096;

/// Owns the two ports the attach hub needs: a read-only view of sessions
/// for the ownership check, and the backend to open the duplex streams
/// against.
pub struct AttachHub {
    store: Arc<dyn SessionStore>,
    backend: Arc<dyn Backend>,
}

impl AttachHub {
    pub fn new(store: Arc<dyn SessionStore>, backend: Arc<dyn Backend>) -> Self {
        Self { store, backend }
    }

    /// Preconditions in order: exists, owner matches, status attachable,
    /// backend id present. Ownership mismatch is `Forbidden` here (not
    /// `NotFound` as elsewhere) because the upgrade handshake can't defer
    /// to a generic not-found.
    pub async fn check_preconditions(&self, ctx: &RequestContext, session_id: &str) -> SessionCtlResult<Session> {
        let session = self.store.get(session_id).await?.ok_or_else(|| SessionCtlError::not_found(session_id.to_string()))?;

        if session.owner_account_id != ctx.account_id {
            return Err(SessionCtlError::forbidden("caller does not own this session"));
        }
        if !matches!(session.status, SessionStatus::Running | SessionStatus::Pending) {
            return Err(SessionCtlError::conflict("session is not in an attachable state"));
        }
        if session.backend_id.is_none() {
            return Err(SessionCtlError::internal("session has no backend id"));
        }

        Ok(session)
    }

    /// Open the backend's duplex streams and wire the four tasks. Called
    /// only after `check_preconditions` and the WebSocket upgrade have
    /// both succeeded; failures past this point are reported as an
    /// `error` frame over the now-open channel rather than an HTTP status,
    /// since the handshake has already completed.
    pub async fn run(&self, ctx: RequestContext, session: Session, sink: WsSink, stream: WsStream) {
        let backend_id = session.backend_id.clone().expect("checked by check_preconditions");
        let writer = Arc::new(Mutex::new(sink));

        let attach = match self.backend.attach(&ctx, &backend_id).await {
            Ok(attach) => attach,
            Err(err) => {
                tracing::error!(session = %session.id, error = %err, "backend attach failed");
                let _ = send_frame(&writer, Frame::Error(format!("attach failed: {err}"))).await;
                let mut sink = writer.lock().await;
                let _ = sink.close().await;
                return;
            }
        };

        drive(session.id, attach, stream, writer).await;
    }
}

async fn send_frame(writer: &Mutex<WsSink>, frame: Frame) -> Result<(), ()> {
    let bytes = match encode_frame(&frame) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode outgoing frame");
            return Err(());
        }
    };
    let mut sink = writer.lock().await;
    sink.send(Message::Binary(bytes.to_vec())).await.map_err(|_| ())
}

/// T1: channel → stdin. Exits when the peer sends `stdin-close`, or the
/// channel errs/closes. Closes stdin exactly once, on exit, regardless of
/// which path triggered it.
async fn pump_input(
    mut stream: WsStream,
    mut stdin: std::pin::Pin<Box<dyn tokio::io::AsyncWrite + Send>>,
    writer: Arc<Mutex<WsSink>>,
) {
    loop {
        let message = match stream.next().await {
            Some(Ok(message)) => message,
            _ => break,
        };

        match message {
            Message::Binary(bytes) => match decode_frame(&bytes) {
                Ok(Frame::Stdin(data)) => {
                    if stdin.write_all(&data).await.is_err() {
                        break;
                    }
                }
                Ok(Frame::StdinClose) => break,
                Ok(_) => {} // only stdin/stdin-close have input-path effects
                Err(CodecError::UnknownTag(_)) => {} // unknown tags are discarded
                Err(err) => {
                    let _ = send_frame(&writer, Frame::Error(err.to_string())).await;
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    let _ = stdin.shutdown().await;
}

/// T2/T3: backend stream → channel, read to EOF unconditionally (the
/// output scope is never cancelled, so `wait()` always observes a fully
/// drained process).
async fn pump_output(
    mut reader: std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>>,
    writer: Arc<Mutex<WsSink>>,
    frame_of: fn(Vec<u8>) -> Frame,
) {
    let mut buf = [0u8; OUTPUT_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let _ = send_frame(&writer, frame_of(buf[..n].to_vec())).await;
            }
            Err(_) => break,
        }
    }
}

async fn drive(session_id: String, attach: BackendAttach, stream: WsStream, writer: Arc<Mutex<WsSink>>) {
    let BackendAttach { stdin, stdout, stderr, wait } = attach;

    let input_task = tokio::spawn(pump_input(stream, stdin, writer.clone()));
    let stdout_task = tokio::spawn(pump_output(stdout, writer.clone(), Frame::Stdout));
    let stderr_task = tokio::spawn(pump_output(stderr, writer.clone(), Frame::Stderr));

    // T4: wait for T2+T3 to fully drain before trusting wait()'s exit code.
    let _ = stdout_task.await;
    let _ = stderr_task.await;

    let exit_code = match wait.await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(session = %session_id, error = %err, "backend wait() failed");
            -1
        }
    };

    // A stuck reader on the input path must not hold up teardown once
    // output is drained and the process has exited.
    input_task.abort();

    let _ = send_frame(&writer, Frame::Exit(exit_code)).await;

    let mut sink = writer.lock().await;
    let _ = sink.close().await;
}
