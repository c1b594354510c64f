//! Transport-agnostic sink/stream aliases for the attach channel.
//!
//! Kept independent of `axum::Error` so the four-task wiring can be driven
//! by a real WebSocket split in production and by an in-memory channel in
//! tests, without the test double having to fabricate an `axum::Error`.

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use std::pin::Pin;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type WsSink = Pin<Box<dyn Sink<Message, Error = BoxError> + Send>>;
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, BoxError>> + Send>>;
