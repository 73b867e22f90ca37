use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type ClientId = String;

/// An encoded outbound message, shared by every recipient of a broadcast.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Text(Arc<str>),
    Binary(Arc<[u8]>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    Full,
    Closed,
}

/// Registry-side half of a connection: identity plus the sending end of
/// the bounded outbox. Dropping it closes the outbox.
pub struct ClientHandle {
    pub id: ClientId,
    pub canvas_id: String,
    outbox: mpsc::Sender<Frame>,
}

impl ClientHandle {
    pub fn new(id: ClientId, canvas_id: String, capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id,
                canvas_id,
                outbox: tx,
            },
            rx,
        )
    }

    /// Never waits: a full outbox drops the frame for this client only.
    pub fn enqueue(&self, frame: Frame) -> EnqueueOutcome {
        match self.outbox.try_send(frame) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(_)) => EnqueueOutcome::Full,
            Err(TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }
}

/// Adapter-side half of a connection, returned by `Hub::add_client`.
#[derive(Debug)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub canvas_id: String,
    /// Number of history strokes queued ahead of live traffic.
    pub replayed: usize,
    pub outbox: mpsc::Receiver<Frame>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientPhase {
    Connecting,
    Registered,
    Active,
    Detached,
}

impl ClientPhase {
    /// Moves forward only. Returns false (and stays put) on any attempt to
    /// go back or repeat the current phase.
    pub fn advance_to(&mut self, next: ClientPhase) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}
