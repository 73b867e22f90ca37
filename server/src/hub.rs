use std::collections::HashMap;
use std::sync::Arc;

use sketchrelay_shared::{ServerMessage, Stroke};
use tokio::sync::RwLock;

use crate::canvas_id::{generate_canvas_code, validate_canvas_id, CANVAS_CODE_LEN};
use crate::client::{ClientHandle, ClientId, ClientSession, EnqueueOutcome, Frame};
use crate::error::HubError;

pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Live frames a client may have queued before new ones are dropped.
    pub outbox_capacity: usize,
    /// Whether a stroke is also delivered back to the client that drew it.
    pub echo_to_sender: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            echo_to_sender: false,
        }
    }
}

#[derive(Default)]
struct Canvas {
    clients: HashMap<ClientId, ClientHandle>,
    strokes: Vec<Stroke>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CanvasStats {
    pub clients: usize,
    pub strokes: usize,
}

/// Outcome of a single fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

/// Registry of live canvases. Every operation runs under one write or read
/// section of `canvases`, which is what orders strokes per canvas and keeps
/// a join's replay ahead of any later live stroke.
pub struct Hub {
    canvases: RwLock<HashMap<String, Canvas>>,
    config: HubConfig,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            canvases: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Registers an empty canvas. Creating a canvas that already exists is a
    /// no-op and leaves its clients and history untouched.
    pub async fn create_canvas(&self, canvas_id: &str) -> Result<(), HubError> {
        validate_canvas_id(canvas_id)?;
        let mut canvases = self.canvases.write().await;
        if !canvases.contains_key(canvas_id) {
            canvases.insert(canvas_id.to_string(), Canvas::default());
            tracing::info!(canvas = canvas_id, "canvas created");
        }
        Ok(())
    }

    /// Creates a canvas under a freshly generated code that is not in use.
    pub async fn create_generated_canvas(&self) -> Result<String, HubError> {
        let mut canvases = self.canvases.write().await;
        let canvas_id = loop {
            let candidate = generate_canvas_code(CANVAS_CODE_LEN);
            if !canvases.contains_key(&candidate) {
                break candidate;
            }
            tracing::debug!(canvas = %candidate, "generated canvas code collided, retrying");
        };
        validate_canvas_id(&canvas_id)?;
        canvases.insert(canvas_id.clone(), Canvas::default());
        tracing::info!(canvas = %canvas_id, "canvas created");
        Ok(canvas_id)
    }

    pub async fn canvas_exists(&self, canvas_id: &str) -> bool {
        self.canvases.read().await.contains_key(canvas_id)
    }

    pub async fn canvas_count(&self) -> usize {
        self.canvases.read().await.len()
    }

    pub async fn canvas_stats(&self, canvas_id: &str) -> Option<CanvasStats> {
        self.canvases
            .read()
            .await
            .get(canvas_id)
            .map(|canvas| CanvasStats {
                clients: canvas.clients.len(),
                strokes: canvas.strokes.len(),
            })
    }

    /// Attaches a new client to `canvas_id`, creating the canvas if needed,
    /// and queues the whole stroke history onto its outbox before returning.
    ///
    /// The outbox is sized to hold the full replay plus the configured live
    /// capacity, so history is never dropped on join.
    pub async fn add_client(
        &self,
        canvas_id: &str,
        client_id: ClientId,
    ) -> Result<ClientSession, HubError> {
        validate_canvas_id(canvas_id)?;
        let mut canvases = self.canvases.write().await;
        let canvas = canvases.entry(canvas_id.to_string()).or_insert_with(|| {
            tracing::info!(canvas = canvas_id, "canvas created on join");
            Canvas::default()
        });

        let (handle, outbox) = ClientHandle::new(
            client_id.clone(),
            canvas_id.to_string(),
            canvas.strokes.len() + self.config.outbox_capacity,
        );

        let mut replayed = 0;
        for stroke in &canvas.strokes {
            let Some(frame) = encode_stroke(stroke) else {
                continue;
            };
            if handle.enqueue(frame) == EnqueueOutcome::Queued {
                replayed += 1;
            }
        }

        if let Some(previous) = canvas.clients.insert(client_id.clone(), handle) {
            tracing::warn!(
                canvas = canvas_id,
                client = %previous.id,
                previous_canvas = %previous.canvas_id,
                "client id reused, previous handle replaced"
            );
        }
        tracing::debug!(
            canvas = canvas_id,
            client = %client_id,
            replayed,
            peers = canvas.clients.len(),
            "client added"
        );

        Ok(ClientSession {
            client_id,
            canvas_id: canvas_id.to_string(),
            replayed,
            outbox,
        })
    }

    /// Detaches a client. The canvas and its history go away with its last
    /// client. Unknown canvases or clients are ignored.
    pub async fn remove_client(&self, canvas_id: &str, client_id: &str) -> bool {
        let mut canvases = self.canvases.write().await;
        let Some(canvas) = canvases.get_mut(canvas_id) else {
            return false;
        };
        let removed = canvas.clients.remove(client_id).is_some();
        let remaining = canvas.clients.len();
        if removed {
            tracing::debug!(
                canvas = canvas_id,
                client = client_id,
                peers = remaining,
                "client removed"
            );
        }
        if removed && remaining == 0 {
            let strokes = canvas.strokes.len();
            canvases.remove(canvas_id);
            tracing::info!(canvas = canvas_id, strokes, "canvas removed");
        }
        removed
    }

    /// Appends `stroke` to the canvas history and fans it out. `sender` is
    /// skipped unless the hub echoes strokes back to their author.
    pub async fn broadcast_stroke(
        &self,
        canvas_id: &str,
        sender: Option<&str>,
        stroke: Stroke,
    ) -> Delivery {
        if let Err(error) = validate_canvas_id(canvas_id) {
            tracing::debug!(canvas = canvas_id, %error, "stroke for invalid canvas ignored");
            return Delivery::default();
        }
        let frame = encode_stroke(&stroke);

        let mut canvases = self.canvases.write().await;
        let canvas = canvases.entry(canvas_id.to_string()).or_insert_with(|| {
            tracing::info!(canvas = canvas_id, "canvas created by stroke");
            Canvas::default()
        });
        canvas.strokes.push(stroke);

        let Some(frame) = frame else {
            return Delivery::default();
        };
        let skip = if self.config.echo_to_sender {
            None
        } else {
            sender
        };
        fan_out(canvas_id, &canvas.clients, &frame, skip)
    }

    /// Relays an opaque frame to a canvas without recording it.
    pub async fn broadcast_raw(
        &self,
        canvas_id: &str,
        sender: Option<&str>,
        frame: Frame,
    ) -> Delivery {
        let canvases = self.canvases.read().await;
        let Some(canvas) = canvases.get(canvas_id) else {
            return Delivery::default();
        };
        let skip = if self.config.echo_to_sender {
            None
        } else {
            sender
        };
        fan_out(canvas_id, &canvas.clients, &frame, skip)
    }
}

fn encode_stroke(stroke: &Stroke) -> Option<Frame> {
    let message = ServerMessage::Stroke {
        stroke: stroke.clone(),
    };
    match message.to_json() {
        Ok(json) => Some(Frame::Text(Arc::from(json))),
        Err(error) => {
            tracing::warn!(%error, "failed to encode stroke");
            None
        }
    }
}

fn fan_out(
    canvas_id: &str,
    clients: &HashMap<ClientId, ClientHandle>,
    frame: &Frame,
    skip: Option<&str>,
) -> Delivery {
    let mut delivery = Delivery::default();
    for (id, client) in clients {
        if skip == Some(id.as_str()) {
            continue;
        }
        match client.enqueue(frame.clone()) {
            EnqueueOutcome::Queued => delivery.delivered += 1,
            outcome => {
                delivery.dropped += 1;
                tracing::trace!(canvas = canvas_id, client = %id, ?outcome, "frame dropped");
            }
        }
    }
    delivery
}
