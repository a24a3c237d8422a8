//! Room actor: an isolated Tokio task that owns one interpreted game.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The actor owns the definition, class table,
//! root state, interpreter, and scheduler; commands and due timers are
//! serialised by a single `select!` loop, so no two dispatches ever touch
//! the same room state concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use playcast_definition::{load_definition, GameDefinition};
use playcast_machine::{
    ActionCtx, Interpreter, Machine, Outbox, Scheduler,
};
use playcast_schema::{get_path, remove_path, set_path, ClassTable, Value};
use serde_json::{json, Value as Json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Duration, Instant};

use crate::{RoomError, RoomOptions};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

impl RoomId {
    /// Allocates the next process-unique room id.
    pub fn next() -> Self {
        Self(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A stable opaque identifier the transport assigns per connection. It is
/// the key of the `players` map and travels on every forwarded event as
/// `event.sessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A message from the room to one client's connection handler.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomOutbound {
    /// Full replicated-state snapshot. Sent on join and after every
    /// state-mutating dispatch; a delta-replicating transport would diff
    /// consecutive snapshots.
    State(Json),

    /// A definition-driven broadcast.
    Broadcast { event: String, data: Json },
}

/// Channel sender for delivering outbound messages to a client.
pub type ClientSender = mpsc::UnboundedSender<RoomOutbound>;

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Add a session to the room. Idempotent for a session already present.
    Join {
        session_id: SessionId,
        name: Option<String>,
        sender: ClientSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Remove a session from the room.
    Leave {
        session_id: SessionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Deliver a client event (fire-and-forget).
    Message {
        session_id: SessionId,
        event: String,
        payload: Json,
    },

    /// Request room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Request the current replicated-state snapshot.
    GetSnapshot { reply: oneshot::Sender<Json> },

    /// Shut down the room, cancelling all pending scheduled work.
    Shutdown,
}

/// A snapshot of room metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub definition_id: String,
    pub player_count: usize,
    /// Name of the statechart's current state.
    pub current_state: String,
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's unique ID.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Adds a session to the room.
    pub async fn join(
        &self,
        session_id: SessionId,
        name: Option<String>,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                session_id,
                name,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Removes a session from the room.
    pub async fn leave(&self, session_id: SessionId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                session_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    /// Forwards a client event to the room (fire-and-forget).
    pub async fn send_event(
        &self,
        session_id: SessionId,
        event: impl Into<String>,
        payload: Json,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Message {
                session_id,
                event: event.into(),
                payload,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests room metadata.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Requests the current replicated-state snapshot.
    pub async fn snapshot(&self) -> Result<Json, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetSnapshot { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: RoomId,
    definition: GameDefinition,
    classes: ClassTable,
    interpreter: Interpreter,
    scheduler: Scheduler,
    outbox: Outbox,
    /// The replicated state tree. Created once; only its fields mutate.
    state: Value,
    /// Server-only context: `machine.context`, plus `config` from the
    /// room options when supplied.
    context: Json,
    /// Connected sessions and their outbound channels.
    players: HashMap<SessionId, ClientSender>,
    /// Origin of the room's logical clock.
    started_at: Instant,
    receiver: mpsc::Receiver<RoomCommand>,
}

fn action_ctx<'a>(
    state: &'a mut Value,
    classes: &'a ClassTable,
    data: &'a Json,
    context: &'a Json,
    scheduler: &'a mut Scheduler,
    outbox: &'a mut Outbox,
    now_ms: u64,
) -> ActionCtx<'a> {
    ActionCtx {
        state,
        classes,
        data,
        context,
        scheduler,
        outbox,
        now_ms,
        event: Json::Null,
    }
}

impl RoomActor {
    fn now_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    async fn run(mut self) {
        tracing::info!(
            room_id = %self.room_id,
            definition_id = %self.definition.id,
            "room started"
        );

        // Enter the machine's initial state: entry actions, after timers.
        let now = self.now_ms();
        let mut ctx = action_ctx(
            &mut self.state,
            &self.classes,
            &self.definition.data,
            &self.context,
            &mut self.scheduler,
            &mut self.outbox,
            now,
        );
        self.interpreter.start(&mut ctx);
        self.flush_outbox();

        loop {
            let next = self.scheduler.next_deadline();
            let deadline = next
                .map(|ms| self.started_at + Duration::from_millis(ms))
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

            // A due timer wins over a queued command: the loop consumes
            // whichever comes earlier on the room's clock.
            tokio::select! {
                biased;
                _ = sleep_until(deadline), if next.is_some() => {
                    self.fire_due_timers();
                }
                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(RoomCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }
            }
        }

        // Disposal: pending scheduled work dies with the room.
        self.scheduler.clear();
        tracing::info!(room_id = %self.room_id, "room stopped");
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                session_id,
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(session_id, name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Leave { session_id, reply } => {
                let result = self.handle_leave(session_id);
                let _ = reply.send(result);
            }
            RoomCommand::Message {
                session_id,
                event,
                payload,
            } => self.handle_message(session_id, event, payload),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(RoomInfo {
                    room_id: self.room_id,
                    definition_id: self.definition.id.clone(),
                    player_count: self.players.len(),
                    current_state: self.interpreter.current_state().to_string(),
                });
            }
            RoomCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.state.to_json());
            }
            RoomCommand::Shutdown => unreachable!("Shutdown is intercepted in run() before dispatch"),
        }
    }

    // -----------------------------------------------------------------
    // Joins and leaves
    // -----------------------------------------------------------------

    fn handle_join(
        &mut self,
        session_id: SessionId,
        name: Option<String>,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        let rejoin = self.players.contains_key(&session_id);
        // Rejoin is idempotent: the roster sender is refreshed, the
        // existing player entry in state is preserved.
        self.players.insert(session_id.clone(), sender);

        if !rejoin {
            self.insert_player_state(&session_id, name.as_deref());
            tracing::info!(
                room_id = %self.room_id,
                %session_id,
                players = self.players.len(),
                "session joined"
            );
        }

        if self.interpreter.machine().handles_event("join") {
            let payload = json!({"name": name});
            self.dispatch_event(&session_id, "join", payload);
        }

        self.replicate();
        Ok(())
    }

    /// Creates the `players.<sid>` entry: the definition's `Player` class
    /// when declared, a minimal `{name, score}` record otherwise.
    fn insert_player_state(&mut self, session_id: &SessionId, name: Option<&str>) {
        let path = format!("players.{session_id}");
        if get_path(&self.state, &path).map(Value::is_record).unwrap_or(false) {
            return;
        }

        let supplied = json!({"name": name.unwrap_or_default()});
        let player = if self.classes.contains("Player") {
            match self.classes.instantiate_with_data("Player", &supplied) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to instantiate Player class");
                    return;
                }
            }
        } else {
            Value::from_json(&json!({
                "name": name.unwrap_or_default(),
                "score": 0,
            }))
        };

        if let Err(e) = set_path(&mut self.state, &path, player) {
            // Schemas without a `players` collection keep roster-only
            // membership.
            tracing::warn!(
                room_id = %self.room_id,
                %session_id,
                error = %e,
                "state has no players collection, roster-only join"
            );
        }
    }

    fn handle_leave(&mut self, session_id: SessionId) -> Result<(), RoomError> {
        if !self.players.contains_key(&session_id) {
            return Err(RoomError::NotInRoom(session_id));
        }

        // Let the definition react while the player entry still exists.
        if self.interpreter.machine().handles_event("leave") {
            self.dispatch_event(&session_id, "leave", json!({}));
        }

        self.players.remove(&session_id);
        remove_path(&mut self.state, &format!("players.{session_id}"));

        tracing::info!(
            room_id = %self.room_id,
            %session_id,
            players = self.players.len(),
            "session left"
        );

        self.replicate();
        Ok(())
    }

    // -----------------------------------------------------------------
    // Event dispatch
    // -----------------------------------------------------------------

    fn handle_message(&mut self, session_id: SessionId, event: String, payload: Json) {
        if !self.players.contains_key(&session_id) {
            tracing::warn!(
                room_id = %self.room_id,
                %session_id,
                "message from non-member, ignoring"
            );
            return;
        }

        // The legal event set is exactly the union of `on` keys in the
        // definition's states.
        if !self.interpreter.machine().handles_event(&event) {
            tracing::debug!(
                room_id = %self.room_id,
                %event,
                "event type not in definition, dropping"
            );
            return;
        }

        if !payload.is_object() && !payload.is_null() {
            tracing::debug!(
                room_id = %self.room_id,
                %event,
                "event payload is not a record, dropping"
            );
            return;
        }

        self.dispatch_event(&session_id, &event, payload);
        self.replicate();
    }

    /// Builds `{type, sessionId, ...payload}` and runs it through the
    /// interpreter. The host owns sender identity: a `sessionId` inside
    /// the payload is overwritten.
    fn dispatch_event(&mut self, session_id: &SessionId, event_type: &str, payload: Json) {
        let mut event = match payload {
            Json::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        event.insert("type".to_string(), json!(event_type));
        event.insert("sessionId".to_string(), json!(session_id.as_str()));

        let now = self.now_ms();
        let mut ctx = action_ctx(
            &mut self.state,
            &self.classes,
            &self.definition.data,
            &self.context,
            &mut self.scheduler,
            &mut self.outbox,
            now,
        );
        self.interpreter.send(Json::Object(event), &mut ctx);
        self.flush_outbox();
    }

    fn fire_due_timers(&mut self) {
        let now = self.now_ms();
        let mut ran = false;
        while let Some(task) = self.scheduler.pop_due(now) {
            let mut ctx = action_ctx(
                &mut self.state,
                &self.classes,
                &self.definition.data,
                &self.context,
                &mut self.scheduler,
                &mut self.outbox,
                now,
            );
            ran |= self.interpreter.on_timer(task, &mut ctx);
        }
        self.flush_outbox();
        if ran {
            self.replicate();
        }
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    /// Sends queued definition broadcasts to every connected client.
    fn flush_outbox(&mut self) {
        for broadcast in std::mem::take(&mut self.outbox.broadcasts) {
            let msg = RoomOutbound::Broadcast {
                event: broadcast.event,
                data: broadcast.data,
            };
            for sender in self.players.values() {
                let _ = sender.send(msg.clone());
            }
        }
    }

    /// Replicates the full state snapshot to every connected client.
    fn replicate(&self) {
        let snapshot = RoomOutbound::State(self.state.to_json());
        for sender in self.players.values() {
            let _ = sender.send(snapshot.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

/// Loads the definition, builds the room's machinery, and spawns its actor
/// task. Any definition, schema, or machine problem fails creation here —
/// a room never starts half-built.
pub fn spawn_room(
    room_id: RoomId,
    options: RoomOptions,
    channel_size: usize,
) -> Result<RoomHandle, RoomError> {
    let definition = load_definition(options.load_options())?;
    let classes = ClassTable::build(&definition.schema)?;
    let machine = Arc::new(Machine::compile(&definition.machine)?);
    let state = classes.instantiate_root()?;

    let mut context = definition.machine.context.clone();
    if let (Json::Object(ctx), Some(config)) = (&mut context, &options.config) {
        ctx.insert("config".to_string(), config.clone());
    }

    let (tx, rx) = mpsc::channel(channel_size);
    let actor = RoomActor {
        room_id,
        classes,
        interpreter: Interpreter::new(machine),
        scheduler: Scheduler::new(),
        outbox: Outbox::default(),
        state,
        context,
        definition,
        players: HashMap::new(),
        started_at: Instant::now(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    Ok(RoomHandle {
        room_id,
        sender: tx,
    })
}
