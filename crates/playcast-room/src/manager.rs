//! Room manager: creates, tracks, and routes sessions to rooms.
//!
//! This is the surface a transport layer calls: it owns the handles of all
//! active rooms and the index of which room each session is in. A session
//! can be in at most one room at a time.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::room::spawn_room;
use crate::{
    ClientSender, RoomError, RoomHandle, RoomId, RoomInfo, RoomOptions,
    SessionId,
};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Manages all active rooms in this process.
pub struct RoomManager {
    /// Active rooms, keyed by room id.
    rooms: HashMap<RoomId, RoomHandle>,

    /// Maps each session to the room it is currently in.
    session_rooms: HashMap<SessionId, RoomId>,
}

impl RoomManager {
    /// Creates a new, empty room manager.
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            session_rooms: HashMap::new(),
        }
    }

    /// Creates a new room from options and returns its id.
    ///
    /// # Errors
    /// Any definition, schema, or machine problem fails creation with the
    /// underlying reason.
    pub fn create_room(&mut self, options: RoomOptions) -> Result<RoomId, RoomError> {
        let room_id = RoomId::next();
        let handle = spawn_room(room_id, options, DEFAULT_CHANNEL_SIZE)?;
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        Ok(room_id)
    }

    /// Adds a session to a room, enforcing one-room-at-a-time.
    pub async fn join_room(
        &mut self,
        session_id: SessionId,
        room_id: RoomId,
        name: Option<String>,
        sender: ClientSender,
    ) -> Result<(), RoomError> {
        if let Some(current) = self.session_rooms.get(&session_id) {
            if *current != room_id {
                return Err(RoomError::AlreadyInRoom(session_id, *current));
            }
            // Same room: fall through, the room treats it as a rejoin.
        }

        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        handle.join(session_id.clone(), name, sender).await?;
        self.session_rooms.insert(session_id, room_id);
        Ok(())
    }

    /// Removes a session from its current room.
    pub async fn leave_room(&mut self, session_id: SessionId) -> Result<(), RoomError> {
        let room_id = self
            .session_rooms
            .get(&session_id)
            .copied()
            .ok_or_else(|| RoomError::NotInRoom(session_id.clone()))?;

        if let Some(handle) = self.rooms.get(&room_id) {
            handle.leave(session_id.clone()).await?;
        }

        self.session_rooms.remove(&session_id);
        Ok(())
    }

    /// Routes a client event to the sender's current room.
    pub async fn route_message(
        &self,
        session_id: SessionId,
        event: impl Into<String>,
        payload: Json,
    ) -> Result<(), RoomError> {
        let room_id = self
            .session_rooms
            .get(&session_id)
            .ok_or_else(|| RoomError::NotInRoom(session_id.clone()))?;

        let handle = self
            .rooms
            .get(room_id)
            .ok_or(RoomError::NotFound(*room_id))?;

        handle.send_event(session_id, event, payload).await
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.info().await
    }

    /// Returns the current state snapshot of a specific room.
    pub async fn room_snapshot(&self, room_id: RoomId) -> Result<Json, RoomError> {
        let handle = self
            .rooms
            .get(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;
        handle.snapshot().await
    }

    /// Shuts down a room and drops all its sessions from the index.
    pub async fn dispose_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(&room_id)
            .ok_or(RoomError::NotFound(room_id))?;

        let _ = handle.shutdown().await;
        self.session_rooms.retain(|_, rid| *rid != room_id);

        tracing::info!(%room_id, "room disposed");
        Ok(())
    }

    /// Returns the room a session is currently in, if any.
    pub fn session_room(&self, session_id: &SessionId) -> Option<RoomId> {
        self.session_rooms.get(session_id).copied()
    }

    /// Returns info for all active rooms. Rooms that fail to respond
    /// (e.g. shutting down) are silently skipped.
    pub async fn list_rooms(&self) -> Vec<RoomInfo> {
        let mut infos = Vec::with_capacity(self.rooms.len());
        for handle in self.rooms.values() {
            if let Ok(info) = handle.info().await {
                infos.push(info);
            }
        }
        infos
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}
