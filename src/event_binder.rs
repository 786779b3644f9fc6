//! Binds engine notifications to component-local playback state.
//!
//! A binder is created per mounted component instance. `activate` registers
//! one engine listener per binding entry, `deactivate` (or dropping the
//! binder) removes all of them. Every write into local state, whether from a
//! notification or from a resolved command, goes through a [`CommandScope`]
//! that is checked under the same lock that deactivation takes, so nothing is
//! written once deactivation has begun.

use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::watch;

use crate::engine::{lock_unpoisoned, EngineHandle, EventListener, ListenerId};
use crate::error::SyncError;
use crate::protocol::{EngineEvent, EngineEventKind, MediaItem, PlaybackState};

/// Local state slot a notification can be written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSlot {
    MediaItem,
    PlaybackState,
    QueueItems,
}

/// Component-local reflection of engine state.
///
/// This is a rendering hint only. It is eventually consistent with the engine
/// and must not drive command decisions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalPlaybackState {
    pub media_item: Option<MediaItem>,
    pub playback_state: PlaybackState,
    pub queue_items: Vec<MediaItem>,
}

impl LocalPlaybackState {
    pub fn current_item_id(&self) -> Option<&str> {
        self.media_item.as_ref().map(|item| item.id.as_str())
    }

    pub fn is_item_playing(&self, item_id: &str) -> bool {
        self.playback_state.is_playing() && self.current_item_id() == Some(item_id)
    }

    /// Writes `event` into `slot`. Returns `false` when the payload does not
    /// belong to that slot.
    fn write(&mut self, slot: StateSlot, event: &EngineEvent) -> bool {
        match (slot, event) {
            (StateSlot::MediaItem, EngineEvent::MediaItemDidChange { item }) => {
                self.media_item = item.clone();
                true
            }
            (StateSlot::PlaybackState, EngineEvent::PlaybackStateDidChange { state, .. }) => {
                self.playback_state = *state;
                true
            }
            (StateSlot::QueueItems, EngineEvent::QueueItemsDidChange { items }) => {
                self.queue_items = items.clone();
                true
            }
            _ => false,
        }
    }
}

/// Ordered mapping from engine event kinds to local state slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBindings {
    entries: Vec<(EngineEventKind, StateSlot)>,
}

impl EventBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current item and play/pause state, as used by song list rows.
    pub fn now_playing() -> Self {
        Self::new()
            .bind(EngineEventKind::MediaItemDidChange, StateSlot::MediaItem)
            .bind(EngineEventKind::PlaybackStateDidChange, StateSlot::PlaybackState)
    }

    pub fn bind(mut self, kind: EngineEventKind, slot: StateSlot) -> Self {
        self.entries.push((kind, slot));
        self
    }

    pub fn entries(&self) -> &[(EngineEventKind, StateSlot)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct ScopeCell {
    generation: u64,
    active: bool,
    state: LocalPlaybackState,
}

/// Write guard for one activation of a component.
///
/// Cloned into engine listeners and into in-flight commands; writes succeed
/// only while the activation it was taken from is still current.
#[derive(Clone)]
pub struct CommandScope {
    cell: Arc<Mutex<ScopeCell>>,
    renders: Arc<watch::Sender<u64>>,
    generation: u64,
}

impl CommandScope {
    /// A scope not owned by any component, always active.
    pub fn detached() -> Self {
        let (renders, _) = watch::channel(0);
        Self {
            cell: Arc::new(Mutex::new(ScopeCell {
                generation: 0,
                active: true,
                state: LocalPlaybackState::default(),
            })),
            renders: Arc::new(renders),
            generation: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        let cell = lock_unpoisoned(&self.cell);
        cell.active && cell.generation == self.generation
    }

    pub fn snapshot(&self) -> LocalPlaybackState {
        lock_unpoisoned(&self.cell).state.clone()
    }

    /// Applies `update` to local state and schedules a re-render.
    ///
    /// Fails with [`SyncError::StaleUpdate`] once the owning activation ended.
    pub fn apply<F>(&self, update: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut LocalPlaybackState),
    {
        {
            let mut cell = lock_unpoisoned(&self.cell);
            if !cell.active || cell.generation != self.generation {
                return Err(SyncError::StaleUpdate);
            }
            update(&mut cell.state);
        }
        self.request_render();
        Ok(())
    }

    fn write_event(&self, slot: StateSlot, event: &EngineEvent) {
        let written = {
            let mut cell = lock_unpoisoned(&self.cell);
            if !cell.active || cell.generation != self.generation {
                debug!("EventBinder: dropped stale {} notification", event.kind());
                return;
            }
            cell.state.write(slot, event)
        };
        if written {
            self.request_render();
        }
    }

    fn request_render(&self) {
        self.renders.send_modify(|revision| *revision += 1);
    }
}

/// Subscribes one component instance to engine notifications.
pub struct EventBinder {
    engine: Option<EngineHandle>,
    bindings: EventBindings,
    cell: Arc<Mutex<ScopeCell>>,
    renders: Arc<watch::Sender<u64>>,
    subscriptions: Vec<ListenerId>,
    live: bool,
}

impl EventBinder {
    pub fn new(engine: Option<EngineHandle>, bindings: EventBindings) -> Self {
        let (renders, _) = watch::channel(0);
        Self {
            engine,
            bindings,
            cell: Arc::new(Mutex::new(ScopeCell {
                generation: 0,
                active: false,
                state: LocalPlaybackState::default(),
            })),
            renders: Arc::new(renders),
            subscriptions: Vec::new(),
            live: false,
        }
    }

    /// Registers one listener per binding entry.
    ///
    /// Without a reachable engine the binder stays active but static: local
    /// state keeps its last values and no live updates arrive. Calling
    /// `activate` again on a static binder retries the registration within
    /// the same activation; on a live binder it is a no-op.
    pub fn activate(&mut self) -> Result<(), SyncError> {
        if self.live {
            return Ok(());
        }

        {
            let mut cell = lock_unpoisoned(&self.cell);
            if !cell.active {
                cell.generation += 1;
                cell.active = true;
            }
        }
        let scope = self.scope();

        let Some(engine) = self.engine.clone() else {
            warn!("EventBinder: no playback engine, rendering without live updates");
            return Err(SyncError::EngineUnavailable);
        };

        let entries = self.bindings.entries().to_vec();
        for (kind, slot) in entries {
            let listener_scope = scope.clone();
            let listener: EventListener =
                Arc::new(move |event: &EngineEvent| listener_scope.write_event(slot, event));
            match engine.engine().add_event_listener(kind, listener) {
                Ok(id) => self.subscriptions.push(id),
                Err(err) => {
                    warn!(
                        "EventBinder: failed to register {} listener, rendering without live updates: {}",
                        kind, err
                    );
                    self.release_listeners();
                    return Err(SyncError::EngineUnavailable);
                }
            }
        }

        self.seed_from_engine(&engine, &scope);
        self.live = true;
        debug!(
            "EventBinder: activated with {} subscriptions",
            self.subscriptions.len()
        );
        Ok(())
    }

    /// Stops all writes, then removes every listener registered by `activate`.
    pub fn deactivate(&mut self) {
        let was_active = {
            let mut cell = lock_unpoisoned(&self.cell);
            std::mem::replace(&mut cell.active, false)
        };
        self.release_listeners();
        if was_active {
            debug!("EventBinder: deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        lock_unpoisoned(&self.cell).active
    }

    /// True while listeners are registered with a reachable engine.
    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn engine(&self) -> Option<&EngineHandle> {
        self.engine.as_ref()
    }

    /// Scope for the current activation.
    pub fn scope(&self) -> CommandScope {
        let generation = lock_unpoisoned(&self.cell).generation;
        CommandScope {
            cell: self.cell.clone(),
            renders: self.renders.clone(),
            generation,
        }
    }

    pub fn snapshot(&self) -> LocalPlaybackState {
        lock_unpoisoned(&self.cell).state.clone()
    }

    /// Revision counter bumped on every local state change.
    pub fn subscribe_renders(&self) -> watch::Receiver<u64> {
        self.renders.subscribe()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn seed_from_engine(&self, engine: &EngineHandle, scope: &CommandScope) {
        let snapshot = engine.queue_snapshot();
        let current = snapshot
            .position
            .and_then(|position| snapshot.items.get(position))
            .cloned();
        let playing = engine.is_playing();
        let seeded = scope.apply(|state| {
            for &(_, slot) in self.bindings.entries() {
                match slot {
                    StateSlot::MediaItem => state.media_item = current.clone(),
                    StateSlot::PlaybackState => {
                        state.playback_state = match (playing, current.is_some()) {
                            (true, _) => PlaybackState::Playing,
                            (false, true) => PlaybackState::Paused,
                            (false, false) => PlaybackState::None,
                        }
                    }
                    StateSlot::QueueItems => state.queue_items = snapshot.items.clone(),
                }
            }
        });
        if seeded.is_err() {
            debug!("EventBinder: skipped seeding a deactivated scope");
        }
    }

    fn release_listeners(&mut self) {
        self.live = false;
        let Some(engine) = self.engine.as_ref() else {
            self.subscriptions.clear();
            return;
        };
        for id in self.subscriptions.drain(..) {
            if !engine.engine().remove_event_listener(id) {
                debug!("EventBinder: listener {:?} was already removed", id);
            }
        }
    }
}

impl Drop for EventBinder {
    fn drop(&mut self) {
        self.deactivate();
    }
}
