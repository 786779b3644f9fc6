//! Interface to the external playback engine and its process-wide lifecycle.
//!
//! The engine owns the live queue and playback state. UI code never talks to
//! it directly: the queue controller issues commands, the event binder
//! registers listeners, and everything else receives an [`EngineHandle`] that
//! only exposes read-only queries.

pub mod memory;

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{debug, info};

use crate::error::{EngineError, SyncError};
use crate::protocol::{EngineEvent, EngineEventKind, MediaItem, QueueRequest, QueueSnapshot};

/// Callback invoked by the engine for every notification of a registered kind.
pub type EventListener = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Cancel handle returned by [`PlaybackEngine::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Operations the synchronization layer consumes from a playback engine.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Replaces the whole queue and positions it at `request.start_position`.
    async fn set_queue(&self, request: QueueRequest) -> Result<(), EngineError>;
    async fn play(&self) -> Result<(), EngineError>;
    async fn pause(&self) -> Result<(), EngineError>;
    /// Inserts `items` right after the current position.
    async fn queue_prepend(&self, items: Vec<MediaItem>) -> Result<(), EngineError>;
    /// Appends `items` to the end of the queue.
    async fn queue_append(&self, items: Vec<MediaItem>) -> Result<(), EngineError>;
    /// Inserts `items` so that the first one lands at `index`.
    async fn queue_insert_at(&self, index: usize, items: Vec<MediaItem>)
        -> Result<(), EngineError>;
    /// Moves the item at `origin` so that it ends up at `target`, in one step.
    async fn queue_move(&self, origin: usize, target: usize) -> Result<(), EngineError>;

    fn now_playing_item_id(&self) -> Option<String>;
    fn is_playing(&self) -> bool;
    fn queue_snapshot(&self) -> QueueSnapshot;

    fn add_event_listener(
        &self,
        kind: EngineEventKind,
        listener: EventListener,
    ) -> Result<ListenerId, EngineError>;
    /// Returns `false` when `id` was not registered.
    fn remove_event_listener(&self, id: ListenerId) -> bool;
}

/// Shared, read-only capability over the live engine.
///
/// Mutating commands are reachable only from inside the crate, through the
/// queue controller.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn PlaybackEngine>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn PlaybackEngine>) -> Self {
        Self { engine }
    }

    pub fn now_playing_item_id(&self) -> Option<String> {
        self.engine.now_playing_item_id()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// True when `item_id` is the current item and the engine is playing.
    pub fn is_item_playing(&self, item_id: &str) -> bool {
        self.engine.is_playing() && self.engine.now_playing_item_id().as_deref() == Some(item_id)
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.engine.queue_snapshot()
    }

    pub(crate) fn engine(&self) -> &dyn PlaybackEngine {
        self.engine.as_ref()
    }

    /// Owned reference for requests that may outlive the caller.
    pub(crate) fn shared(&self) -> Arc<dyn PlaybackEngine> {
        self.engine.clone()
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

enum HostState {
    Uninitialized,
    Ready(EngineHandle),
    TornDown,
}

/// Owner of the process-wide engine instance.
///
/// The engine is initialized once, never re-initialized, and torn down on
/// application exit. Components receive handles explicitly instead of reaching
/// for a global.
pub struct EngineHost {
    state: Mutex<HostState>,
}

impl Default for EngineHost {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState::Uninitialized),
        }
    }

    pub fn initialize(&self, engine: Arc<dyn PlaybackEngine>) -> Result<EngineHandle, SyncError> {
        let mut state = lock_unpoisoned(&self.state);
        match *state {
            HostState::Uninitialized => {
                let handle = EngineHandle::new(engine);
                *state = HostState::Ready(handle.clone());
                info!("EngineHost: playback engine initialized");
                Ok(handle)
            }
            HostState::Ready(_) | HostState::TornDown => Err(SyncError::AlreadyInitialized),
        }
    }

    /// Returns `None` before initialization and after teardown.
    pub fn handle(&self) -> Option<EngineHandle> {
        match &*lock_unpoisoned(&self.state) {
            HostState::Ready(handle) => Some(handle.clone()),
            HostState::Uninitialized | HostState::TornDown => None,
        }
    }

    /// Releases the host's engine reference. Returns `false` if nothing was live.
    pub fn teardown(&self) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        let was_ready = matches!(*state, HostState::Ready(_));
        if !matches!(*state, HostState::Uninitialized) {
            *state = HostState::TornDown;
        }
        if was_ready {
            debug!("EngineHost: playback engine torn down");
        }
        was_ready
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
