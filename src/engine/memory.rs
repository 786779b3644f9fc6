//! In-process playback engine.
//!
//! Keeps the queue and playback state in memory and dispatches notifications
//! synchronously to registered listeners. Used by the demo binary and by
//! tests, which can hold commands in flight, inject failures and inspect the
//! command log.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::watch;

use super::{lock_unpoisoned, EventListener, ListenerId, PlaybackEngine};
use crate::error::EngineError;
use crate::protocol::{
    EngineEvent, EngineEventKind, MediaItem, PlaybackState, QueueRequest, QueueSnapshot,
};

/// Command received by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    SetQueue { ids: Vec<String>, start_position: usize },
    Play,
    Pause,
    Prepend(Vec<String>),
    Append(Vec<String>),
    InsertAt { index: usize, ids: Vec<String> },
    Move { origin: usize, target: usize },
}

#[derive(Default)]
struct EngineCore {
    queue: Vec<MediaItem>,
    position: Option<usize>,
    state: PlaybackState,
}

impl EngineCore {
    fn current_item(&self) -> Option<&MediaItem> {
        self.position.and_then(|position| self.queue.get(position))
    }

    fn set_state(&mut self, next: PlaybackState, events: &mut Vec<EngineEvent>) {
        if self.state != next {
            events.push(EngineEvent::PlaybackStateDidChange {
                state: next,
                previous: self.state,
            });
            self.state = next;
        }
    }

    fn queue_changed(&self, events: &mut Vec<EngineEvent>) {
        events.push(EngineEvent::QueueItemsDidChange {
            items: self.queue.clone(),
        });
    }
}

struct RegisteredListener {
    id: ListenerId,
    kind: EngineEventKind,
    listener: EventListener,
}

pub struct MemoryEngine {
    core: Mutex<EngineCore>,
    listeners: Mutex<Vec<RegisteredListener>>,
    next_listener_id: AtomicU64,
    registrations: AtomicUsize,
    removals: AtomicUsize,
    commands: Mutex<Vec<EngineCommand>>,
    pending_failures: Mutex<VecDeque<EngineError>>,
    reachable: AtomicBool,
    gate: watch::Sender<bool>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            core: Mutex::new(EngineCore::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            registrations: AtomicUsize::new(0),
            removals: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
            pending_failures: Mutex::new(VecDeque::new()),
            reachable: AtomicBool::new(true),
            gate,
        }
    }

    /// Creates an engine with a pre-loaded queue.
    pub fn with_queue(items: Vec<MediaItem>, position: Option<usize>, playing: bool) -> Self {
        let engine = Self::new();
        {
            let mut core = lock_unpoisoned(&engine.core);
            core.position = position.filter(|position| *position < items.len());
            core.queue = items;
            core.state = if playing && core.position.is_some() {
                PlaybackState::Playing
            } else {
                PlaybackState::None
            };
        }
        engine
    }

    /// Holds every subsequent command before it touches engine state.
    pub fn hold_commands(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_commands(&self) {
        self.gate.send_replace(true);
    }

    /// Makes the next command fail with `error` after it is received.
    pub fn fail_next(&self, error: EngineError) {
        lock_unpoisoned(&self.pending_failures).push_back(error);
    }

    /// While unreachable, commands and listener registration fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        lock_unpoisoned(&self.commands).clone()
    }

    pub fn clear_commands(&self) {
        lock_unpoisoned(&self.commands).clear();
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn removal_count(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }

    pub fn active_listener_count(&self) -> usize {
        lock_unpoisoned(&self.listeners).len()
    }

    pub fn playback_state(&self) -> PlaybackState {
        lock_unpoisoned(&self.core).state
    }

    /// Plays the current item to its end: moves on to the next item, or
    /// reports `Ended` after the last one. Does nothing without a position.
    pub fn finish_current(&self) {
        let events = {
            let mut core = lock_unpoisoned(&self.core);
            let Some(position) = core.position else {
                return;
            };
            let mut events = Vec::new();
            if position + 1 < core.queue.len() {
                core.position = Some(position + 1);
                events.push(EngineEvent::MediaItemDidChange {
                    item: core.current_item().cloned(),
                });
            } else {
                core.set_state(PlaybackState::Ended, &mut events);
            }
            events
        };
        self.dispatch(events);
    }

    /// Dispatches an engine-originated notification, e.g. a track ending.
    pub fn emit(&self, event: EngineEvent) {
        self.dispatch(vec![event]);
    }

    fn dispatch(&self, events: Vec<EngineEvent>) {
        for event in events {
            let kind = event.kind();
            let targets: Vec<EventListener> = lock_unpoisoned(&self.listeners)
                .iter()
                .filter(|registered| registered.kind == kind)
                .map(|registered| registered.listener.clone())
                .collect();
            for listener in targets {
                listener(&event);
            }
        }
    }

    async fn run_command<F>(&self, command: EngineCommand, apply: F) -> Result<(), EngineError>
    where
        F: FnOnce(&mut EngineCore) -> Result<Vec<EngineEvent>, EngineError> + Send,
    {
        lock_unpoisoned(&self.commands).push(command.clone());

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if !self.reachable.load(Ordering::SeqCst) {
            warn!("MemoryEngine: {:?} while unreachable", command);
            return Err(EngineError::Unreachable);
        }
        let injected = lock_unpoisoned(&self.pending_failures).pop_front();
        if let Some(error) = injected {
            debug!("MemoryEngine: failing {:?} with {}", command, error);
            return Err(error);
        }

        let events = {
            let mut core = lock_unpoisoned(&self.core);
            apply(&mut core)?
        };
        self.dispatch(events);
        Ok(())
    }
}

fn ids(items: &[MediaItem]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

#[async_trait]
impl PlaybackEngine for MemoryEngine {
    async fn set_queue(&self, request: QueueRequest) -> Result<(), EngineError> {
        let command = EngineCommand::SetQueue {
            ids: ids(&request.items),
            start_position: request.start_position,
        };
        self.run_command(command, move |core| {
            let QueueRequest {
                start_position,
                items,
            } = request;
            if start_position >= items.len() {
                return Err(EngineError::InvalidIndex {
                    index: start_position,
                    len: items.len(),
                });
            }
            let mut events = Vec::new();
            core.queue = items;
            core.position = Some(start_position);
            core.queue_changed(&mut events);
            events.push(EngineEvent::MediaItemDidChange {
                item: core.current_item().cloned(),
            });
            core.set_state(PlaybackState::Stopped, &mut events);
            Ok(events)
        })
        .await
    }

    async fn play(&self) -> Result<(), EngineError> {
        self.run_command(EngineCommand::Play, |core| {
            if core.queue.is_empty() {
                return Err(EngineError::Rejected("queue is empty".to_string()));
            }
            let mut events = Vec::new();
            if core.position.is_none() {
                core.position = Some(0);
                events.push(EngineEvent::MediaItemDidChange {
                    item: core.current_item().cloned(),
                });
            }
            core.set_state(PlaybackState::Playing, &mut events);
            Ok(events)
        })
        .await
    }

    async fn pause(&self) -> Result<(), EngineError> {
        self.run_command(EngineCommand::Pause, |core| {
            let mut events = Vec::new();
            if core.state == PlaybackState::Playing {
                core.set_state(PlaybackState::Paused, &mut events);
            }
            Ok(events)
        })
        .await
    }

    async fn queue_prepend(&self, items: Vec<MediaItem>) -> Result<(), EngineError> {
        self.run_command(EngineCommand::Prepend(ids(&items)), move |core| {
            let insert_at = core.position.map(|position| position + 1).unwrap_or(0);
            core.queue.splice(insert_at..insert_at, items);
            let mut events = Vec::new();
            core.queue_changed(&mut events);
            Ok(events)
        })
        .await
    }

    async fn queue_append(&self, items: Vec<MediaItem>) -> Result<(), EngineError> {
        self.run_command(EngineCommand::Append(ids(&items)), move |core| {
            core.queue.extend(items);
            let mut events = Vec::new();
            core.queue_changed(&mut events);
            Ok(events)
        })
        .await
    }

    async fn queue_insert_at(
        &self,
        index: usize,
        items: Vec<MediaItem>,
    ) -> Result<(), EngineError> {
        let command = EngineCommand::InsertAt {
            index,
            ids: ids(&items),
        };
        self.run_command(command, move |core| {
            let len = core.queue.len();
            if index > len {
                return Err(EngineError::InvalidIndex { index, len });
            }
            let inserted = items.len();
            core.queue.splice(index..index, items);
            if let Some(position) = core.position {
                if index <= position {
                    core.position = Some(position + inserted);
                }
            }
            let mut events = Vec::new();
            core.queue_changed(&mut events);
            Ok(events)
        })
        .await
    }

    async fn queue_move(&self, origin: usize, target: usize) -> Result<(), EngineError> {
        self.run_command(EngineCommand::Move { origin, target }, move |core| {
            let len = core.queue.len();
            for index in [origin, target] {
                if index >= len {
                    return Err(EngineError::InvalidIndex { index, len });
                }
            }
            let mut order: Vec<usize> = (0..len).collect();
            let moved = order.remove(origin);
            order.insert(target, moved);

            let mut slots: Vec<Option<MediaItem>> =
                std::mem::take(&mut core.queue).into_iter().map(Some).collect();
            core.queue = order
                .iter()
                .filter_map(|&previous| slots[previous].take())
                .collect();
            core.position = core
                .position
                .and_then(|current| order.iter().position(|&previous| previous == current));

            let mut events = Vec::new();
            core.queue_changed(&mut events);
            Ok(events)
        })
        .await
    }

    fn now_playing_item_id(&self) -> Option<String> {
        lock_unpoisoned(&self.core)
            .current_item()
            .map(|item| item.id.clone())
    }

    fn is_playing(&self) -> bool {
        lock_unpoisoned(&self.core).state.is_playing()
    }

    fn queue_snapshot(&self) -> QueueSnapshot {
        let core = lock_unpoisoned(&self.core);
        QueueSnapshot {
            items: core.queue.clone(),
            position: core.position,
        }
    }

    fn add_event_listener(
        &self,
        kind: EngineEventKind,
        listener: EventListener,
    ) -> Result<ListenerId, EngineError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(EngineError::Unreachable);
        }
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        lock_unpoisoned(&self.listeners).push(RegisteredListener { id, kind, listener });
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock_unpoisoned(&self.listeners);
        let before = listeners.len();
        listeners.retain(|registered| registered.id != id);
        let removed = listeners.len() != before;
        if removed {
            self.removals.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }
}
