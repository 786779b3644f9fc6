//! Ordered command API over the engine's playback queue.
//!
//! Every command runs on one FIFO lane shared by all controls of an engine:
//! a gesture's whole command chain (e.g. replace queue, then play) completes
//! before the next gesture's chain is issued. Confirmed results are written
//! into the caller's [`CommandScope`]; failures leave local state untouched.
//!
//! A request that outlives the configured timeout is reported to its caller
//! as [`EngineError::Timeout`], but keeps the lane until the engine settles
//! it, so later gestures never overtake it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::EngineConfig;
use crate::engine::{EngineHandle, PlaybackEngine};
use crate::error::{EngineError, SyncError};
use crate::event_binder::{CommandScope, LocalPlaybackState};
use crate::protocol::{MediaItem, PlaybackState, QueueRequest};

/// How a successfully issued command settled locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Engine accepted the command while the issuing component was active.
    /// Local slots the command affects (current item, play state) were
    /// updated; pure queue edits have none and arrive as notifications.
    Applied,
    /// Nothing to do, no engine command was issued.
    Skipped,
    /// Engine accepted the command but the issuing component had deactivated.
    Discarded,
}

/// Lane ownership for one gesture. Taken away when a timed-out request has to
/// keep the lane until it settles.
type Lane = Option<OwnedMutexGuard<()>>;

struct ControllerInner {
    engine: EngineHandle,
    lane: Arc<Mutex<()>>,
    command_timeout: Option<Duration>,
}

/// The only path through which the engine queue and playback state change.
#[derive(Clone)]
pub struct QueueController {
    inner: Arc<ControllerInner>,
}

impl QueueController {
    pub fn new(engine: EngineHandle, config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                lane: Arc::new(Mutex::new(())),
                command_timeout: config.command_timeout(),
            }),
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.inner.engine
    }

    /// Replaces the queue with `items` and starts playback at `start_index`.
    pub async fn play_from(
        &self,
        scope: &CommandScope,
        items: &[MediaItem],
        start_index: usize,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        self.play_from_in_lane(&mut lane, scope, items, start_index)
            .await
    }

    /// Pauses playback. Issues nothing when the engine is not playing.
    pub async fn pause(&self, scope: &CommandScope) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        self.pause_in_lane(&mut lane, scope).await
    }

    /// Inserts `item` right after the current position.
    pub async fn queue_next(
        &self,
        scope: &CommandScope,
        item: &MediaItem,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        let items = vec![item.clone()];
        self.call(&mut lane, "queue_next", move |engine| async move {
            engine.queue_prepend(items).await
        })
        .await?;
        Ok(settle(scope, "queue_next"))
    }

    /// Appends `item` to the end of the queue.
    pub async fn queue_later(
        &self,
        scope: &CommandScope,
        item: &MediaItem,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        let items = vec![item.clone()];
        self.call(&mut lane, "queue_later", move |engine| async move {
            engine.queue_append(items).await
        })
        .await?;
        Ok(settle(scope, "queue_later"))
    }

    /// Pauses when `items[index]` is the item currently playing, otherwise
    /// plays `items` from `index`.
    ///
    /// The decision is taken from the engine inside the lane, never from
    /// local state, so rapid toggles resolve in the order they were issued.
    pub async fn toggle(
        &self,
        scope: &CommandScope,
        items: &[MediaItem],
        index: usize,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        let Some(item) = items.get(index) else {
            return Err(SyncError::rejected(
                "toggle",
                EngineError::InvalidIndex {
                    index,
                    len: items.len(),
                },
            ));
        };
        if self.inner.engine.is_item_playing(&item.id) {
            self.pause_in_lane(&mut lane, scope).await
        } else {
            self.play_from_in_lane(&mut lane, scope, items, index).await
        }
    }

    /// Moves `item`, expected at queue index `origin`, to final position
    /// `target` in one engine operation.
    ///
    /// Checked against the live queue inside the lane: when `item` is no
    /// longer at `origin`, or either index is out of range, nothing is issued
    /// and the move fails with [`SyncError::InvalidDrop`].
    pub async fn reorder(
        &self,
        scope: &CommandScope,
        item: &MediaItem,
        origin: usize,
        target: usize,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        let queue = self.inner.engine.queue_snapshot();
        let in_place = queue
            .items
            .get(origin)
            .is_some_and(|queued| queued.id == item.id);
        if !in_place || target >= queue.items.len() {
            debug!(
                "QueueController: reorder of {} from {} to {} no longer matches the queue",
                item.id, origin, target
            );
            return Err(SyncError::InvalidDrop { origin, target });
        }
        self.call(&mut lane, "reorder", move |engine| async move {
            engine.queue_move(origin, target).await
        })
        .await?;
        Ok(settle(scope, "reorder"))
    }

    /// Inserts `item` into the queue at `index`.
    ///
    /// `index` may equal the queue length. Larger values are rejected before
    /// anything is issued.
    pub async fn insert_at(
        &self,
        scope: &CommandScope,
        index: usize,
        item: &MediaItem,
    ) -> Result<CommandOutcome, SyncError> {
        let mut lane = self.enter_lane().await;
        let len = self.inner.engine.queue_snapshot().items.len();
        if index > len {
            return Err(SyncError::rejected(
                "insert_at",
                EngineError::InvalidIndex { index, len },
            ));
        }
        let items = vec![item.clone()];
        self.call(&mut lane, "insert_at", move |engine| async move {
            engine.queue_insert_at(index, items).await
        })
        .await?;
        Ok(settle(scope, "insert_at"))
    }

    async fn enter_lane(&self) -> Lane {
        Some(self.inner.lane.clone().lock_owned().await)
    }

    async fn play_from_in_lane(
        &self,
        lane: &mut Lane,
        scope: &CommandScope,
        items: &[MediaItem],
        start_index: usize,
    ) -> Result<CommandOutcome, SyncError> {
        let Some(start_item) = items.get(start_index).cloned() else {
            return Err(SyncError::rejected(
                "play_from",
                EngineError::InvalidIndex {
                    index: start_index,
                    len: items.len(),
                },
            ));
        };
        let request = QueueRequest {
            start_position: start_index,
            items: items.to_vec(),
        };
        self.call(lane, "set_queue", move |engine| async move {
            engine.set_queue(request).await
        })
        .await?;
        self.call(lane, "play", |engine| async move { engine.play().await })
            .await?;

        Ok(commit(scope, "play_from", move |state| {
            state.media_item = Some(start_item);
            state.playback_state = PlaybackState::Playing;
        }))
    }

    async fn pause_in_lane(
        &self,
        lane: &mut Lane,
        scope: &CommandScope,
    ) -> Result<CommandOutcome, SyncError> {
        if !self.inner.engine.is_playing() {
            debug!("QueueController: pause skipped, engine is not playing");
            return Ok(CommandOutcome::Skipped);
        }
        self.call(lane, "pause", |engine| async move { engine.pause().await })
            .await?;
        Ok(commit(scope, "pause", |state| {
            state.playback_state = PlaybackState::Paused;
        }))
    }

    /// Issues one engine request on behalf of the lane holder.
    ///
    /// On timeout the request keeps running in a background task that owns
    /// the lane, and the caller gets [`EngineError::Timeout`] right away.
    async fn call<R, F>(
        &self,
        lane: &mut Lane,
        command: &'static str,
        request: R,
    ) -> Result<(), SyncError>
    where
        R: FnOnce(Arc<dyn PlaybackEngine>) -> F,
        F: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        let pending = request(self.inner.engine.shared());
        let result = match self.inner.command_timeout {
            None => pending.await,
            Some(limit) => {
                let mut pending = Box::pin(pending);
                match tokio::time::timeout(limit, &mut pending).await {
                    Ok(result) => result,
                    Err(_) => {
                        let limit_ms = limit.as_millis() as u64;
                        warn!(
                            "QueueController: {} unanswered after {} ms, holding the lane until it settles",
                            command, limit_ms
                        );
                        let held = lane.take();
                        tokio::spawn(async move {
                            if let Err(err) = pending.await {
                                debug!("QueueController: timed out {} settled with {}", command, err);
                            }
                            drop(held);
                        });
                        Err(EngineError::Timeout(limit_ms))
                    }
                }
            }
        };
        result.map_err(|err| {
            debug!("QueueController: {} rejected: {}", command, err);
            SyncError::rejected(command, err)
        })
    }
}

fn commit<F>(scope: &CommandScope, command: &'static str, update: F) -> CommandOutcome
where
    F: FnOnce(&mut LocalPlaybackState),
{
    match scope.apply(update) {
        Ok(()) => CommandOutcome::Applied,
        Err(_) => {
            debug!(
                "QueueController: {} resolved after its component deactivated",
                command
            );
            CommandOutcome::Discarded
        }
    }
}

fn settle(scope: &CommandScope, command: &'static str) -> CommandOutcome {
    if scope.is_active() {
        CommandOutcome::Applied
    } else {
        debug!(
            "QueueController: {} resolved after its component deactivated",
            command
        );
        CommandOutcome::Discarded
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{CommandOutcome, QueueController};
    use crate::config::EngineConfig;
    use crate::engine::memory::tests_support::{item, items};
    use crate::engine::memory::{EngineCommand, MemoryEngine};
    use crate::engine::{EngineHandle, PlaybackEngine};
    use crate::error::{EngineError, SyncError};
    use crate::event_binder::{CommandScope, EventBinder, EventBindings};
    use crate::protocol::PlaybackState;

    fn controller_for(engine: &Arc<MemoryEngine>) -> QueueController {
        QueueController::new(
            EngineHandle::new(engine.clone()),
            &EngineConfig::default(),
        )
    }

    fn set_queue(ids: &[&str], start_position: usize) -> EngineCommand {
        EngineCommand::SetQueue {
            ids: ids.iter().map(|id| id.to_string()).collect(),
            start_position,
        }
    }

    async fn settle_tasks() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_play_from_replaces_queue_then_plays() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();
        let songs = items(&["a", "b", "c"]);

        let outcome = controller
            .play_from(&scope, &songs, 1)
            .await
            .expect("engine accepts play_from");

        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(
            engine.commands(),
            vec![set_queue(&["a", "b", "c"], 1), EngineCommand::Play]
        );
        let snapshot = engine.queue_snapshot();
        assert_eq!(snapshot.ids(), vec!["a", "b", "c"]);
        assert_eq!(snapshot.position, Some(1));
        assert!(engine.is_playing());
        assert!(scope.snapshot().is_item_playing("b"));
    }

    #[tokio::test]
    async fn test_concurrent_play_from_never_interleaves() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        engine.hold_commands();

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let scope = CommandScope::detached();
                controller.play_from(&scope, &items(&["a", "b", "c"]), 0).await
            })
        };
        settle_tasks().await;
        let second = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let scope = CommandScope::detached();
                controller.play_from(&scope, &items(&["x", "y"]), 1).await
            })
        };
        settle_tasks().await;
        assert_eq!(engine.commands(), vec![set_queue(&["a", "b", "c"], 0)]);

        engine.release_commands();
        first.await.expect("task joins").expect("first play_from");
        second.await.expect("task joins").expect("second play_from");

        assert_eq!(
            engine.commands(),
            vec![
                set_queue(&["a", "b", "c"], 0),
                EngineCommand::Play,
                set_queue(&["x", "y"], 1),
                EngineCommand::Play,
            ]
        );
        let snapshot = engine.queue_snapshot();
        assert_eq!(snapshot.ids(), vec!["x", "y"]);
        assert_eq!(engine.now_playing_item_id().as_deref(), Some("y"));
        assert!(engine.is_playing());
    }

    #[tokio::test]
    async fn test_rapid_toggles_resolve_in_issue_order() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        let songs = items(&["a", "b", "c"]);
        engine.hold_commands();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let controller = controller.clone();
            let songs = songs.clone();
            tasks.push(tokio::spawn(async move {
                let scope = CommandScope::detached();
                controller.toggle(&scope, &songs, 2).await
            }));
            settle_tasks().await;
        }

        engine.release_commands();
        for task in tasks {
            task.await.expect("task joins").expect("toggle succeeds");
        }

        assert_eq!(
            engine.commands(),
            vec![
                set_queue(&["a", "b", "c"], 2),
                EngineCommand::Play,
                EngineCommand::Pause,
                set_queue(&["a", "b", "c"], 2),
                EngineCommand::Play,
            ]
        );
        assert!(engine.is_playing());
        assert_eq!(engine.now_playing_item_id().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_clicking_other_item_plays_then_clicking_again_pauses() {
        let engine = Arc::new(MemoryEngine::with_queue(
            items(&["a", "b", "c"]),
            Some(0),
            true,
        ));
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();
        let songs = items(&["a", "b", "c"]);

        controller
            .toggle(&scope, &songs, 2)
            .await
            .expect("toggle plays c");
        assert_eq!(
            engine.commands(),
            vec![set_queue(&["a", "b", "c"], 2), EngineCommand::Play]
        );
        assert!(controller.engine().is_item_playing("c"));

        engine.clear_commands();
        controller
            .toggle(&scope, &songs, 2)
            .await
            .expect("toggle pauses c");
        assert_eq!(engine.commands(), vec![EngineCommand::Pause]);
        assert_eq!(engine.playback_state(), PlaybackState::Paused);
        assert_eq!(scope.snapshot().playback_state, PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_unmount_during_pending_play_from_skips_state_write() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        let mut binder = EventBinder::new(
            Some(EngineHandle::new(engine.clone())),
            EventBindings::now_playing(),
        );
        binder.activate().expect("engine is reachable");
        let before = binder.snapshot();
        engine.hold_commands();

        let pending = {
            let controller = controller.clone();
            let scope = binder.scope();
            tokio::spawn(async move {
                controller
                    .play_from(&scope, &items(&["a", "b", "c"]), 2)
                    .await
            })
        };
        settle_tasks().await;
        binder.deactivate();
        engine.release_commands();

        let outcome = pending
            .await
            .expect("task joins")
            .expect("engine accepts play_from");
        assert_eq!(outcome, CommandOutcome::Discarded);
        assert_eq!(binder.snapshot(), before);
        assert!(engine.is_playing());
    }

    #[tokio::test]
    async fn test_rejected_command_leaves_local_state_unchanged() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();
        engine.fail_next(EngineError::Rejected("network".to_string()));

        let result = controller.play_from(&scope, &items(&["a"]), 0).await;

        assert!(matches!(
            result,
            Err(SyncError::CommandRejected {
                command: "set_queue",
                ..
            })
        ));
        assert_eq!(engine.commands(), vec![set_queue(&["a"], 0)]);
        assert_eq!(scope.snapshot().playback_state, PlaybackState::None);
        assert!(scope.snapshot().media_item.is_none());
    }

    #[tokio::test]
    async fn test_play_from_rejects_out_of_range_start() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();

        let result = controller.play_from(&scope, &items(&["a", "b"]), 2).await;

        assert!(matches!(
            result,
            Err(SyncError::CommandRejected {
                command: "play_from",
                source: EngineError::InvalidIndex { index: 2, len: 2 },
            })
        ));
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn test_pause_is_idempotent() {
        let engine = Arc::new(MemoryEngine::with_queue(items(&["a"]), Some(0), false));
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();

        let outcome = controller.pause(&scope).await.expect("pause succeeds");

        assert_eq!(outcome, CommandOutcome::Skipped);
        assert!(engine.commands().is_empty());
    }

    #[tokio::test]
    async fn test_queue_next_and_later_positions() {
        let engine = Arc::new(MemoryEngine::with_queue(
            items(&["a", "b", "c"]),
            Some(0),
            true,
        ));
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();

        controller
            .queue_next(&scope, &item("n"))
            .await
            .expect("queue_next succeeds");
        controller
            .queue_later(&scope, &item("l"))
            .await
            .expect("queue_later succeeds");

        assert_eq!(
            engine.queue_snapshot().ids(),
            vec!["a", "n", "b", "c", "l"]
        );
        assert_eq!(engine.now_playing_item_id().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_unresponsive_engine_times_out() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = QueueController::new(
            EngineHandle::new(engine.clone()),
            &EngineConfig {
                command_timeout_ms: 20,
            },
        );
        let scope = CommandScope::detached();
        engine.hold_commands();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            controller.play_from(&scope, &items(&["a"]), 0),
        )
        .await
        .expect("controller gives up before the outer limit");

        assert!(matches!(
            result,
            Err(SyncError::CommandRejected {
                command: "set_queue",
                source: EngineError::Timeout(20),
            })
        ));
        assert!(scope.snapshot().media_item.is_none());
        engine.release_commands();
    }

    #[tokio::test]
    async fn test_timed_out_request_keeps_lane_until_it_settles() {
        let engine = Arc::new(MemoryEngine::new());
        let controller = QueueController::new(
            EngineHandle::new(engine.clone()),
            &EngineConfig {
                command_timeout_ms: 20,
            },
        );
        engine.hold_commands();

        let first = controller
            .play_from(&CommandScope::detached(), &items(&["a", "b"]), 0)
            .await;
        assert!(matches!(
            first,
            Err(SyncError::CommandRejected {
                source: EngineError::Timeout(20),
                ..
            })
        ));

        let second = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .play_from(&CommandScope::detached(), &items(&["x"]), 0)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(engine.commands(), vec![set_queue(&["a", "b"], 0)]);

        engine.release_commands();
        second
            .await
            .expect("task joins")
            .expect("second play_from runs once the lane is free");

        assert_eq!(
            engine.commands(),
            vec![
                set_queue(&["a", "b"], 0),
                set_queue(&["x"], 0),
                EngineCommand::Play,
            ]
        );
        assert_eq!(engine.now_playing_item_id().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_reorder_checks_item_against_live_queue() {
        let engine = Arc::new(MemoryEngine::with_queue(
            items(&["a", "b", "c"]),
            Some(0),
            true,
        ));
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();
        controller
            .queue_next(&scope, &item("c"))
            .await
            .expect("queue_next succeeds");
        engine.clear_commands();

        let result = controller.reorder(&scope, &item("c"), 2, 0).await;

        assert_eq!(
            result,
            Err(SyncError::InvalidDrop {
                origin: 2,
                target: 0
            })
        );
        assert!(engine.commands().is_empty());
        assert_eq!(engine.queue_snapshot().ids(), vec!["a", "c", "b", "c"]);

        controller
            .reorder(&scope, &item("c"), 3, 0)
            .await
            .expect("item is at its origin");
        assert_eq!(engine.queue_snapshot().ids(), vec!["c", "a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_reorder_and_insert_out_of_range_issue_nothing() {
        let engine = Arc::new(MemoryEngine::with_queue(items(&["a", "b"]), Some(0), true));
        let controller = controller_for(&engine);
        let scope = CommandScope::detached();

        let moved = controller.reorder(&scope, &item("a"), 0, 2).await;
        let inserted = controller.insert_at(&scope, 3, &item("x")).await;

        assert_eq!(
            moved,
            Err(SyncError::InvalidDrop {
                origin: 0,
                target: 2
            })
        );
        assert!(matches!(
            inserted,
            Err(SyncError::CommandRejected {
                command: "insert_at",
                source: EngineError::InvalidIndex { index: 3, len: 2 },
            })
        ));
        assert!(engine.commands().is_empty());
    }
}
