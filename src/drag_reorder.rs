//! Drag-and-drop state machine for song lists.
//!
//! One controller is shared by all rows of a list. A gesture moves through
//! `Idle -> Dragging -> (Dropped | Cancelled) -> Idle`; a drop is translated
//! into exactly one queue command, or none when it lands on its origin.

use std::sync::{Arc, Mutex};

use log::debug;

use crate::engine::lock_unpoisoned;
use crate::error::{EngineError, SyncError};
use crate::event_binder::CommandScope;
use crate::protocol::MediaItem;
use crate::queue_controller::{CommandOutcome, QueueController};

/// Where a dragged item comes from relative to the list it is dropped on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    /// Dragged within the queue list itself; a drop reorders.
    Queue,
    /// Dragged in from another list (library, album, search); a drop inserts.
    External,
}

/// Data carried by one drag gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPayload {
    pub item: MediaItem,
    pub origin_index: usize,
    pub source: DragSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
}

/// Result of a finished gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// A command was issued and settled as described.
    Dropped(CommandOutcome),
    /// Dropped on its origin; nothing was issued.
    Unchanged,
    /// No drag in progress, or the target was invalid; nothing was issued.
    Cancelled,
}

/// Queue command a drop resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum DropCommand {
    Reorder { origin: usize, target: usize },
    Insert { index: usize, item: MediaItem },
    None,
}

/// Maps a drop onto a queue command.
///
/// For reorders `target` is the item's final index. For inserts it is the
/// index the new item will occupy. Indices are checked against the live queue
/// when the command runs, not here.
pub fn resolve_drop(payload: &DragPayload, target: usize) -> DropCommand {
    let origin = payload.origin_index;
    match payload.source {
        DragSource::Queue if origin == target => DropCommand::None,
        DragSource::Queue => DropCommand::Reorder { origin, target },
        DragSource::External => DropCommand::Insert {
            index: target,
            item: payload.item.clone(),
        },
    }
}

enum DragState {
    Idle,
    Dragging {
        payload: DragPayload,
        hover: Option<usize>,
    },
}

struct DragInner {
    state: DragState,
}

#[derive(Clone)]
pub struct DragReorderController {
    queue: QueueController,
    inner: Arc<Mutex<DragInner>>,
}

impl DragReorderController {
    pub fn new(queue: QueueController) -> Self {
        Self {
            queue,
            inner: Arc::new(Mutex::new(DragInner {
                state: DragState::Idle,
            })),
        }
    }

    pub fn phase(&self) -> DragPhase {
        match lock_unpoisoned(&self.inner).state {
            DragState::Idle => DragPhase::Idle,
            DragState::Dragging { .. } => DragPhase::Dragging,
        }
    }

    pub fn payload(&self) -> Option<DragPayload> {
        match &lock_unpoisoned(&self.inner).state {
            DragState::Idle => None,
            DragState::Dragging { payload, .. } => Some(payload.clone()),
        }
    }

    /// Starts a gesture. A gesture still in progress is abandoned.
    pub fn begin_drag(&self, item: MediaItem, origin_index: usize, source: DragSource) {
        let mut inner = lock_unpoisoned(&self.inner);
        if matches!(inner.state, DragState::Dragging { .. }) {
            debug!("DragReorderController: abandoning previous drag");
        }
        inner.state = DragState::Dragging {
            payload: DragPayload {
                item,
                origin_index,
                source,
            },
            hover: None,
        };
    }

    /// Records which row the drag is over. Ignored while idle.
    pub fn hover(&self, index: Option<usize>) {
        if let DragState::Dragging { hover, .. } = &mut lock_unpoisoned(&self.inner).state {
            *hover = index;
        }
    }

    /// Visual signal for a row: a drag is hovering over it.
    pub fn is_over(&self, index: usize) -> bool {
        matches!(
            lock_unpoisoned(&self.inner).state,
            DragState::Dragging { hover: Some(hovered), .. } if hovered == index
        )
    }

    /// Abandons the current gesture. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        let mut inner = lock_unpoisoned(&self.inner);
        let was_dragging = matches!(inner.state, DragState::Dragging { .. });
        inner.state = DragState::Idle;
        was_dragging
    }

    /// Cancels the gesture only if it started from row `index`.
    pub fn cancel_from(&self, index: usize) -> bool {
        let mut inner = lock_unpoisoned(&self.inner);
        let from_index = matches!(
            &inner.state,
            DragState::Dragging { payload, .. } if payload.origin_index == index
        );
        if from_index {
            inner.state = DragState::Idle;
            debug!("DragReorderController: drag cancelled, origin row {} unmounted", index);
        }
        from_index
    }

    /// Finishes the gesture on `target` and issues the resulting command.
    ///
    /// The controller is back to idle before the command is awaited, so a new
    /// gesture can begin while the engine is still working.
    pub async fn drop_at(
        &self,
        scope: &CommandScope,
        target: usize,
    ) -> Result<DropOutcome, SyncError> {
        let payload = {
            let mut inner = lock_unpoisoned(&self.inner);
            match std::mem::replace(&mut inner.state, DragState::Idle) {
                DragState::Idle => return Ok(DropOutcome::Cancelled),
                DragState::Dragging { payload, .. } => payload,
            }
        };

        let result = match resolve_drop(&payload, target) {
            DropCommand::None => return Ok(DropOutcome::Unchanged),
            DropCommand::Reorder { origin, target } => {
                self.queue
                    .reorder(scope, &payload.item, origin, target)
                    .await
            }
            DropCommand::Insert { index, item } => {
                self.queue.insert_at(scope, index, &item).await
            }
        };

        match result {
            Ok(outcome) => Ok(DropOutcome::Dropped(outcome)),
            Err(
                err @ (SyncError::InvalidDrop { .. }
                | SyncError::CommandRejected {
                    source: EngineError::InvalidIndex { .. },
                    ..
                }),
            ) => {
                debug!("DragReorderController: {}, treating as cancelled", err);
                Ok(DropOutcome::Cancelled)
            }
            Err(err) => Err(err),
        }
    }
}
