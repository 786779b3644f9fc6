//! A single row of a song list.
//!
//! The row owns its engine subscription, turns clicks into play/pause
//! toggles, exposes its context menu and drag source, and renders into a
//! [`SongRow`] view-model. Command failures stop here: they are logged and
//! published as notices, never returned to the renderer.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::app_context::SyncContext;
use crate::context_menu::{build_context_menu, dispatch_action, ContextMenu, MenuAction};
use crate::drag_reorder::{DragReorderController, DragSource, DropOutcome};
use crate::error::SyncError;
use crate::event_binder::{EventBinder, EventBindings};
use crate::protocol::{MediaItem, Notice};
use crate::queue_controller::{CommandOutcome, QueueController};

/// Which secondary columns a row shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongListItemOptions {
    pub show_artist: bool,
    pub show_album: bool,
}

/// Render-ready description of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRow {
    pub title: String,
    /// "artist - album", or whichever of the two is enabled.
    pub subtitle: Option<String>,
    pub duration: String,
    pub explicit: bool,
    /// Rows in album views are numbered instead of showing artwork.
    pub indexed: bool,
    pub playing: bool,
    pub droppable: bool,
}

pub struct SongListItem {
    instance_id: Uuid,
    songs: Arc<Vec<MediaItem>>,
    index: usize,
    options: SongListItemOptions,
    binder: EventBinder,
    queue: Option<QueueController>,
    drag: Option<(DragReorderController, DragSource)>,
    notices: broadcast::Sender<Notice>,
}

impl SongListItem {
    /// Returns `None` when `index` is outside `songs`.
    pub fn new(
        context: &SyncContext,
        songs: Arc<Vec<MediaItem>>,
        index: usize,
        options: SongListItemOptions,
    ) -> Option<Self> {
        if index >= songs.len() {
            return None;
        }
        Some(Self {
            instance_id: Uuid::new_v4(),
            songs,
            index,
            options,
            binder: EventBinder::new(context.engine.clone(), EventBindings::now_playing()),
            queue: context.queue.clone(),
            drag: None,
            notices: context.notices.clone(),
        })
    }

    /// Makes the row a drag source and drop target of `drag`.
    pub fn with_drag(mut self, drag: DragReorderController, source: DragSource) -> Self {
        self.drag = Some((drag, source));
        self
    }

    pub fn song(&self) -> &MediaItem {
        &self.songs[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mount(&mut self) {
        if let Err(err) = self.binder.activate() {
            warn!(
                "SongListItem {}: mounted without live updates: {}",
                self.instance_id, err
            );
        } else {
            debug!("SongListItem {}: mounted", self.instance_id);
        }
    }

    pub fn unmount(&mut self) {
        if let Some((drag, _)) = &self.drag {
            drag.cancel_from(self.index);
        }
        self.binder.deactivate();
        debug!("SongListItem {}: unmounted", self.instance_id);
    }

    pub fn is_mounted(&self) -> bool {
        self.binder.is_active()
    }

    /// Plays the list from this row, or pauses if this row is playing.
    pub async fn click(&self) {
        let Some(queue) = self.queue_or_notify() else {
            return;
        };
        let result = queue
            .toggle(&self.binder.scope(), &self.songs, self.index)
            .await;
        self.report("toggle", result);
    }

    pub fn context_menu(&self) -> ContextMenu {
        let song = self.song();
        build_context_menu(song, song.in_library)
    }

    pub async fn select_menu_action(&self, action: MenuAction) {
        let Some(queue) = self.queue_or_notify() else {
            return;
        };
        if action.is_placeholder() {
            let _ = self
                .notices
                .send(Notice::info(format!("{} is not available yet", action.label())));
        }
        let result = dispatch_action(
            action,
            queue,
            &self.binder.scope(),
            &self.songs,
            self.index,
        )
        .await;
        self.report(action.label(), result);
    }

    /// Starts dragging this row. No-op for rows without a drag controller.
    pub fn begin_drag(&self) {
        if let Some((drag, source)) = &self.drag {
            drag.begin_drag(self.song().clone(), self.index, *source);
        }
    }

    pub fn drag_enter(&self) {
        if let Some((drag, _)) = &self.drag {
            drag.hover(Some(self.index));
        }
    }

    /// Completes the current drag with this row as the target.
    pub async fn drop_here(&self) -> DropOutcome {
        let Some((drag, _)) = &self.drag else {
            return DropOutcome::Cancelled;
        };
        match drag.drop_at(&self.binder.scope(), self.index).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_failure("drop", err);
                DropOutcome::Cancelled
            }
        }
    }

    pub fn row(&self) -> SongRow {
        let song = self.song();
        let local = self.binder.snapshot();
        let SongListItemOptions {
            show_artist,
            show_album,
        } = self.options;

        let subtitle = match (show_artist, show_album) {
            (true, true) => Some(format!("{} - {}", song.artist_name, song.album_name)),
            (true, false) => Some(song.artist_name.clone()),
            (false, true) => Some(song.album_name.clone()),
            (false, false) => None,
        };

        SongRow {
            title: song.name.clone(),
            subtitle,
            duration: format_duration(song.duration_ms),
            explicit: song.explicit,
            indexed: !show_album,
            playing: local.is_item_playing(&song.id),
            droppable: self
                .drag
                .as_ref()
                .is_some_and(|(drag, _)| drag.is_over(self.index)),
        }
    }

    /// Re-render signal for this row.
    pub fn subscribe_renders(&self) -> tokio::sync::watch::Receiver<u64> {
        self.binder.subscribe_renders()
    }

    fn queue_or_notify(&self) -> Option<&QueueController> {
        if self.queue.is_none() {
            self.report_failure("command", SyncError::EngineUnavailable);
        }
        self.queue.as_ref()
    }

    fn report(&self, command: &str, result: Result<CommandOutcome, SyncError>) {
        match result {
            Ok(outcome) => debug!(
                "SongListItem {}: {} settled as {:?}",
                self.instance_id, command, outcome
            ),
            Err(err) => self.report_failure(command, err),
        }
    }

    fn report_failure(&self, command: &str, err: SyncError) {
        if err == SyncError::StaleUpdate {
            debug!("SongListItem {}: {} arrived after unmount", self.instance_id, command);
            return;
        }
        warn!("SongListItem {}: {} failed: {}", self.instance_id, command, err);
        let _ = self.notices.send(Notice::warning(err.to_string()));
    }
}

impl Drop for SongListItem {
    fn drop(&mut self) {
        if let Some((drag, _)) = &self.drag {
            drag.cancel_from(self.index);
        }
    }
}

/// Formats a duration as `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(duration_ms: u64) -> String {
    let total_secs = duration_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
