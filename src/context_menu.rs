//! Context menu for a song row.
//!
//! Building the menu is pure. Selecting an action issues at most one queue
//! command; artist/album navigation and library additions are placeholders
//! that issue nothing.

use log::debug;

use crate::error::{EngineError, SyncError};
use crate::event_binder::CommandScope;
use crate::protocol::MediaItem;
use crate::queue_controller::{CommandOutcome, QueueController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Play,
    PlayNext,
    PlayLater,
    ShowArtist,
    ShowAlbum,
    AddToLibrary,
}

impl MenuAction {
    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Play => "Play",
            MenuAction::PlayNext => "Play next",
            MenuAction::PlayLater => "Play later",
            MenuAction::ShowArtist => "Show Artist",
            MenuAction::ShowAlbum => "Show Album",
            MenuAction::AddToLibrary => "Add to library",
        }
    }

    /// Actions with no command behind them yet.
    pub fn is_placeholder(self) -> bool {
        matches!(
            self,
            MenuAction::ShowArtist | MenuAction::ShowAlbum | MenuAction::AddToLibrary
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    Action(MenuAction),
    Divider,
}

/// Item summary shown at the top of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuHeader {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenu {
    pub header: MenuHeader,
    pub entries: Vec<MenuEntry>,
}

impl ContextMenu {
    pub fn actions(&self) -> impl Iterator<Item = MenuAction> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            MenuEntry::Action(action) => Some(*action),
            MenuEntry::Divider => None,
        })
    }

    pub fn contains(&self, action: MenuAction) -> bool {
        self.actions().any(|candidate| candidate == action)
    }
}

/// Builds the ordered action list for `item`.
pub fn build_context_menu(item: &MediaItem, in_library: bool) -> ContextMenu {
    let mut entries = vec![
        MenuEntry::Action(MenuAction::Play),
        MenuEntry::Action(MenuAction::PlayNext),
        MenuEntry::Action(MenuAction::PlayLater),
        MenuEntry::Divider,
        MenuEntry::Action(MenuAction::ShowArtist),
        MenuEntry::Action(MenuAction::ShowAlbum),
    ];
    if !in_library {
        entries.push(MenuEntry::Divider);
        entries.push(MenuEntry::Action(MenuAction::AddToLibrary));
    }

    ContextMenu {
        header: MenuHeader {
            title: item.name.clone(),
            artist: item.artist_name.clone(),
            album: item.album_name.clone(),
            artwork: item.artwork.clone(),
        },
        entries,
    }
}

/// Runs `action` for `items[index]`.
pub async fn dispatch_action(
    action: MenuAction,
    queue: &QueueController,
    scope: &CommandScope,
    items: &[MediaItem],
    index: usize,
) -> Result<CommandOutcome, SyncError> {
    if action.is_placeholder() {
        debug!("ContextMenu: '{}' has no command yet", action.label());
        return Ok(CommandOutcome::Skipped);
    }
    let Some(item) = items.get(index) else {
        return Err(SyncError::rejected(
            action.label(),
            EngineError::InvalidIndex {
                index,
                len: items.len(),
            },
        ));
    };
    match action {
        MenuAction::Play => queue.play_from(scope, items, index).await,
        MenuAction::PlayNext => queue.queue_next(scope, item).await,
        MenuAction::PlayLater => queue.queue_later(scope, item).await,
        MenuAction::ShowArtist | MenuAction::ShowAlbum | MenuAction::AddToLibrary => {
            Ok(CommandOutcome::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{build_context_menu, dispatch_action, MenuAction, MenuEntry};
    use crate::config::EngineConfig;
    use crate::engine::memory::tests_support::{item, items};
    use crate::engine::memory::{EngineCommand, MemoryEngine};
    use crate::engine::EngineHandle;
    use crate::event_binder::CommandScope;
    use crate::queue_controller::{CommandOutcome, QueueController};

    #[test]
    fn test_menu_offers_add_to_library_only_outside_library() {
        let song = item("a");
        let outside = build_context_menu(&song, false);
        let inside = build_context_menu(&song, true);

        assert_eq!(
            outside.entries,
            vec![
                MenuEntry::Action(MenuAction::Play),
                MenuEntry::Action(MenuAction::PlayNext),
                MenuEntry::Action(MenuAction::PlayLater),
                MenuEntry::Divider,
                MenuEntry::Action(MenuAction::ShowArtist),
                MenuEntry::Action(MenuAction::ShowAlbum),
                MenuEntry::Divider,
                MenuEntry::Action(MenuAction::AddToLibrary),
            ]
        );
        assert_eq!(inside.entries, outside.entries[..6].to_vec());
        assert!(!inside.contains(MenuAction::AddToLibrary));
    }

    #[test]
    fn test_menu_header_describes_item() {
        let menu = build_context_menu(&item("a"), true);
        assert_eq!(menu.header.title, "Song A");
        assert_eq!(menu.header.artist, "Test Artist");
        assert_eq!(menu.header.album, "Test Album");
    }

    #[tokio::test]
    async fn test_each_action_issues_at_most_one_command() {
        let songs = items(&["a", "b"]);
        let cases = [
            (MenuAction::PlayNext, 1),
            (MenuAction::PlayLater, 1),
            (MenuAction::ShowArtist, 0),
            (MenuAction::ShowAlbum, 0),
            (MenuAction::AddToLibrary, 0),
        ];
        for (action, expected) in cases {
            let engine = Arc::new(MemoryEngine::with_queue(items(&["q"]), Some(0), true));
            let queue =
                QueueController::new(EngineHandle::new(engine.clone()), &EngineConfig::default());
            dispatch_action(action, &queue, &CommandScope::detached(), &songs, 1)
                .await
                .expect("action succeeds");
            assert_eq!(engine.commands().len(), expected, "{:?}", action);
        }
    }

    #[tokio::test]
    async fn test_play_action_plays_list_from_index() {
        let songs = items(&["a", "b", "c"]);
        let engine = Arc::new(MemoryEngine::new());
        let queue = QueueController::new(EngineHandle::new(engine.clone()), &EngineConfig::default());

        let outcome = dispatch_action(MenuAction::Play, &queue, &CommandScope::detached(), &songs, 2)
            .await
            .expect("play succeeds");

        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(
            engine.commands(),
            vec![
                EngineCommand::SetQueue {
                    ids: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                    start_position: 2,
                },
                EngineCommand::Play,
            ]
        );
    }
}
