//! Playback-synchronization layer for song-list UIs.
//!
//! Rows subscribe to a shared playback engine through an [`event_binder`],
//! issue serialized commands through the [`queue_controller`] and support
//! context-menu and drag-and-drop queue editing.

pub mod app_context;
pub mod config;
pub mod config_persistence;
pub mod context_menu;
pub mod drag_reorder;
pub mod engine;
pub mod error;
pub mod event_binder;
pub mod protocol;
pub mod queue_controller;
pub mod song_list_item;
