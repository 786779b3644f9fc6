use std::sync::Arc;

use log::{info, warn};
use songdeck::{
    app_context::SyncContext,
    config::Config,
    config_persistence::{default_config_path, load_config_file},
    context_menu::MenuAction,
    drag_reorder::{DragReorderController, DragSource},
    engine::{memory::MemoryEngine, EngineHost},
    protocol::MediaItem,
    song_list_item::{SongListItem, SongListItemOptions},
};

const SAMPLE_CATALOG: &str = r#"{ "data": [
    { "id": "1001", "attributes": { "name": "Opening", "artistName": "Field Notes",
      "albumName": "Tide Tables", "durationInMillis": 184000,
      "playParams": { "isLibrary": true } } },
    { "id": "1002", "attributes": { "name": "Low Water", "artistName": "Field Notes",
      "albumName": "Tide Tables", "durationInMillis": 241000, "contentRating": "explicit" } },
    { "id": "1003", "attributes": { "name": "Slack Tide", "artistName": "Field Notes",
      "albumName": "Tide Tables", "durationInMillis": 3725000 } }
] }"#;

fn load_songs() -> Result<Vec<MediaItem>, Box<dyn std::error::Error>> {
    let text = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading catalog from {}", path);
            std::fs::read_to_string(path)?
        }
        None => SAMPLE_CATALOG.to_string(),
    };
    Ok(MediaItem::list_from_catalog_json(&text)?)
}

fn log_queue(context: &SyncContext) {
    if let Some(engine) = context.engine() {
        let snapshot = engine.queue_snapshot();
        info!(
            "queue={:?} position={:?} playing={}",
            snapshot.ids(),
            snapshot.position,
            engine.is_playing()
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match default_config_path() {
        Some(path) => load_config_file(&path),
        None => Config::default(),
    };

    let mut clog = colog::default_builder();
    clog.filter(None, config.logging.level.to_level_filter());
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let songs = Arc::new(load_songs()?);
    if songs.is_empty() {
        warn!("Catalog is empty. Nothing to show");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let host = EngineHost::new();
    host.initialize(Arc::new(MemoryEngine::new()))?;
    let context = SyncContext::new(&host, config.clone());
    let mut notices = context.subscribe_notices();

    let options = SongListItemOptions {
        show_artist: config.ui.show_artist,
        show_album: config.ui.show_album,
    };

    runtime.block_on(async {
        let drag = context
            .queue()
            .map(|queue| DragReorderController::new(queue.clone()));
        let mut rows: Vec<SongListItem> = (0..songs.len())
            .filter_map(|index| SongListItem::new(&context, songs.clone(), index, options))
            .map(|row| match &drag {
                Some(drag) => row.with_drag(drag.clone(), DragSource::Queue),
                None => row,
            })
            .collect();
        for row in rows.iter_mut() {
            row.mount();
        }

        rows[0].click().await;
        log_queue(&context);

        let last = rows.len() - 1;
        rows[last].begin_drag();
        rows[0].drag_enter();
        let outcome = rows[0].drop_here().await;
        info!("drop outcome: {:?}", outcome);
        log_queue(&context);

        rows[last].select_menu_action(MenuAction::PlayNext).await;
        log_queue(&context);

        rows[0].click().await;
        for row in &rows {
            let view = row.row();
            info!(
                "{} {} [{}]{}",
                if view.playing { ">" } else { " " },
                view.title,
                view.duration,
                view.subtitle
                    .map(|subtitle| format!(" {}", subtitle))
                    .unwrap_or_default()
            );
        }

        for row in rows.iter_mut() {
            row.unmount();
        }
    });

    while let Ok(notice) = notices.try_recv() {
        warn!("notice: {}", notice.message);
    }

    host.teardown();
    Ok(())
}
