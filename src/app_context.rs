use tokio::sync::broadcast;

use crate::{
    config::Config,
    engine::{EngineHandle, EngineHost},
    protocol::Notice,
    queue_controller::QueueController,
};

/// Handles shared by every component of the UI.
#[derive(Clone)]
pub struct SyncContext {
    pub(crate) engine: Option<EngineHandle>,
    pub(crate) queue: Option<QueueController>,
    pub(crate) notices: broadcast::Sender<Notice>,
    pub(crate) config: Config,
}

impl SyncContext {
    /// Builds the context from the host's current engine, if any.
    pub fn new(host: &EngineHost, config: Config) -> Self {
        let engine = host.handle();
        let queue = engine
            .clone()
            .map(|engine| QueueController::new(engine, &config.engine));
        let (notices, _) = broadcast::channel(config.ui.notice_capacity.max(1));
        Self {
            engine,
            queue,
            notices,
            config,
        }
    }

    pub fn engine(&self) -> Option<&EngineHandle> {
        self.engine.as_ref()
    }

    pub fn queue(&self) -> Option<&QueueController> {
        self.queue.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
