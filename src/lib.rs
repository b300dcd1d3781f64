pub mod commands;
pub mod config;
pub mod conversation;
pub mod db;
pub mod learn_box;
pub mod llm;
pub mod media;
pub mod mind_map;
pub mod orchestrator;
pub mod scribbles;
mod shell;
pub mod store;
pub mod task_track;

use commands::AppError;
use config::AppConfig;
use conversation::ConversationManager;
use db::{Database, KeyValueStore};
use learn_box::LearnBox;
use llm::gemini::GeminiClient;
use llm::Generator;
use orchestrator::TurnTracker;
use scribbles::Scribbles;
use std::path::Path;
use std::sync::Arc;
use task_track::TaskTrack;
use tracing_subscriber::EnvFilter;

/// Everything the commands operate on, shared for the life of the process.
pub struct AppState {
    pub db: Arc<Database>,
    pub conversations: ConversationManager,
    pub learn_box: LearnBox,
    pub task_track: TaskTrack,
    pub scribbles: Scribbles,
    pub turns: TurnTracker,
    generator: Option<Arc<dyn Generator>>,
}

impl AppState {
    pub fn open(app_dir: &Path) -> Result<Self, AppError> {
        Self::from_database(Arc::new(Database::open(app_dir)?))
    }

    pub fn in_memory() -> Result<Self, AppError> {
        Self::from_database(Arc::new(Database::open_in_memory()?))
    }

    pub fn from_database(db: Arc<Database>) -> Result<Self, AppError> {
        let backend: Arc<dyn KeyValueStore> = db.clone();
        Ok(Self {
            conversations: ConversationManager::open(backend.clone())?,
            learn_box: LearnBox::open(backend.clone()),
            task_track: TaskTrack::open(backend.clone()),
            scribbles: Scribbles::open(backend),
            turns: TurnTracker::new(),
            db,
            generator: None,
        })
    }

    /// Pins the AI backend instead of building a Gemini client from settings.
    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn generator(&self, config: &AppConfig) -> Arc<dyn Generator> {
        match &self.generator {
            Some(generator) => Arc::clone(generator),
            None => Arc::new(GeminiClient::new(config.gemini.clone())),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<(), AppError> {
    init_tracing();

    let app_dir = config::data_dir();
    let state = AppState::open(&app_dir)?;
    tracing::info!(dir = %app_dir.display(), "opened study-pal data directory");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(shell::run(&state))
}
