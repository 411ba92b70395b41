//! Application state wiring all services together.
//!
//! AppState pins the core's generic ports to the concrete infra adapters:
//! SQLite repositories, the local speech file store or the remote pending
//! table, and the service resolver built from `config.toml`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chorus_core::service::{ServiceRegistry, ServiceResolver};
use chorus_core::speech::{PendingSpeechTable, SpeechOutput};
use chorus_infra::config::load_global_config;
use chorus_infra::speech::{LocalSpeechFileStore, PassthroughConverter, Sha256ContentHasher};
use chorus_infra::sqlite::{
    DatabasePool, SqliteChatMessageRepository, SqliteChatRepository, database_url,
};
use chorus_types::config::{GlobalConfig, SpeechStrategy};
use tokio_util::sync::CancellationToken;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GlobalConfig>,
    pub resolver: Arc<ServiceResolver>,
    pub chats: Arc<SqliteChatRepository>,
    pub messages: Arc<SqliteChatMessageRepository>,
    pub speech_output: SpeechOutput,
    /// Present with the local speech strategy.
    pub local_speech: Option<Arc<LocalSpeechFileStore>>,
    pub pending_speech: Arc<PendingSpeechTable>,
    pub converter: Arc<PassthroughConverter>,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Load configuration from `data_dir`, open the database, and build the
    /// speech output.
    pub async fn init(
        data_dir: PathBuf,
        registry: ServiceRegistry,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let config = load_global_config(&data_dir).await;
        let pool = DatabasePool::new(&database_url(&data_dir)).await?;
        Self::from_parts(config, registry, pool, data_dir, shutdown).await
    }

    pub async fn from_parts(
        config: GlobalConfig,
        registry: ServiceRegistry,
        pool: DatabasePool,
        data_dir: PathBuf,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let pending_speech = Arc::new(PendingSpeechTable::new());
        let converter = Arc::new(PassthroughConverter);
        let public_base_url = config.server.public_base_url.clone();

        let (speech_output, local_speech) = match config.speech.strategy {
            SpeechStrategy::Local => {
                let store = Arc::new(
                    LocalSpeechFileStore::open(
                        data_dir.join("speech"),
                        &public_base_url,
                        Duration::from_secs(config.speech.deletion_delay_secs),
                        shutdown.clone(),
                    )
                    .await?,
                );
                let output = SpeechOutput::Local {
                    store: store.clone(),
                    converter: converter.clone(),
                    hasher: Arc::new(Sha256ContentHasher::new()),
                };
                (output, Some(store))
            }
            SpeechStrategy::Remote => {
                let output = SpeechOutput::Remote {
                    table: Arc::clone(&pending_speech),
                    base_url: public_base_url,
                };
                (output, None)
            }
        };

        let resolver = ServiceResolver::new(Arc::new(registry), config.services.clone());
        tracing::info!(
            strategy = ?config.speech.strategy,
            characters = config.characters.len(),
            services = config.services.len(),
            "application state ready"
        );

        Ok(Self {
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            chats: Arc::new(SqliteChatRepository::new(pool.clone())),
            messages: Arc::new(SqliteChatMessageRepository::new(pool)),
            speech_output,
            local_speech,
            pending_speech,
            converter,
            shutdown,
        })
    }
}
