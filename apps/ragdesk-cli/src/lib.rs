//! Wiring shared by the `ragdesk` and `ragdesk-indexer` binaries: settings,
//! backend selection and component construction.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ragdesk_chat::{
    ContextPipeline, LogNotifier, MemoryConversationStore, OpenAiCompatClient, OutboxNotifier, PipelineOptions,
    SqliteConversationStore,
};
use ragdesk_core::chunking::Chunker;
use ragdesk_core::config::{Config, Settings};
use ragdesk_core::corpus::StrategyMap;
use ragdesk_core::traits::{ConversationStore, EmbeddingGateway, GenerationService, NotificationSink};
use ragdesk_core::types::ChunkStrategy;
use ragdesk_index::{IndexBuilder, Ingestor, LoadReport, MultiIndexRetriever, PairStore};
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber on stderr; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub struct App {
    config: Config,
    settings: Settings,
}

impl App {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::load().context("loading configuration")?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let settings = config.settings()?;
        Ok(Self { config, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn input_dir(&self) -> PathBuf {
        self.config.path(&self.settings.corpus.input_dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.config.path(&self.settings.corpus.index_dir)
    }

    pub fn pair_store(&self) -> PairStore {
        PairStore::new(self.index_dir())
    }

    /// Configured strategies, with `default` replacing the configured fallback.
    pub fn strategies(&self, default: Option<ChunkStrategy>) -> StrategyMap {
        let corpus = &self.settings.corpus;
        StrategyMap::new(default.or(corpus.default_strategy), corpus.strategies.clone())
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(self.settings.chunking)
    }

    pub fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingGateway>> {
        let embedder = ragdesk_embed::get_default_embedder(&self.settings.embedding).context("loading embedder")?;
        Ok(Arc::from(embedder))
    }

    pub fn generator(&self) -> anyhow::Result<Arc<dyn GenerationService>> {
        Ok(Arc::new(OpenAiCompatClient::from_settings(&self.settings.generation)?))
    }

    /// SQLite store at `conversation.db_path`, or an in-memory one.
    pub fn conversation_store(&self, ephemeral: bool) -> anyhow::Result<Arc<dyn ConversationStore>> {
        if ephemeral {
            return Ok(Arc::new(MemoryConversationStore::new()));
        }
        let path = self.config.path(&self.settings.conversation.db_path);
        let store = SqliteConversationStore::open(&path)
            .with_context(|| format!("opening conversation store {}", path.display()))?;
        Ok(Arc::new(store))
    }

    pub fn notifier(&self) -> Arc<dyn NotificationSink> {
        match &self.settings.escalation.outbox_path {
            Some(path) => Arc::new(OutboxNotifier::new(self.config.path(path))),
            None => Arc::new(LogNotifier),
        }
    }

    pub fn ingestor(&self, output: Option<PathBuf>, default: Option<ChunkStrategy>) -> anyhow::Result<Ingestor> {
        let builder = IndexBuilder::new(self.embedder()?)
            .with_batch_size(self.settings.embedding.batch_size)
            .with_progress(true);
        let store = PairStore::new(output.unwrap_or_else(|| self.index_dir()));
        Ok(Ingestor::new(self.chunker(), self.strategies(default), builder, store))
    }

    pub fn pipeline(&self, ephemeral: bool) -> anyhow::Result<(ContextPipeline, LoadReport)> {
        self.pipeline_with(self.generator()?, self.conversation_store(ephemeral)?)
    }

    /// Assembles the pipeline around an explicit generation service and store.
    pub fn pipeline_with(
        &self,
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn ConversationStore>,
    ) -> anyhow::Result<(ContextPipeline, LoadReport)> {
        let (retriever, report) = MultiIndexRetriever::open(self.embedder()?, &self.pair_store())?;
        let pipeline = ContextPipeline::new(
            Arc::new(retriever),
            generator,
            store,
            self.notifier(),
            PipelineOptions::from_settings(&self.settings),
        );
        Ok((pipeline, report))
    }
}
