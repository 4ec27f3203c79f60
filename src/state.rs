use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::review::ReviewSession;
use crate::services::ai::{AiClient, AiConfig};
use crate::services::transcript::TranscriptFetcher;
use crate::store::Store;

/// Shared handles for the whole app. Cheap to clone; every request handler
/// gets one via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Arc<Store>,
    ai: Arc<RwLock<AiClient>>,
    transcripts: Arc<TranscriptFetcher>,
    relay: reqwest::Client,
    review: Arc<Mutex<Option<ReviewSession>>>,
    rng: Arc<Mutex<StdRng>>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        let ai = AiClient::new(AiConfig::resolve(store.api_key(), store.base_url()));
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store: Arc::new(store),
            ai: Arc::new(RwLock::new(ai)),
            transcripts: Arc::new(TranscriptFetcher::new()),
            relay: reqwest::Client::new(),
            review: Arc::new(Mutex::new(None)),
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    pub fn with_transcripts(mut self, fetcher: TranscriptFetcher) -> Self {
        self.transcripts = Arc::new(fetcher);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Snapshot of the currently configured AI client. Cloned out so the
    /// lock is never held across an await point.
    pub fn ai_client(&self) -> AiClient {
        self.ai.read().clone()
    }

    /// Rebuilds the AI client from stored credentials. Call after the
    /// settings change so in-flight requests keep their old client.
    pub fn reload_ai_client(&self) {
        let config = AiConfig::resolve(self.store.api_key(), self.store.base_url());
        *self.ai.write() = AiClient::new(config);
    }

    pub fn transcripts(&self) -> Arc<TranscriptFetcher> {
        Arc::clone(&self.transcripts)
    }

    /// Outbound client for the credential relay. Separate from the AI
    /// client because the relay talks to whatever endpoint the caller names.
    pub fn relay(&self) -> reqwest::Client {
        self.relay.clone()
    }

    pub fn review(&self) -> Arc<Mutex<Option<ReviewSession>>> {
        Arc::clone(&self.review)
    }

    pub fn rng(&self) -> Arc<Mutex<StdRng>> {
        Arc::clone(&self.rng)
    }
}
