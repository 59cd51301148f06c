// =============================================================================
// Application State — shared by every API handler
// =============================================================================

use std::sync::Arc;

use crate::error::EngineResult;
use crate::market_data::{BinanceSource, MarketDataProvider, MarketDataSource};
use crate::orchestrator::StreamOrchestrator;
use crate::runtime_config::EngineConfig;

pub struct AppState {
    pub config: EngineConfig,
    pub provider: MarketDataProvider,
    pub orchestrator: StreamOrchestrator,
    /// Process start, epoch milliseconds.
    pub started_at: i64,
}

impl AppState {
    /// Wire the engine over an arbitrary source.
    pub fn with_source(config: EngineConfig, source: Arc<dyn MarketDataSource>) -> Arc<Self> {
        let provider = MarketDataProvider::new(source, config.clone());
        let orchestrator = StreamOrchestrator::new(provider.clone());
        Arc::new(Self {
            config,
            provider,
            orchestrator,
            started_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Wire the engine over Binance using the configured endpoints.
    pub fn binance(config: EngineConfig) -> EngineResult<Arc<Self>> {
        let source = Arc::new(BinanceSource::from_config(&config)?);
        Ok(Self::with_source(config, source))
    }
}
