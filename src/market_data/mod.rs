pub mod backoff;
pub mod binance;
pub mod feed;
pub mod provider;
pub mod source;

pub use backoff::BackoffPolicy;
pub use binance::BinanceSource;
pub use feed::{FeedEvent, FeedHandle, FeedOptions, FeedSettings, FeedSink};
pub use provider::MarketDataProvider;
pub use source::{CandleQuery, LiveStream, MarketDataSource};
