use async_trait::async_trait;

use crate::errors::ScanError;
use crate::models::candle::Candle;
use crate::models::timeframe::Timeframe;

/// Source of symbols and candles consumed by the scanner.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Symbols quoted in the settlement asset that are currently trading, in exchange order.
    async fn list_tradable_symbols(&self) -> Result<Vec<String>, ScanError>;

    /// Most recent `limit` candles, oldest first.
    async fn get_recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ScanError>;
}
