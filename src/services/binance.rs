use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::business_logic::config::ScannerConfig;
use crate::errors::ScanError;
use crate::models::candle::{Candle, KlineRow};
use crate::models::timeframe::Timeframe;
use crate::services::market_data::MarketDataSource;

const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
const KLINES_PATH: &str = "/api/v3/klines";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
    #[serde(rename = "quoteAsset")]
    quote_asset: String,
}

/// Spot REST client for symbol listings and klines.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    quote_asset: String,
}

impl BinanceClient {
    pub fn new(config: &ScannerConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .context("BINANCE_API_KEY is not a valid header value")?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            quote_asset: config.quote_asset.clone(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response, ScanError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status(status.as_u16()));
        }

        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScanError> {
        Ok(self.get(path, query).await?.json::<T>().await?)
    }
}

#[async_trait]
impl MarketDataSource for BinanceClient {
    async fn list_tradable_symbols(&self) -> Result<Vec<String>, ScanError> {
        let info: ExchangeInfo = self.get_json(EXCHANGE_INFO_PATH, &[]).await?;
        Ok(tradable_symbols(info, &self.quote_asset))
    }

    async fn get_recent_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ScanError> {
        let body = self
            .get(
                KLINES_PATH,
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?
            .bytes()
            .await?;

        parse_klines(&body)
    }
}

fn tradable_symbols(info: ExchangeInfo, quote_asset: &str) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.quote_asset == quote_asset && s.status == "TRADING")
        .map(|s| s.symbol)
        .collect()
}

/// One bad row fails the whole batch.
fn parse_klines(body: &[u8]) -> Result<Vec<Candle>, ScanError> {
    let rows: Vec<KlineRow> = serde_json::from_slice(body)
        .map_err(|e| ScanError::MalformedCandle(e.to_string()))?;
    Ok(rows.into_iter().map(Candle::from).collect())
}
