use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::business_logic::reversal::ReversalSignal;
use crate::models::timeframe::Timeframe;

/// A detected reversal for one (symbol, timeframe) pair. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchResult {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Close of the breakout candle
    pub price: f64,
    /// Volume of the breakout candle
    pub volume: f64,
    pub trend_label: String,
    /// Take-profit levels, 8 decimal places
    #[schema(value_type = Vec<String>)]
    pub targets: [String; 3],
    /// Stop-loss level, 8 decimal places
    pub stop_loss: String,
    pub detected_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn new(
        symbol: &str,
        timeframe: Timeframe,
        signal: ReversalSignal,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            price: signal.price,
            volume: signal.volume,
            trend_label: signal.trend_label.to_string(),
            targets: signal.targets,
            stop_loss: signal.stop_loss,
            detected_at,
        }
    }

    /// Store key, `SYMBOL-timeframe`.
    pub fn key(&self) -> String {
        result_key(&self.symbol, self.timeframe)
    }

    pub fn targets_label(&self) -> String {
        self.targets.join(" | ")
    }

    fn detected_at_label(&self) -> String {
        self.detected_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Ascending comparison on a single column. Price and volume compare numerically,
    /// everything else by its displayed text.
    pub fn compare_by(&self, other: &Self, column: SortColumn) -> Ordering {
        match column {
            SortColumn::Price => self.price.total_cmp(&other.price),
            SortColumn::Volume => self.volume.total_cmp(&other.volume),
            SortColumn::Symbol => self.symbol.cmp(&other.symbol),
            SortColumn::Timeframe => self.timeframe.as_str().cmp(other.timeframe.as_str()),
            SortColumn::Trend => self.trend_label.cmp(&other.trend_label),
            SortColumn::Targets => self.targets_label().cmp(&other.targets_label()),
            SortColumn::StopLoss => self.stop_loss.cmp(&other.stop_loss),
            SortColumn::DetectedAt => self.detected_at_label().cmp(&other.detected_at_label()),
        }
    }
}

pub fn result_key(symbol: &str, timeframe: Timeframe) -> String {
    format!("{}-{}", symbol, timeframe)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Symbol,
    Price,
    Timeframe,
    Volume,
    Trend,
    Targets,
    StopLoss,
    DetectedAt,
}

impl SortColumn {
    pub const ALL: [SortColumn; 8] = [
        SortColumn::Symbol,
        SortColumn::Price,
        SortColumn::Timeframe,
        SortColumn::Volume,
        SortColumn::Trend,
        SortColumn::Targets,
        SortColumn::StopLoss,
        SortColumn::DetectedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Symbol => "symbol",
            SortColumn::Price => "price",
            SortColumn::Timeframe => "timeframe",
            SortColumn::Volume => "volume",
            SortColumn::Trend => "trend",
            SortColumn::Targets => "targets",
            SortColumn::StopLoss => "stop_loss",
            SortColumn::DetectedAt => "detected_at",
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SortColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == value)
            .ok_or_else(|| format!("unsupported sort column: {}", value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Same column flips direction; a different column starts ascending.
    pub fn request(self, column: SortColumn) -> Self {
        if self.column == column {
            Self {
                column,
                direction: self.direction.toggled(),
            }
        } else {
            Self {
                column,
                direction: SortDirection::Asc,
            }
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::DetectedAt,
            direction: SortDirection::Desc,
        }
    }
}

/// Sorted, read-only view of the result store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultsSnapshot {
    pub as_of_ms: u64,
    pub sort: SortSpec,
    pub results: Vec<MatchResult>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchAlert {
    pub result: MatchResult,
    /// Whether clients should play the notification sound
    pub audible: bool,
}

/// Events fanned out to stream subscribers.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Snapshot(ResultsSnapshot),
    Match(MatchAlert),
}
