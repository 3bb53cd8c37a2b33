use std::fmt;

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// One closed (or in-progress) kline as delivered by the exchange, oldest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Candle open time (epoch ms)
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Positional kline row: `[openTime, "open", "high", "low", "close", "volume", ...]`.
///
/// Fields after volume (close time, quote volume, trade count, ...) are skipped, so
/// rows of any length from six fields up decode.
#[derive(Debug, Clone, Copy)]
pub struct KlineRow(Candle);

impl From<KlineRow> for Candle {
    fn from(row: KlineRow) -> Self {
        row.0
    }
}

/// Price or volume field; decimal strings on the wire, plain numbers accepted too.
#[derive(Deserialize)]
struct Decimal(#[serde(deserialize_with = "deserialize_string_to_f64")] f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(f64),
}

fn deserialize_string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Text(s) => s.trim().parse::<f64>().map_err(de::Error::custom)?,
        StringOrNumber::Number(n) => n,
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom(format!("non-finite value: {}", value)))
    }
}

impl<'de> Deserialize<'de> for KlineRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(KlineRowVisitor)
    }
}

struct KlineRowVisitor;

impl<'de> Visitor<'de> for KlineRowVisitor {
    type Value = KlineRow;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a kline row with at least 6 fields")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<KlineRow, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let open_time: i64 = seq
            .next_element()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;

        let mut fields = [0.0; 5];
        for (i, field) in fields.iter_mut().enumerate() {
            let Decimal(value) = seq
                .next_element()?
                .ok_or_else(|| <A::Error as de::Error>::invalid_length(i + 1, &self))?;
            *field = value;
        }

        while seq.next_element::<IgnoredAny>()?.is_some() {}

        let [open, high, low, close, volume] = fields;
        Ok(KlineRow(Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }))
    }
}
