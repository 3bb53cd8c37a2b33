use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::models::match_result::{SortColumn, SortSpec};
use crate::services::scanner::ScanStatus;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanStatusResponse {
    /// Whether this call changed the scanner state
    pub changed: bool,
    pub status: ScanStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NotificationRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SortRequest {
    /// One of: symbol, price, timeframe, volume, trend, targets, stop_loss, detected_at.
    /// Repeating the current column flips the direction.
    #[validate(custom(function = "validate_sort_column"))]
    #[schema(example = "price")]
    pub column: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SortResponse {
    pub sort: SortSpec,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct ResultPath {
    #[validate(length(min = 1, max = 32))]
    #[param(example = "BTCUSDT")]
    pub symbol: String,
    /// Kline interval, e.g. 1m, 4h, 1M
    #[param(example = "4h")]
    pub timeframe: String,
}

pub fn validate_sort_column(value: &str) -> Result<(), ValidationError> {
    if value.parse::<SortColumn>().is_ok() {
        return Ok(());
    }

    let mut error = ValidationError::new("unsupported_sort_column");
    let columns: Vec<&str> = SortColumn::ALL.iter().map(|c| c.as_str()).collect();
    error.message = Some(format!("column must be one of: {}", columns.join(", ")).into());
    Err(error)
}
