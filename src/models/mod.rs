pub mod api;
pub mod candle;
pub mod match_result;
pub mod timeframe;
