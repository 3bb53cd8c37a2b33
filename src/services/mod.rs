pub mod binance;
pub mod clock;
pub mod market_data;
pub mod presenter;
pub mod result_store;
pub mod scanner;
