pub mod config;
pub mod reversal;
