pub mod health;
pub mod results;
pub mod scan;
