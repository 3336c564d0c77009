pub mod achievements;
pub mod calculator;
pub mod models;
pub mod progress;
pub mod router;
pub mod session;
