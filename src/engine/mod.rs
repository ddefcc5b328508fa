pub mod events;
pub mod manager;
pub mod worker;

pub use events::{LogEvent, LogLevel};
pub use manager::{BotManager, EngineStats};
pub use worker::{StrategySettings, WorkerShared, next_side};
