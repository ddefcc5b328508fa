//! Persistent multi-tenant market-making engine for tokens on a
//! bonding-curve DEX and its post-graduation AMM.
//!
//! One worker per registered token runs an alternating buy/sell cycle
//! forever, pausing itself when funds run out and resuming the moment they
//! reappear. Trades route either directly (a local keypair owns the token
//! account) or through a custody vault PDA whose trading authority is
//! delegated to a shared operator key. The [`engine::BotManager`] resumes
//! workers from the durable store at boot and discovers new tokens in the
//! background.

pub mod common;
pub mod constants;
pub mod engine;
pub mod instruction;
pub mod store;
pub mod trading;
pub mod utils;

pub use common::{AnyResult, EngineConfig, RpcFacade};
pub use engine::{BotManager, EngineStats, LogEvent, LogLevel};
pub use store::Database;
pub use trading::{
    CustodyExecutor, DirectExecutor, TradeError, TradeExecutor, TradeOutcome, TradeRequest,
    TradeSide, Venue,
};
