pub mod bonding_curve;
pub mod rpc;
pub mod signer;
pub mod types;

pub use rpc::RpcFacade;
pub use types::{AnyResult, EngineConfig, SolanaRpcClient};
