pub mod accounts;
pub mod trade;

pub use accounts::*;
