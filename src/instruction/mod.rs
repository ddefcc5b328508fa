pub mod amm;
pub mod dex;
pub mod utils;
pub mod vault;
