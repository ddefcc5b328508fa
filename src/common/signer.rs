//! Operator keypair bootstrap.
//!
//! The operator is the single process-wide key authorized by many vaults to
//! submit trades on their behalf. It pays network fees and rent for new
//! token accounts; trade funds always come from the vault PDA itself.

use anyhow::{Context, anyhow};
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use tracing::warn;

use crate::common::AnyResult;

/// Loads the operator from `OPERATOR_SECRET`, accepting either a base58
/// string or a JSON byte array (the two formats wallets export).
///
/// When the variable is absent a fresh keypair is generated and its public
/// key plus encoded secret are logged with funding instructions. The
/// generated key is valid but unfunded; vault-routed trades will fail until
/// it holds SOL and the custody contract has it delegated.
pub fn load_operator() -> AnyResult<Keypair> {
    match std::env::var("OPERATOR_SECRET") {
        Ok(raw) if !raw.trim().is_empty() => parse_operator_secret(raw.trim()),
        _ => {
            let keypair = Keypair::new();
            warn!(
                operator = %keypair.pubkey(),
                "OPERATOR_SECRET not set; generated a fresh operator keypair. \
                 Fund this address and export OPERATOR_SECRET={} to keep it across restarts",
                keypair.to_base58_string()
            );
            Ok(keypair)
        }
    }
}

/// Decodes an operator secret without touching the environment.
pub fn parse_operator_secret(raw: &str) -> AnyResult<Keypair> {
    let bytes: Vec<u8> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("OPERATOR_SECRET is not a valid JSON byte array")?
    } else {
        bs58::decode(raw).into_vec().context("OPERATOR_SECRET is not valid base58")?
    };
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| anyhow!("OPERATOR_SECRET does not decode to a 64-byte keypair: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base58_secret() {
        let keypair = Keypair::new();
        let parsed = parse_operator_secret(&keypair.to_base58_string()).unwrap();
        assert_eq!(parsed.pubkey(), keypair.pubkey());
    }

    #[test]
    fn parses_json_array_secret() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();
        let parsed = parse_operator_secret(&json).unwrap();
        assert_eq!(parsed.pubkey(), keypair.pubkey());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_operator_secret("not-a-key").is_err());
        assert!(parse_operator_secret("[1,2,3]").is_err());
    }
}
