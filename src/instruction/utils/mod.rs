pub mod amm;
pub mod dex;
pub mod vault;

use sha2::{Digest, Sha256};

/// First 8 bytes of `sha256("global:<name>")`, the Anchor instruction
/// discriminator convention.
pub fn anchor_instruction_discriminator(name: &str) -> [u8; 8] {
    anchor_discriminator("global", name)
}

/// First 8 bytes of `sha256("account:<name>")`, the Anchor account
/// discriminator convention.
pub fn anchor_account_discriminator(name: &str) -> [u8; 8] {
    anchor_discriminator("account", name)
}

/// u32-le length prefix followed by UTF-8 bytes, no terminator.
pub fn encode_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

fn anchor_discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_discriminators_match_published_constants() {
        // "buy" and "sell" hash to the same constants on every Anchor
        // program that names them so; these are the on-chain values.
        assert_eq!(anchor_instruction_discriminator("buy"), super::dex::BUY_DISCRIMINATOR);
        assert_eq!(anchor_instruction_discriminator("sell"), super::dex::SELL_DISCRIMINATOR);
    }

    #[test]
    fn discriminators_are_stable_and_distinct() {
        assert_eq!(
            anchor_instruction_discriminator("operator_buy"),
            anchor_instruction_discriminator("operator_buy"),
        );
        assert_ne!(
            anchor_instruction_discriminator("operator_buy"),
            anchor_instruction_discriminator("operator_sell"),
        );
        assert_ne!(
            anchor_account_discriminator("VaultState"),
            anchor_instruction_discriminator("VaultState"),
        );
    }
}
