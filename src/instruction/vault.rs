//! Custody-contract instruction builders.
//!
//! Each CPI-invoking instruction (operator buy/sell, claim-fees,
//! create-token) lists the custody contract's own accounts first, then the
//! downstream program's accounts verbatim in that program's native order —
//! the contract forwards them untouched. Positions where the downstream
//! program expects the vault SOL holder to sign are demoted to non-signer
//! here; the contract signs for its PDA via CPI.

use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

use crate::instruction::utils::encode_str;
use crate::instruction::utils::vault::{
    CLAIM_FEES_DISCRIMINATOR, CREATE_TOKEN_DISCRIMINATOR, OPERATOR_BUY_DISCRIMINATOR,
    OPERATOR_SELL_DISCRIMINATOR,
};

/// Addresses identifying one vault under the custody program.
#[derive(Debug, Clone, Copy)]
pub struct VaultKeys {
    pub program_id: Pubkey,
    pub vault_state: Pubkey,
    pub vault_sol_holder: Pubkey,
}

/// Custody account prefix shared by every CPI wrapper, followed by the
/// forwarded downstream list.
fn wrap_accounts(
    keys: &VaultKeys,
    operator: &Pubkey,
    mint: &Pubkey,
    vault_token_account: &Pubkey,
    inner: &Instruction,
) -> Vec<AccountMeta> {
    let mut accounts = Vec::with_capacity(6 + inner.accounts.len());
    accounts.push(AccountMeta::new(keys.vault_state, false));
    accounts.push(AccountMeta::new(keys.vault_sol_holder, false));
    accounts.push(AccountMeta::new(*operator, true));
    accounts.push(AccountMeta::new_readonly(*mint, false));
    accounts.push(AccountMeta::new(*vault_token_account, false));
    accounts.push(AccountMeta::new_readonly(inner.program_id, false));
    accounts.extend(inner.accounts.iter().cloned().map(|mut meta| {
        if meta.pubkey == keys.vault_sol_holder {
            meta.is_signer = false;
        }
        meta
    }));
    accounts
}

/// Operator-routed buy. `sol_amount` funds the trade from the vault;
/// `limit_amount` is the forwarded worst-case bound (max cost for curve
/// buys, max quote in for AMM buys).
pub fn build_operator_buy_instruction(
    keys: &VaultKeys,
    operator: &Pubkey,
    mint: &Pubkey,
    vault_token_account: &Pubkey,
    sol_amount: u64,
    limit_amount: u64,
    inner: &Instruction,
) -> Instruction {
    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&*OPERATOR_BUY_DISCRIMINATOR);
    data[8..16].copy_from_slice(&sol_amount.to_le_bytes());
    data[16..24].copy_from_slice(&limit_amount.to_le_bytes());
    Instruction::new_with_bytes(
        keys.program_id,
        &data,
        wrap_accounts(keys, operator, mint, vault_token_account, inner),
    )
}

/// Operator-routed sell of `token_amount` base units with `limit_amount`
/// as the forwarded minimum receipt.
pub fn build_operator_sell_instruction(
    keys: &VaultKeys,
    operator: &Pubkey,
    mint: &Pubkey,
    vault_token_account: &Pubkey,
    token_amount: u64,
    limit_amount: u64,
    inner: &Instruction,
) -> Instruction {
    let mut data = [0u8; 24];
    data[..8].copy_from_slice(&*OPERATOR_SELL_DISCRIMINATOR);
    data[8..16].copy_from_slice(&token_amount.to_le_bytes());
    data[16..24].copy_from_slice(&limit_amount.to_le_bytes());
    Instruction::new_with_bytes(
        keys.program_id,
        &data,
        wrap_accounts(keys, operator, mint, vault_token_account, inner),
    )
}

/// Operator-routed creator-fee claim; fees land in the vault SOL holder.
pub fn build_claim_fees_instruction(
    keys: &VaultKeys,
    operator: &Pubkey,
    inner: &Instruction,
) -> Instruction {
    let mut accounts = Vec::with_capacity(4 + inner.accounts.len());
    accounts.push(AccountMeta::new(keys.vault_state, false));
    accounts.push(AccountMeta::new(keys.vault_sol_holder, false));
    accounts.push(AccountMeta::new(*operator, true));
    accounts.push(AccountMeta::new_readonly(inner.program_id, false));
    accounts.extend(inner.accounts.iter().cloned().map(|mut meta| {
        if meta.pubkey == keys.vault_sol_holder {
            meta.is_signer = false;
        }
        meta
    }));
    Instruction::new_with_bytes(keys.program_id, &*CLAIM_FEES_DISCRIMINATOR, accounts)
}

/// Operator-routed token creation through the vault. The mint keypair keeps
/// its signer flag; only the vault PDA's is cleared.
pub fn build_create_token_instruction(
    keys: &VaultKeys,
    operator: &Pubkey,
    name: &str,
    symbol: &str,
    uri: &str,
    inner: &Instruction,
) -> Instruction {
    let mut data = Vec::with_capacity(8 + 12 + name.len() + symbol.len() + uri.len() + 32);
    data.extend_from_slice(&*CREATE_TOKEN_DISCRIMINATOR);
    encode_str(&mut data, name);
    encode_str(&mut data, symbol);
    encode_str(&mut data, uri);
    data.extend_from_slice(keys.vault_sol_holder.as_ref());

    let mut accounts = Vec::with_capacity(4 + inner.accounts.len());
    accounts.push(AccountMeta::new(keys.vault_state, false));
    accounts.push(AccountMeta::new(keys.vault_sol_holder, false));
    accounts.push(AccountMeta::new(*operator, true));
    accounts.push(AccountMeta::new_readonly(inner.program_id, false));
    accounts.extend(inner.accounts.iter().cloned().map(|mut meta| {
        if meta.pubkey == keys.vault_sol_holder {
            meta.is_signer = false;
        }
        meta
    }));
    Instruction::new_with_bytes(keys.program_id, &data, accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::accounts::TOKEN_PROGRAM;
    use crate::instruction::dex;

    fn sample_keys() -> VaultKeys {
        VaultKeys {
            program_id: Pubkey::new_unique(),
            vault_state: Pubkey::new_unique(),
            vault_sol_holder: Pubkey::new_unique(),
        }
    }

    #[test]
    fn wrapper_forwards_inner_accounts_verbatim_and_demotes_pda_signer() {
        let keys = sample_keys();
        let operator = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let vault_ata = Pubkey::new_unique();

        // Inner instruction built as if the vault holder were the user.
        let inner = dex::build_buy_instruction(
            &keys.vault_sol_holder,
            &mint,
            &Pubkey::new_unique(),
            &TOKEN_PROGRAM,
            10,
            20,
        )
        .unwrap();

        let wrapped = build_operator_buy_instruction(
            &keys, &operator, &mint, &vault_ata, 1_000, 2_000, &inner,
        );

        assert_eq!(wrapped.program_id, keys.program_id);
        assert_eq!(&wrapped.data[..8], &*OPERATOR_BUY_DISCRIMINATOR);
        assert_eq!(wrapped.accounts.len(), 6 + inner.accounts.len());
        // The forwarded list preserves order and pubkeys.
        for (forwarded, original) in wrapped.accounts[6..].iter().zip(inner.accounts.iter()) {
            assert_eq!(forwarded.pubkey, original.pubkey);
            assert_eq!(forwarded.is_writable, original.is_writable);
        }
        // Only the operator signs.
        let signers: Vec<_> = wrapped.accounts.iter().filter(|a| a.is_signer).collect();
        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].pubkey, operator);
    }

    #[test]
    fn create_token_payload_is_length_prefixed() {
        let keys = sample_keys();
        let inner = Instruction::new_with_bytes(Pubkey::new_unique(), &[0u8; 8], vec![]);
        let ix = build_create_token_instruction(
            &keys,
            &Pubkey::new_unique(),
            "Whistle",
            "WHSTL",
            "https://example.com/meta.json",
            &inner,
        );
        assert_eq!(&ix.data[..8], &*CREATE_TOKEN_DISCRIMINATOR);
        let name_len = u32::from_le_bytes(ix.data[8..12].try_into().unwrap());
        assert_eq!(name_len, 7);
        assert_eq!(&ix.data[12..19], b"Whistle");
    }
}
