//! SQL for the three tables. Every function takes the pool so callers can
//! share one [`super::Database`] across tasks.

use deadpool_postgres::Pool;
use tokio_postgres::Row;

use super::models::{BotLogRecord, BotRecord, BotStatus, VaultRecord};
use super::StoreError;
use crate::constants::trade::LOG_RETENTION_PER_MINT;

fn row_to_bot(row: &Row) -> BotRecord {
    BotRecord {
        token_mint: row.get("token_mint"),
        vault_state_address: row.get("vault_state_address"),
        owner: row.get("owner"),
        strategy_name: row.get("strategy_name"),
        strategy_config: row.get("strategy_config"),
        total_trades: row.get("total_trades"),
        total_volume_sol: row.get("total_volume_sol"),
        last_trade_time: row.get("last_trade_time"),
        status: BotStatus::from_str(row.get("status")),
    }
}

fn row_to_vault(row: &Row) -> VaultRecord {
    VaultRecord {
        vault_state_address: row.get("vault_state_address"),
        owner: row.get("owner"),
        nonce: row.get("nonce"),
        lock_until: row.get("lock_until"),
        strategy_id: row.get("strategy_id"),
        token_mint: row.get("token_mint"),
        is_creator: row.get("is_creator"),
    }
}

const BOT_COLUMNS: &str = "token_mint, vault_state_address, owner, strategy_name, \
                           strategy_config, total_trades, total_volume_sol, last_trade_time, status";

pub async fn get_bot(pool: &Pool, token_mint: &str) -> Result<Option<BotRecord>, StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let rows = client
        .query(
            format!("SELECT {BOT_COLUMNS} FROM bots WHERE token_mint = $1").as_str(),
            &[&token_mint],
        )
        .await?;
    Ok(rows.first().map(row_to_bot))
}

pub async fn get_bots_by_status(
    pool: &Pool,
    status: BotStatus,
) -> Result<Vec<BotRecord>, StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let rows = client
        .query(
            format!("SELECT {BOT_COLUMNS} FROM bots WHERE status = $1 ORDER BY token_mint")
                .as_str(),
            &[&status.as_str()],
        )
        .await?;
    Ok(rows.iter().map(row_to_bot).collect())
}

pub async fn get_all_bots(pool: &Pool) -> Result<Vec<BotRecord>, StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let rows = client
        .query(format!("SELECT {BOT_COLUMNS} FROM bots ORDER BY token_mint").as_str(), &[])
        .await?;
    Ok(rows.iter().map(row_to_bot).collect())
}

pub async fn upsert_bot(pool: &Pool, bot: &BotRecord) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    client
        .execute(
            r#"
            INSERT INTO bots (
                token_mint, vault_state_address, owner, strategy_name,
                strategy_config, total_trades, total_volume_sol, last_trade_time, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (token_mint) DO UPDATE SET
                vault_state_address = EXCLUDED.vault_state_address,
                owner = EXCLUDED.owner,
                strategy_name = EXCLUDED.strategy_name,
                strategy_config = EXCLUDED.strategy_config,
                status = EXCLUDED.status
            "#,
            &[
                &bot.token_mint,
                &bot.vault_state_address,
                &bot.owner,
                &bot.strategy_name,
                &bot.strategy_config,
                &bot.total_trades,
                &bot.total_volume_sol,
                &bot.last_trade_time,
                &bot.status.as_str(),
            ],
        )
        .await?;
    Ok(())
}

/// Persists the per-worker counters after a confirmed trade.
pub async fn update_bot_stats(
    pool: &Pool,
    token_mint: &str,
    total_trades: i64,
    total_volume_sol: f64,
    last_trade_time: chrono::DateTime<chrono::Utc>,
) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let updated = client
        .execute(
            r#"
            UPDATE bots
            SET total_trades = $2, total_volume_sol = $3, last_trade_time = $4
            WHERE token_mint = $1
            "#,
            &[&token_mint, &total_trades, &total_volume_sol, &last_trade_time],
        )
        .await?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("bot {token_mint}")));
    }
    Ok(())
}

pub async fn update_bot_strategy(
    pool: &Pool,
    token_mint: &str,
    strategy_name: &str,
    strategy_config: &str,
) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let updated = client
        .execute(
            "UPDATE bots SET strategy_name = $2, strategy_config = $3 WHERE token_mint = $1",
            &[&token_mint, &strategy_name, &strategy_config],
        )
        .await?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("bot {token_mint}")));
    }
    Ok(())
}

pub async fn set_bot_status(
    pool: &Pool,
    token_mint: &str,
    status: BotStatus,
) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    client
        .execute("UPDATE bots SET status = $2 WHERE token_mint = $1", &[&token_mint, &status.as_str()])
        .await?;
    Ok(())
}

pub async fn upsert_vault(pool: &Pool, vault: &VaultRecord) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    client
        .execute(
            r#"
            INSERT INTO vaults (
                vault_state_address, owner, nonce, lock_until, strategy_id, token_mint, is_creator
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (vault_state_address) DO UPDATE SET
                lock_until = EXCLUDED.lock_until,
                strategy_id = EXCLUDED.strategy_id,
                token_mint = EXCLUDED.token_mint,
                is_creator = EXCLUDED.is_creator
            "#,
            &[
                &vault.vault_state_address,
                &vault.owner,
                &vault.nonce,
                &vault.lock_until,
                &vault.strategy_id,
                &vault.token_mint,
                &vault.is_creator,
            ],
        )
        .await?;
    Ok(())
}

/// Vaults that hold a token but have no bot row yet: the backfill set.
pub async fn vaults_without_bot(pool: &Pool) -> Result<Vec<VaultRecord>, StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let rows = client
        .query(
            r#"
            SELECT v.vault_state_address, v.owner, v.nonce, v.lock_until,
                   v.strategy_id, v.token_mint, v.is_creator
            FROM vaults v
            LEFT JOIN bots b ON b.token_mint = v.token_mint
            WHERE v.token_mint IS NOT NULL AND b.token_mint IS NULL
            "#,
            &[],
        )
        .await?;
    Ok(rows.iter().map(row_to_vault).collect())
}

/// Appends a log row and prunes everything past the retention window for
/// that mint in the same round trip.
pub async fn insert_log(
    pool: &Pool,
    bot_id: &str,
    token_mint: &str,
    message: &str,
    level: &str,
) -> Result<(), StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    client
        .execute(
            "INSERT INTO bot_logs (bot_id, token_mint, message, level) VALUES ($1, $2, $3, $4)",
            &[&bot_id, &token_mint, &message, &level],
        )
        .await?;
    client
        .execute(
            r#"
            DELETE FROM bot_logs
            WHERE token_mint = $1
              AND id NOT IN (
                  SELECT id FROM bot_logs
                  WHERE token_mint = $1
                  ORDER BY timestamp DESC, id DESC
                  LIMIT $2
              )
            "#,
            &[&token_mint, &LOG_RETENTION_PER_MINT],
        )
        .await?;
    Ok(())
}

pub async fn recent_logs(
    pool: &Pool,
    token_mint: &str,
    limit: i64,
) -> Result<Vec<BotLogRecord>, StoreError> {
    let client = pool.get().await.map_err(|e| StoreError::Connection(e.to_string()))?;
    let rows = client
        .query(
            r#"
            SELECT id, bot_id, token_mint, message, level, timestamp
            FROM bot_logs
            WHERE token_mint = $1
            ORDER BY timestamp DESC, id DESC
            LIMIT $2
            "#,
            &[&token_mint, &limit],
        )
        .await?;
    Ok(rows
        .iter()
        .map(|row| BotLogRecord {
            id: row.get("id"),
            bot_id: row.get("bot_id"),
            token_mint: row.get("token_mint"),
            message: row.get("message"),
            level: row.get("level"),
            timestamp: row.get("timestamp"),
        })
        .collect())
}
