//! Token: a bearer credential row, optionally scoped to one Space, carrying
//! a per-resource permission bitmask. JWT minting/verification lives in
//! `vdb-security`; this module owns only the catalog row.

use std::collections::HashMap;

use rusqlite::{params, Connection, Transaction};
use vdb_core::{now_utc, Error, InternalId, Result};

/// A catalog Token row.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRow {
    pub id: InternalId,
    pub token: String,
    pub space_id: Option<InternalId>,
    pub perms: HashMap<String, i32>,
    pub expire_utc: i64,
}

fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<TokenRow> {
    let perms_json: String = row.get(3)?;
    let perms: HashMap<String, i32> = serde_json::from_str(&perms_json).unwrap_or_default();
    Ok(TokenRow {
        id: row.get(0)?,
        token: row.get(1)?,
        space_id: row.get(2)?,
        perms,
        expire_utc: row.get(4)?,
    })
}

const SELECT_COLS: &str = "id, token, space_id, perms, expire_utc";

/// Insert a Token row. `token` must be globally unique (the signed JWT
/// string itself, per `vdb-security`'s minting contract).
pub fn create(
    tx: &Transaction,
    token: &str,
    space_id: Option<InternalId>,
    perms: &HashMap<String, i32>,
    expire_utc: i64,
) -> Result<TokenRow> {
    let perms_json = serde_json::to_string(perms)?;
    tx.execute(
        "INSERT INTO tokens (token, space_id, perms, expire_utc) VALUES (?1, ?2, ?3, ?4)",
        params![token, space_id, perms_json, expire_utc],
    )?;
    Ok(TokenRow {
        id: tx.last_insert_rowid(),
        token: token.to_string(),
        space_id,
        perms: perms.clone(),
        expire_utc,
    })
}

/// Fetch a Token row by its bearer string.
pub fn get_by_token(conn: &Connection, token: &str) -> Result<TokenRow> {
    conn.query_row(
        &format!("SELECT {SELECT_COLS} FROM tokens WHERE token = ?1"),
        [token],
        row_to_token,
    )
    .map_err(|_| Error::Unauthorized("unknown token".to_string()))
}

/// Revoke (delete) a Token by its bearer string.
pub fn revoke(tx: &Transaction, token: &str) -> Result<()> {
    let affected = tx.execute("DELETE FROM tokens WHERE token = ?1", [token])?;
    if affected == 0 {
        return Err(Error::NotFound("token".to_string()));
    }
    Ok(())
}

/// `true` when `row.expire_utc` has already passed.
pub fn is_expired(row: &TokenRow) -> bool {
    row.expire_utc <= now_utc()
}
