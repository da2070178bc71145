//! Bearer tokens: JWT minting/verification and
//! `permission_for` checks over `vdb_catalog::perms`, backed by the shared
//! Id-cache.
//!
//! JWT mechanics follow the `jsonwebtoken` crate directly, HS256 signed
//! with `Config::jwt_token_key`.

use std::collections::HashMap;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use vdb_catalog::{cached_token_from_row, perms, token, Catalog};
use vdb_core::{now_utc, Config, Error, InternalId, Result};

/// JWT claims minted for a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Space the token is scoped to, or `None` for a system-wide token.
    pub space_id: Option<InternalId>,
    /// Permission bits, keyed by resource name.
    pub perms: HashMap<String, i32>,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

fn encoding_key(cfg: &Config) -> EncodingKey {
    EncodingKey::from_secret(cfg.jwt_token_key.as_bytes())
}

fn decoding_key(cfg: &Config) -> DecodingKey {
    DecodingKey::from_secret(cfg.jwt_token_key.as_bytes())
}

/// Mint a new bearer token, persist its row, and return the signed JWT
/// string. `expire_days = 0` applies `cfg.default_token_expire_days`.
pub fn new_token(catalog: &Catalog, cfg: &Config, space_id: Option<InternalId>, perms: HashMap<String, i32>, expire_days: i64) -> Result<String> {
    let expire_days = if expire_days == 0 { cfg.default_token_expire_days } else { expire_days };
    let iat = now_utc();
    let exp = iat + expire_days * 86_400;
    let claims = Claims {
        space_id,
        perms: perms.clone(),
        iat,
        exp,
    };
    let jwt = encode(&Header::new(Algorithm::HS256), &claims, &encoding_key(cfg)).map_err(|e| Error::Internal(e.to_string()))?;

    let row = catalog.store().with_tx(|tx| token::create(tx, &jwt, space_id, &perms, exp))?;
    catalog.id_cache().put_token(&jwt, cached_token_from_row(&row));
    Ok(jwt)
}

/// Decode and signature-verify a JWT, without consulting the catalog or
/// Id-cache. Rejects an expired token (`exp` in the past).
pub fn verify(cfg: &Config, jwt: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(jwt, &decoding_key(cfg), &validation).map_err(|e| Error::Unauthorized(e.to_string()))?;
    Ok(data.claims)
}

/// `true` if `jwt` is valid, unexpired, and grants `required` on `resource`.
///
/// Reads via the Id-cache first; on a miss, falls back to the catalog's
/// `tokens` table and memoises the result. Per the error-handling design,
/// any failure (signature, expiry, missing row, insufficient bits) folds
/// into a plain `false` rather than surfacing the underlying error.
pub fn permission_for(catalog: &Catalog, cfg: &Config, jwt: &str, resource: &str, required: i32) -> bool {
    match permission_for_inner(catalog, cfg, jwt, resource, required) {
        Ok(allowed) => allowed,
        Err(_) => false,
    }
}

fn permission_for_inner(catalog: &Catalog, cfg: &Config, jwt: &str, resource: &str, required: i32) -> Result<bool> {
    if verify(cfg, jwt).is_err() {
        return Ok(false);
    }
    let cached = match catalog.id_cache().get_token(jwt) {
        Some(c) => c,
        None => {
            let row = catalog.store().with_conn(|c| token::get_by_token(c, jwt))?;
            let cached = cached_token_from_row(&row);
            catalog.id_cache().put_token(jwt, cached.clone());
            cached
        }
    };
    if cached.expire_utc <= now_utc() {
        return Ok(false);
    }
    let bits = cached.perms.get(resource).copied().unwrap_or(0);
    Ok(perms::allows(bits, required))
}

/// Replace a token's permission bits and/or expiry, transactionally.
pub fn update(catalog: &Catalog, jwt: &str, perms: Option<HashMap<String, i32>>, expire_utc: Option<i64>) -> Result<()> {
    let existing = catalog.store().with_conn(|c| token::get_by_token(c, jwt))?;
    let new_perms = perms.unwrap_or(existing.perms);
    let new_expire = expire_utc.unwrap_or(existing.expire_utc);
    catalog.store().with_tx(|tx| {
        token::revoke(tx, jwt)?;
        token::create(tx, jwt, existing.space_id, &new_perms, new_expire)?;
        Ok(())
    })?;
    catalog.id_cache().invalidate_token(jwt);
    Ok(())
}

/// Revoke a token, evicting it from the Id-cache.
pub fn delete(catalog: &Catalog, jwt: &str) -> Result<()> {
    catalog.store().with_tx(|tx| token::revoke(tx, jwt))?;
    catalog.id_cache().invalidate_token(jwt);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        Config::in_memory(std::env::temp_dir())
    }

    #[test]
    fn mint_then_verify_round_trips_claims() {
        let cfg = cfg();
        let catalog = Catalog::in_memory().unwrap();
        let mut p = HashMap::new();
        p.insert("space".to_string(), perms::READ | perms::WRITE);
        let jwt = new_token(&catalog, &cfg, Some(7), p.clone(), 30).unwrap();

        let claims = verify(&cfg, &jwt).unwrap();
        assert_eq!(claims.space_id, Some(7));
        assert_eq!(claims.perms, p);
    }

    #[test]
    fn permission_for_checks_required_bits() {
        let cfg = cfg();
        let catalog = Catalog::in_memory().unwrap();
        let mut p = HashMap::new();
        p.insert("space".to_string(), perms::READ);
        let jwt = new_token(&catalog, &cfg, None, p, 30).unwrap();

        assert!(permission_for(&catalog, &cfg, &jwt, "space", perms::READ));
        assert!(!permission_for(&catalog, &cfg, &jwt, "space", perms::WRITE));
        assert!(!permission_for(&catalog, &cfg, &jwt, "other", perms::READ));
    }

    #[test]
    fn expired_token_is_denied() {
        let cfg = cfg();
        let catalog = Catalog::in_memory().unwrap();
        let jwt = new_token(&catalog, &cfg, None, HashMap::new(), 30).unwrap();
        update(&catalog, &jwt, None, Some(now_utc() - 10)).unwrap();
        assert!(!permission_for(&catalog, &cfg, &jwt, "space", perms::READ));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let cfg = cfg();
        let catalog = Catalog::in_memory().unwrap();
        let jwt = new_token(&catalog, &cfg, None, HashMap::new(), 30).unwrap();
        let mut tampered = jwt.clone();
        tampered.push('x');
        assert!(verify(&cfg, &tampered).is_err());
        assert!(!permission_for(&catalog, &cfg, &tampered, "space", perms::READ));
    }

    #[test]
    fn delete_revokes_the_token() {
        let cfg = cfg();
        let catalog = Catalog::in_memory().unwrap();
        let jwt = new_token(&catalog, &cfg, None, HashMap::new(), 30).unwrap();
        delete(&catalog, &jwt).unwrap();
        assert!(catalog.store().with_conn(|c| token::get_by_token(c, &jwt)).is_err());
    }
}
