//! Core types shared across the embedded vector database workspace.
//!
//! This crate defines the foundational vocabulary used throughout the system:
//! the unified [`Error`] taxonomy, id/clock helpers, catalog-wide value types
//! (`ValueKind`, `Metric`, `VectorPayload`, HNSW/quantization configuration),
//! and environment-driven [`Config`].

pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use config::{init_logging, Config};
pub use error::{Error, Result};
pub use ids::{now_utc, random_suffix, InternalId, UniqueId};
pub use model::{
    HnswConfig, IndexSpec, Metric, ProductQuantConfig, QuantConfig, ScalarQuantConfig, ScalarType,
    ValueKind, VectorPayload,
};

/// Regex-shaped validation for Space names: `/^[A-Za-z0-9_-]+$/`.
pub fn validate_space_name(name: &str) -> Result<()> {
    if !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "invalid space name {name:?}: must match [A-Za-z0-9_-]+"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_name_accepts_alphanumeric_and_dash_underscore() {
        assert!(validate_space_name("my-space_1").is_ok());
        assert!(validate_space_name("A1").is_ok());
    }

    #[test]
    fn space_name_rejects_empty_and_special_chars() {
        assert!(validate_space_name("").is_err());
        assert!(validate_space_name("bad space").is_err());
        assert!(validate_space_name("bad/space").is_err());
    }
}
