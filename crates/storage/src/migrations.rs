//! Embedded migration scripts.
//!
//! The migration directory contract (a directory holding `reset.sql` and
//! `migration_<n>[.sql]` files, applied in ascending numeric order) is
//! preserved as documentation and as the numbering scheme below, but the
//! scripts themselves are embedded with `include_str!` rather than scanned
//! from disk at runtime, sidestepping shipping a data directory alongside
//! the compiled artifact.

/// `(version, ddl script)` pairs in ascending order. Applying them in order
/// from a fresh database, or from any schema version already recorded in
/// `info.schema_version`, reaches the latest schema.
pub const MIGRATIONS: &[(i64, &str)] = &[
    (0, include_str!("../migrations/migration_0.sql")),
    (1, include_str!("../migrations/migration_1.sql")),
];

/// The `reset.sql` script: drops every table so migrations can rebuild from
/// scratch.
pub const RESET: &str = include_str!("../migrations/reset.sql");

/// The schema version the embedded migration set reaches.
pub fn latest_schema_version() -> i64 {
    MIGRATIONS.iter().map(|(v, _)| *v).max().unwrap_or(-1)
}
