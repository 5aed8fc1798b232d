//! CLI command implementations.

pub mod render;
pub mod schema;

use entimap_core::DialectKind;

/// Maps a `--dialect` argument to a built-in dialect.
pub fn parse_dialect(name: &str) -> Result<DialectKind, Box<dyn std::error::Error>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
        "sqlite" => Ok(DialectKind::Sqlite),
        other => Err(format!("Unknown dialect {other:?} (expected sqlserver or sqlite)").into()),
    }
}
