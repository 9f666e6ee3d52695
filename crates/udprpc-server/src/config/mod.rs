//! Server config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use udprpc_core::error::{Result, RpcError};

pub use schema::{
    FacilityConfig, HistorySection, OpeningConfig, Semantics, ServerConfig, ServerSection,
    SimulationSection,
};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)
        .map_err(|e| RpcError::Internal(format!("read config {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

/// Like [`load_from_file`], but a missing file yields the defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ServerConfig> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(ServerConfig::default())
        }
        _ => load_from_file(path),
    }
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| RpcError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
