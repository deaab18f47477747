pub mod config;
pub mod migrations;
pub mod reservation_db;

pub use config::Config;
pub use reservation_db::{BulkBlockSummary, ReservationDb, ReservationTx};

use std::path::PathBuf;

/// Returns `~/.config/sportoase[-dev]/` based on SPORTOASE_ENV.
///
/// Set SPORTOASE_ENV=dev to use development data directory.
/// SPORTOASE_DATA_DIR, when set, replaces the directory entirely.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("SPORTOASE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SPORTOASE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("sportoase-dev")
            } else {
                base_dir.join("sportoase")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
