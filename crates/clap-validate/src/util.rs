use std::fs;
use std::io;
use std::path::PathBuf;

/// The validator's scratch directory, `<system-temp>/clap-validator`. Created
/// on first use, never eagerly.
pub fn validator_temp_dir() -> io::Result<PathBuf> {
    let dir = std::env::temp_dir().join("clap-validator");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
