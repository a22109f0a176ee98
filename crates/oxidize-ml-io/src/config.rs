use std::fs;
use std::path::Path;

use oxidize_ml_core::VMatResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load any serde configuration struct from a JSON file.
pub fn read_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> VMatResult<T> {
    let json = fs::read_to_string(path.as_ref())?;
    Ok(serde_json::from_str(&json)?)
}

/// Save a configuration struct as pretty-printed JSON.
pub fn write_config<T: Serialize>(config: &T, path: impl AsRef<Path>) -> VMatResult<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path.as_ref(), json)?;
    Ok(())
}
