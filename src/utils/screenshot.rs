use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::errors::Result;
use crate::types::StepAction;

/// File name for the capture taken after a successful step.
pub fn file_name(step: usize, action: StepAction) -> String {
    format!("step-{:02}-{}.png", step, action)
}

/// Writes PNG bytes under `dir`, creating the directory if needed, and
/// returns the path that went into the run record.
pub async fn save(dir: &Path, name: &str, bytes: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path.to_string_lossy().into_owned())
}

/// Inline form used when no screenshot directory is configured.
pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}
