use anyhow::Result;
use log::{error, info};
use std::path::Path;
use tokio::fs;

/// Asynchronously ensures that a directory exists, creating it if it does not.
/// This function is idempotent.
pub async fn ensure_directory_exists<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        if let Err(e) = fs::create_dir_all(path).await {
            error!("Failed to create directory at {:?}: {}", path, e);
            return Err(e.into());
        }
        info!("Created directory at: {:?}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_directories_once() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("polar").join("sessions");
        ensure_directory_exists(&nested).await.unwrap();
        assert!(nested.is_dir());
        ensure_directory_exists(&nested).await.unwrap();
    }
}
