use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Files behind the `photo` table, kept flat in the upload directory.
#[derive(Clone)]
pub struct PhotoStorage {
    root: Arc<PathBuf>,
}

impl PhotoStorage {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    pub fn path_for(&self, file_path: &str) -> PathBuf {
        self.root().join(file_path)
    }

    /// Writes an upload and returns its stored name. The caller has already
    /// checked the name with [`secure_filename`] and [`allowed_file`].
    pub async fn save(&self, safe_name: &str, data: &[u8]) -> Result<String, AppError> {
        self.ensure_structure().await?;
        let stored = format!("{}-{}", Uuid::new_v4().simple(), safe_name);
        fs::write(self.path_for(&stored), data).await?;
        debug!(file = %stored, bytes = data.len(), "stored photo");
        Ok(stored)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, file_path: &str) -> Result<(), AppError> {
        let name = Path::new(file_path)
            .file_name()
            .ok_or_else(|| AppError::BadRequest(format!("invalid file path {file_path}")))?;
        match fs::remove_file(self.root().join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduces a client supplied file name to ASCII letters, digits, `.`, `-` and
/// `_`. Directory components are dropped.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned
        .trim_start_matches(|c: char| c == '.' || c == '_')
        .to_string()
}
