//! Recipe files on disk
//!
//! Saves go through a temporary file in the destination directory that is
//! renamed over the target, so a failed save leaves the previous file intact.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use depo_model::Recipe;

use super::codec::{LoadedRecipe, RecipeFileCodec};
use super::{FileError, FileErrors};

/// Header extra recording when a file was written
pub const EXPORTED_AT: &str = "exported_at";

fn io_error(path: &Path, err: impl std::fmt::Display) -> FileError {
    FileError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Loads and saves recipe files
#[derive(Debug, Clone)]
pub struct RecipeFileStore {
    codec: RecipeFileCodec,
}

impl RecipeFileStore {
    pub fn new(codec: RecipeFileCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &RecipeFileCodec {
        &self.codec
    }

    /// Write `recipe` to `path`, replacing any existing file atomically
    pub fn save(&self, path: impl AsRef<Path>, recipe: &Recipe) -> Result<(), FileError> {
        let path = path.as_ref();
        let exported_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let text = self
            .codec
            .serialize_with(recipe, &[(EXPORTED_AT, exported_at.as_str())])?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| io_error(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| io_error(path, e.error))?;

        info!("Recipe saved: {} ({} rows)", path.display(), recipe.len());
        Ok(())
    }

    /// Read and verify the recipe stored at `path`
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedRecipe, FileErrors> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        let loaded = self.codec.deserialize(&text)?;

        info!(
            "Recipe loaded: {} ({} rows)",
            path.display(),
            loaded.recipe.len()
        );
        Ok(loaded)
    }
}
