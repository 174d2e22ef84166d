//! File Service
//!
//! LIST/GET/UPLOAD against one flat directory.
//!
//! ## Concurrency:
//! - No in-memory state beyond the directory path; each call opens and
//!   closes its own file handles, so one instance can be shared by any
//!   number of threads (`Clone + Send + Sync`)
//! - Uploads go to a hidden temp file that is renamed over the target, so
//!   concurrent uploads of one name are last-writer-wins and a concurrent
//!   GET sees either the old or the new content, never a mix

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use crate::error::CommandError;

/// Prefix for in-progress upload files; hidden from LIST
const UPLOAD_TEMP_PREFIX: &str = ".upload-";

/// File operations confined to a single directory
#[derive(Debug, Clone)]
pub struct FileService {
    /// The service directory
    root: PathBuf,
}

impl FileService {
    /// Open the service directory, creating it if it doesn't exist
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let root = path.into();
        fs::create_dir_all(&root)?;

        tracing::debug!("File service rooted at {}", root.display());
        Ok(Self { root })
    }

    /// The service directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every regular, non-hidden file, in enumeration order
    pub fn list(&self) -> Result<Vec<String>, CommandError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) if name.starts_with('.') => {}
                Ok(name) => names.push(name),
                Err(raw) => {
                    tracing::warn!("Skipping non UTF-8 file name {:?}", raw);
                }
            }
        }

        tracing::debug!("Listed {} files", names.len());
        Ok(names)
    }

    /// Read a file's full content
    pub fn get(&self, name: &str) -> Result<Vec<u8>, CommandError> {
        let path = self.resolve(name)?;

        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CommandError::FileNotFound(name.to_string()));
            }
            Err(e) if path.is_dir() => {
                tracing::debug!("GET {} hit a directory: {}", name, e);
                return Err(CommandError::FileNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Read {} ({} bytes)", name, content.len());
        Ok(content)
    }

    /// Create or overwrite a file
    pub fn upload(&self, name: &str, content: &[u8]) -> Result<(), CommandError> {
        let path = self.resolve(name)?;

        let mut temp = tempfile::Builder::new()
            .prefix(UPLOAD_TEMP_PREFIX)
            .tempfile_in(&self.root)?;
        temp.write_all(content)?;
        temp.persist(&path).map_err(|e| CommandError::Io(e.error))?;

        tracing::debug!("Stored {} ({} bytes)", name, content.len());
        Ok(())
    }

    /// Join a client-supplied name onto the service directory.
    ///
    /// Only a single normal path component is accepted: no separators,
    /// no `.`/`..`, no root or drive prefix, no NUL.
    fn resolve(&self, name: &str) -> Result<PathBuf, CommandError> {
        let invalid = || CommandError::InvalidFilename(name.to_string());

        if name.is_empty() || name.contains('\0') || name.contains(['/', '\\']) {
            return Err(invalid());
        }

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(invalid()),
        }
    }
}
