use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Stores uploaded teaser PDFs under a single directory.
pub struct FileStorage {
    directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes an upload and returns where it landed.
    ///
    /// Only the final path component of `filename` is used. Names that are
    /// already taken get a numeric suffix (`teaser_2.pdf`).
    pub fn store_upload(&self, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let name = upload_name(filename)?;
        self.ensure_directory()?;
        self.store_with_atomic_creation(&name, content)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub fn remove(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Creates the file with `create_new` so concurrent uploads of the same
    /// name never overwrite each other.
    fn store_with_atomic_creation(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let (base, ext) = match filename.rfind('.') {
            Some(dot_pos) => (&filename[..dot_pos], &filename[dot_pos..]),
            None => (filename, ""),
        };

        for counter in 1..=MAX_NAME_ATTEMPTS {
            let candidate = if counter == 1 {
                filename.to_string()
            } else {
                format!("{}_{}{}", base, counter, ext)
            };
            let path = self.directory.join(&candidate);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    write_new_file(file, &path, content)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(self.directory.join(filename)))
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

/// Writes `content` to a freshly created file. The file is removed again if
/// the write fails.
fn write_new_file<W: Write>(mut file: W, path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let written = file.write_all(content).and_then(|()| file.flush());
    drop(file);
    written.map_err(|source| {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to remove partial upload {}: {}", path.display(), e);
        }
        StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Final path component of `filename`, which must end in `.pdf`.
fn upload_name(filename: &str) -> Result<String, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidUpload {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    let name = Path::new(filename.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("missing file name"))?;

    let is_pdf = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(invalid("only PDF files are accepted"));
    }
    if name.len() <= ".pdf".len() {
        return Err(invalid("missing file name"));
    }
    Ok(name.to_string())
}
