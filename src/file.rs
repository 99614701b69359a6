use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, UploadError};

/// A file read from the base directory, with its detected MIME type.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    contents: Bytes,
    mime_type: Option<String>,
}

impl LocalFile {
    /// The resolved path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    /// The MIME type guessed for the file, if any.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// Reads `filename` relative to `base_dir`.
///
/// # Errors
///
/// - `UploadError::FileNotFound` if the file is absent, or the name is absolute
///   or climbs out of `base_dir`.
/// - `UploadError::FileUnreadable` if the path is a directory or cannot be read.
pub async fn read_file(base_dir: &Path, filename: &str) -> Result<LocalFile> {
    let path = resolve(base_dir, filename).ok_or_else(|| UploadError::FileNotFound {
        path: PathBuf::from(filename),
    })?;

    let metadata = fs::metadata(&path)
        .await
        .map_err(|source| io_error(&path, source))?;
    if metadata.is_dir() {
        return Err(UploadError::FileUnreadable {
            path,
            source: io::Error::new(io::ErrorKind::Other, "path is a directory"),
        });
    }

    let contents = fs::read(&path)
        .await
        .map_err(|source| io_error(&path, source))?;

    let mime_type = mime_guess::from_path(&path)
        .first()
        .map(|mime| mime.essence_str().to_string());
    debug!(path = %path.display(), bytes = contents.len(), ?mime_type, "read file");

    Ok(LocalFile {
        path,
        contents: Bytes::from(contents),
        mime_type,
    })
}

fn io_error(path: &Path, source: io::Error) -> UploadError {
    if source.kind() == io::ErrorKind::NotFound {
        UploadError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        UploadError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Joins `filename` onto `base_dir` lexically, refusing anything that would
/// land outside of it.
fn resolve(base_dir: &Path, filename: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(filename).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }

    let mut path = base_dir.to_path_buf();
    path.extend(parts);
    Some(path)
}
