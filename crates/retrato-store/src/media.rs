// SPDX-License-Identifier: Apache-2.0

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreErrorCode};

/// Image blob buckets. `watermarked` previews are served publicly; the
/// other two stay private behind signed or admin access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Originals,
    Generated,
    Watermarked,
}

impl Bucket {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Originals => "originals",
            Self::Generated => "generated",
            Self::Watermarked => "watermarked",
        }
    }
}

/// Filesystem-backed media store. Writes are atomic (tmp file + rename)
/// and refuse to overwrite an existing key.
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn put(&self, bucket: Bucket, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.resolve(bucket, key)?;
        if path.exists() {
            return Err(StoreError::new(
                StoreErrorCode::Conflict,
                format!("media key already exists: {}/{key}", bucket.as_str()),
            ));
        }
        let parent = path.parent().ok_or_else(|| {
            StoreError::new(StoreErrorCode::Internal, "media path has no parent")
        })?;
        fs::create_dir_all(parent).map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::new(StoreErrorCode::Internal, "media path has no file name"))?;
        let tmp = path.with_file_name(format!("{file_name}.tmp"));
        write_and_sync(&tmp, bytes)?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
        Ok(())
    }

    pub fn get(&self, bucket: Bucket, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(bucket, key)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::new(
                    StoreErrorCode::NotFound,
                    format!("media key missing: {}/{key}", bucket.as_str()),
                )
            } else {
                StoreError::new(StoreErrorCode::Io, e.to_string())
            }
        })
    }

    pub fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StoreError> {
        Ok(self.resolve(bucket, key)?.exists())
    }

    fn resolve(&self, bucket: Bucket, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(bucket.as_str()).join(key))
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let reject = |reason: &str| {
        Err(StoreError::new(
            StoreErrorCode::Validation,
            format!("invalid media key `{key}`: {reason}"),
        ))
    };
    if key.is_empty() {
        return reject("must not be empty");
    }
    if key.len() > 256 {
        return reject("exceeds max length 256");
    }
    if key.starts_with('/') || key.ends_with('/') {
        return reject("must be bucket-relative");
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return reject("path traversal blocked");
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return reject("must contain only [A-Za-z0-9._-] segments");
        }
    }
    Ok(())
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)
        .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
    file.sync_all()
        .map_err(|e| StoreError::new(StoreErrorCode::Io, e.to_string()))?;
    Ok(())
}
