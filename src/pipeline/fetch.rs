//! Fetch module - downloads validated image links
//!
//! Includes:
//! - HTTP GET through a shared blocking client
//! - Optional persistence under a save directory
//! - Minimum size rejection

use log::{debug, info, warn};
use path_clean::PathClean;
use reqwest::{StatusCode, Url, blocking::Client};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use super::retry::Retryable;
use crate::utils::{ImageKind, link_extension};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{link:?} is not a fetchable URL: {reason}")]
    InvalidLink { link: String, reason: String },
    #[error("request to {link} failed: {reason}")]
    Download { link: String, reason: String },
    #[error("{link} answered with HTTP {status}")]
    Status { link: String, status: StatusCode },
    #[error("{link} is {size} bytes, below the minimum of {min} bytes")]
    ImageTooSmall { link: String, size: u64, min: u64 },
    #[error("failed to save image to {path:?}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Download { .. } | Self::Status { .. })
    }
}

/// Downloaded image, kept in memory for one fetch-describe cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub link: String,
    pub bytes: Vec<u8>,
    pub persisted: Option<PathBuf>,
}

impl ImageAsset {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn kind(&self) -> Option<ImageKind> {
        ImageKind::sniff(&self.bytes)
    }

    /// Name used when the image is uploaded or saved
    pub fn file_name(&self) -> String {
        derived_file_name(&self.link, &self.bytes)
    }
}

pub struct ImageFetcher {
    client: Client,
    min_size_bytes: u64,
    save_dir: Option<PathBuf>,
}

impl ImageFetcher {
    pub fn new(client: Client, min_size_kb: u64, save_dir: Option<PathBuf>) -> Self {
        Self {
            client,
            min_size_bytes: min_size_kb.saturating_mul(1024),
            save_dir: save_dir.map(|dir| dir.clean()),
        }
    }

    pub fn min_size_bytes(&self) -> u64 {
        self.min_size_bytes
    }

    pub fn save_dir(&self) -> Option<&Path> {
        self.save_dir.as_deref()
    }

    /// Download `link` and apply the size check
    pub fn fetch(&self, link: &str) -> Result<ImageAsset, FetchError> {
        let url = Url::parse(link).map_err(|e| FetchError::InvalidLink {
            link: link.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidLink {
                link: link.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }

        debug!("Downloading image from {}", link);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Download {
                link: link.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                link: link.to_string(),
                status,
            });
        }

        let bytes = response.bytes().map_err(|e| FetchError::Download {
            link: link.to_string(),
            reason: format!("failed to read body: {e}"),
        })?;

        self.accept(link, bytes.to_vec())
    }

    /// Persist (when configured) and size-check a downloaded payload. A rejected image
    /// does not stay on disk.
    pub fn accept(&self, link: &str, bytes: Vec<u8>) -> Result<ImageAsset, FetchError> {
        let persisted = match &self.save_dir {
            Some(dir) => Some(persist(dir, link, &bytes)?),
            None => None,
        };

        let size = bytes.len() as u64;
        if size < self.min_size_bytes {
            if let Some(path) = &persisted {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove rejected image {:?}: {}", path, e);
                }
            }
            return Err(FetchError::ImageTooSmall {
                link: link.to_string(),
                size,
                min: self.min_size_bytes,
            });
        }

        info!("Image {} downloaded ({} bytes)", link, size);
        Ok(ImageAsset {
            link: link.to_string(),
            bytes,
            persisted,
        })
    }
}

fn persist(dir: &Path, link: &str, bytes: &[u8]) -> Result<PathBuf, FetchError> {
    let path = dir.join(derived_file_name(link, bytes));
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, bytes))
        .map_err(|source| FetchError::Persist {
            path: path.clone(),
            source,
        })?;
    debug!("Image {} saved as {:?}", link, path);
    Ok(path)
}

/// `<first 16 hex chars of blake3(link)>.<ext>`; the extension comes from the content,
/// then the link, then defaults to `jpg`.
pub fn derived_file_name(link: &str, bytes: &[u8]) -> String {
    let hash = blake3::hash(link.as_bytes()).to_hex();
    let ext = ImageKind::sniff(bytes)
        .map(|kind| kind.ext().to_string())
        .or_else(|| link_extension(link))
        .unwrap_or_else(|| "jpg".to_string());
    format!("{}.{}", &hash.as_str()[..16], ext)
}
