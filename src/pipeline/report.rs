use log::{info, warn};
use std::{fmt, time::Duration};

use super::{field_path::FieldPath, fetch::FetchError, retry::RetryError};
use crate::describe::DescribeError;

/// Why a validated link kept its original value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    DownloadFailed(String),
    ImageTooSmall { size: u64, min: u64 },
    PersistFailed(String),
    DescriptionFailed(String),
    DescriptionRejected(String),
}

impl SkipReason {
    pub(crate) fn from_fetch(err: RetryError<FetchError>) -> Self {
        match err.into_inner() {
            FetchError::ImageTooSmall { size, min, .. } => Self::ImageTooSmall { size, min },
            e @ FetchError::Persist { .. } => Self::PersistFailed(e.to_string()),
            e => Self::DownloadFailed(e.to_string()),
        }
    }

    pub(crate) fn from_describe(err: RetryError<DescribeError>) -> Self {
        match err.into_inner() {
            DescribeError::InvalidDescription(reason) => Self::DescriptionRejected(reason),
            e => Self::DescriptionFailed(e.to_string()),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadFailed(e) => write!(f, "download failed: {}", e),
            Self::ImageTooSmall { size, min } => {
                write!(f, "image too small: {} bytes < {} bytes", size, min)
            }
            Self::PersistFailed(e) => write!(f, "could not save image: {}", e),
            Self::DescriptionFailed(e) => write!(f, "description failed: {}", e),
            Self::DescriptionRejected(e) => write!(f, "description rejected: {}", e),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// String leaves produced by the walk
    pub candidates: usize,
    /// Candidates accepted by the link validator
    pub validated: usize,
    pub replaced: Vec<FieldPath>,
    pub skipped: Vec<(FieldPath, SkipReason)>,
    /// Subtrees dropped for exceeding the depth limit
    pub abandoned: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn log(&self) {
        info!(
            duration = &*format!("{:?}", self.elapsed);
            "Processed {} candidates: {} links, {} replaced, {} skipped",
            self.candidates,
            self.validated,
            self.replaced.len(),
            self.skipped.len()
        );
        if self.abandoned > 0 {
            warn!("{} subtrees exceeded the maximum depth", self.abandoned);
        }
        for (path, reason) in &self.skipped {
            info!("Kept {}: {}", path, reason);
        }
    }
}
