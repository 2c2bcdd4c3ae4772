//! File transfer reassembly.
//!
//! The engine reports incoming files as a stream of progress events keyed
//! only by file name, with the binary artifact attached to the final (100%)
//! report. The assembler turns that stream into at most one outcome per
//! transfer:
//!
//! - Progress must never go backwards. A lower percentage than previously
//!   seen aborts the transfer with a protocol error; other transfers and the
//!   session are unaffected.
//! - At 100% the artifact's content type decides between an image message
//!   and a discard (non-image files are reported, not rendered).
//! - A completed transfer leaves the pending set for good. A repeated 100%
//!   report for the same file within [`DUPLICATE_WINDOW_MS`] of the
//!   completion is a duplicate. Later, or once a new transfer of that file
//!   starts below 100%, it opens a new transfer. At most
//!   [`MAX_RECENT_COMPLETIONS`] completions are remembered.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    error::{SessionError, TransferViolation},
    message::ImageRef,
};

/// How long a completion suppresses a repeated 100% report of the same file.
pub const DUPLICATE_WINDOW_MS: u64 = 5_000;

/// Completions remembered for duplicate detection; the oldest is dropped
/// first.
pub const MAX_RECENT_COMPLETIONS: usize = 64;

/// Transfer identity: file name plus the time the first report arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferId {
    /// File name reported by the engine.
    pub file_name: String,
    /// Milliseconds since the orchestrator started when the transfer began.
    pub started_at_ms: u64,
}

/// Completed file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Content type reported by the engine.
    pub mime_type: String,
    /// File bytes.
    pub data: Bytes,
}

/// One progress report for an incoming file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProgress {
    /// File name.
    pub file_name: String,
    /// Completion, 0 to 100.
    pub percentage: u8,
    /// Content, present only at 100%.
    pub artifact: Option<Artifact>,
}

/// An in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Identity.
    pub id: TransferId,
    /// Latest accepted percentage.
    pub percentage: u8,
}

/// Result of feeding one report to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Transfer still in flight.
    Progress {
        /// Transfer identity.
        id: TransferId,
        /// Accepted percentage.
        percentage: u8,
    },

    /// Transfer completed with image content.
    Image {
        /// Transfer identity.
        id: TransferId,
        /// Reference to the image.
        image: ImageRef,
    },

    /// Transfer completed with content that is not rendered.
    Discarded {
        /// Transfer identity.
        id: TransferId,
        /// Content type of the discarded file.
        mime_type: String,
    },

    /// Repeated completion of an already completed transfer.
    Duplicate {
        /// File name of the repeated report.
        file_name: String,
    },
}

/// Reassembles progress reports into completed artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferAssembler {
    image_prefix: String,
    active: HashMap<String, FileTransfer>,
    /// File name to completion time.
    completed: HashMap<String, u64>,
}

impl FileTransferAssembler {
    /// Assembler forwarding content types starting with `image_prefix`.
    pub fn new(image_prefix: impl Into<String>) -> Self {
        Self { image_prefix: image_prefix.into(), active: HashMap::new(), completed: HashMap::new() }
    }

    /// Feed one progress report.
    ///
    /// `now_ms` is used as the start time when the report opens a transfer
    /// and ages out remembered completions.
    ///
    /// # Errors
    /// Returns `TransferProtocol` for a non-monotonic or malformed report;
    /// the affected transfer is aborted.
    pub fn on_progress(
        &mut self,
        progress: FileProgress,
        now_ms: u64,
    ) -> Result<TransferOutcome, SessionError> {
        let FileProgress { file_name, percentage, artifact } = progress;
        self.completed.retain(|_, at| now_ms.saturating_sub(*at) < DUPLICATE_WINDOW_MS);

        if let Some(violation) = Self::malformed(percentage, artifact.as_ref()) {
            return Err(self.abort(file_name, violation));
        }

        let id = match self.active.get(&file_name) {
            Some(transfer) if percentage < transfer.percentage => {
                let violation = TransferViolation::NonMonotonic {
                    previous: transfer.percentage,
                    reported: percentage,
                };
                return Err(self.abort(file_name, violation));
            },
            Some(transfer) => transfer.id.clone(),
            None if percentage == 100 && self.completed.contains_key(&file_name) => {
                debug!(%file_name, "duplicate completion ignored");
                return Ok(TransferOutcome::Duplicate { file_name });
            },
            None => {
                self.completed.remove(&file_name);
                TransferId { file_name: file_name.clone(), started_at_ms: now_ms }
            },
        };

        let Some(artifact) = artifact else {
            self.active.insert(file_name, FileTransfer { id: id.clone(), percentage });
            return Ok(TransferOutcome::Progress { id, percentage });
        };

        self.active.remove(&file_name);
        self.remember_completion(file_name.clone(), now_ms);

        if artifact.mime_type.starts_with(&self.image_prefix) {
            let image = ImageRef { file_name, mime_type: artifact.mime_type, data: artifact.data };
            Ok(TransferOutcome::Image { id, image })
        } else {
            debug!(%file_name, mime_type = %artifact.mime_type, "non-image file not forwarded");
            Ok(TransferOutcome::Discarded { id, mime_type: artifact.mime_type })
        }
    }

    /// Transfers still in flight.
    pub fn pending(&self) -> impl Iterator<Item = &FileTransfer> {
        self.active.values()
    }

    /// Number of transfers in flight.
    pub fn pending_count(&self) -> usize {
        self.active.len()
    }

    /// Discard all partial state, returning how many transfers were in flight.
    pub fn abort_all(&mut self) -> usize {
        let aborted = self.active.len();
        self.active.clear();
        self.completed.clear();
        if aborted > 0 {
            debug!(aborted, "in-flight transfers discarded");
        }
        aborted
    }

    /// Completions still suppressing repeats.
    pub fn recent_completions(&self) -> usize {
        self.completed.len()
    }

    fn remember_completion(&mut self, file_name: String, now_ms: u64) {
        if self.completed.len() >= MAX_RECENT_COMPLETIONS
            && !self.completed.contains_key(&file_name)
            && let Some(oldest) =
                self.completed.iter().min_by_key(|(_, at)| **at).map(|(name, _)| name.clone())
        {
            self.completed.remove(&oldest);
        }
        self.completed.insert(file_name, now_ms);
    }

    fn malformed(percentage: u8, artifact: Option<&Artifact>) -> Option<TransferViolation> {
        match (percentage, artifact) {
            (p, _) if p > 100 => Some(TransferViolation::OutOfRange(p)),
            (100, None) => Some(TransferViolation::MissingArtifact),
            (p, Some(_)) if p < 100 => Some(TransferViolation::PrematureArtifact(p)),
            _ => None,
        }
    }

    fn abort(&mut self, file_name: String, violation: TransferViolation) -> SessionError {
        warn!(%file_name, %violation, "transfer aborted");
        self.active.remove(&file_name);
        SessionError::TransferProtocol { file_name, violation }
    }
}
