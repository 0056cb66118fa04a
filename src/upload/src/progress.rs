// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Progress notifications for uploads in flight.
//!
//! The uploader reports progress after each part is accepted. Observers run
//! on the upload task, so their implementations must return promptly and must
//! not fail. Use [ChannelProgress] to move the events to a different task.

use tokio::sync::mpsc;

/// A snapshot of the progress of one upload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    /// The bytes accepted by the object storage service.
    pub bytes_uploaded: u64,
    /// The size of the file.
    pub total_bytes: u64,
    /// The number of parts accepted. Single-shot uploads count as one part.
    pub parts_completed: u32,
}

impl UploadProgress {
    /// The uploaded fraction as a percentage.
    ///
    /// An empty file reports 100% as soon as it is uploaded.
    ///
    /// # Example
    /// ```
    /// # use presigned_upload::UploadProgress;
    /// let progress = UploadProgress { bytes_uploaded: 5, total_bytes: 20, parts_completed: 1 };
    /// assert_eq!(progress.percentage(), 25.0);
    /// ```
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return if self.parts_completed > 0 { 100.0 } else { 0.0 };
        }
        self.bytes_uploaded as f64 * 100.0 / self.total_bytes as f64
    }

    /// Returns true once every byte is uploaded.
    pub fn is_complete(&self) -> bool {
        self.bytes_uploaded == self.total_bytes && self.parts_completed > 0
    }
}

/// Receives progress updates from an upload.
pub trait ProgressObserver: Send + Sync {
    /// Called with monotonically non-decreasing progress.
    fn on_progress(&self, progress: UploadProgress);
}

/// Ignores all progress updates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: UploadProgress) {}
}

/// Forwards progress updates to a bounded channel.
///
/// Updates are dropped when the channel is full or closed, so a slow receiver
/// never stalls the upload.
///
/// # Example
/// ```
/// # use presigned_upload::{ChannelProgress, ProgressObserver, UploadProgress};
/// let (observer, mut rx) = ChannelProgress::new(8);
/// observer.on_progress(UploadProgress { bytes_uploaded: 1, total_bytes: 2, parts_completed: 1 });
/// assert_eq!(rx.try_recv().map(|p| p.bytes_uploaded), Ok(1));
/// ```
#[derive(Clone, Debug)]
pub struct ChannelProgress {
    tx: mpsc::Sender<UploadProgress>,
}

impl ChannelProgress {
    /// Creates an observer and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UploadProgress>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl From<mpsc::Sender<UploadProgress>> for ChannelProgress {
    fn from(tx: mpsc::Sender<UploadProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressObserver for ChannelProgress {
    fn on_progress(&self, progress: UploadProgress) {
        if let Err(e) = self.tx.try_send(progress) {
            tracing::trace!("dropping progress update: {e}");
        }
    }
}

/// Tracks the progress of one upload and notifies an observer.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    current: UploadProgress,
}

impl ProgressTracker {
    pub(crate) fn new(total_bytes: u64) -> Self {
        Self {
            current: UploadProgress {
                bytes_uploaded: 0,
                total_bytes,
                parts_completed: 0,
            },
        }
    }

    pub(crate) fn start(&self, observer: &dyn ProgressObserver) {
        observer.on_progress(self.current);
    }

    pub(crate) fn part_completed(&mut self, len: u64, observer: &dyn ProgressObserver) {
        self.current.bytes_uploaded = self
            .current
            .bytes_uploaded
            .saturating_add(len)
            .min(self.current.total_bytes);
        self.current.parts_completed += 1;
        observer.on_progress(self.current);
    }

    // This is only used in tests.
    #[cfg(test)]
    pub(crate) fn current(&self) -> UploadProgress {
        self.current
    }
}
