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

//! Drives single-shot and multipart uploads.

use crate::Result;
use crate::chunk_reader::ChunkReader;
use crate::error::{BuilderError, Error};
use crate::link_provider::LinkProvider;
use crate::model::{FileDescriptor, ObjectId, UploadReceipt, UploadTarget};
use crate::part_uploader::PartUploader;
use crate::progress::{ProgressObserver, ProgressTracker};
use crate::session::UploadSession;
use crate::strategy::{CHUNK_SIZE, MULTIPART_THRESHOLD, Strategy};
use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Uploads files through presigned links.
///
/// Files up to the multipart threshold are uploaded with a single `PUT`.
/// Larger files are split into chunks, each uploaded with its own `PUT` and
/// its own link, one after the other. Failures are never retried.
///
/// # Example
/// ```no_run
/// # use presigned_upload::{HttpLinkProvider, NoProgress, UploadTarget, Uploader};
/// # tokio_test::block_on(async {
/// let provider = HttpLinkProvider::builder()
///     .with_endpoint("https://metadata.example.com")
///     .with_token("my-token")
///     .build()?;
/// let uploader = Uploader::new(provider)?;
/// let receipt = uploader
///     .upload_file("reads.fastq", &UploadTarget::new("group-123"), &NoProgress)
///     .await?;
/// println!("uploaded {} with {} parts", receipt.descriptor.filename, receipt.parts.len());
/// # anyhow::Ok(()) });
/// ```
#[derive(Clone, Debug)]
pub struct Uploader<P> {
    provider: P,
    uploader: PartUploader,
    threshold: u64,
    chunk_size: usize,
    abort_on_failure: bool,
}

impl<P> Uploader<P>
where
    P: LinkProvider,
{
    /// Creates an uploader with the default configuration.
    pub fn new(provider: P) -> std::result::Result<Self, BuilderError> {
        Self::builder(provider).build()
    }

    /// Returns a builder to configure the uploader.
    pub fn builder(provider: P) -> UploaderBuilder<P> {
        UploaderBuilder::new(provider)
    }

    /// The link provider used by this uploader.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Uploads the file at `path` into `target`.
    ///
    /// The observer receives a notification before the first byte is sent,
    /// and after each part is accepted.
    pub async fn upload_file<Q>(
        &self,
        path: Q,
        target: &UploadTarget,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadReceipt>
    where
        Q: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await.map_err(Error::io)?;
        let metadata = file.metadata().await.map_err(Error::io)?;
        let descriptor = FileDescriptor::from_metadata(path, &metadata)?;

        let mut session = UploadSession::new(target.clone(), descriptor);
        let strategy = session
            .choose_strategy(self.threshold)
            .map_err(Error::invalid_argument)?;
        tracing::debug!(
            "starting {strategy} upload for {} ({} bytes) into {target}",
            path.display(),
            session.descriptor().content_length
        );

        let result = match strategy {
            Strategy::Single => self.upload_single(&mut session, file, observer).await,
            Strategy::Multipart => self.upload_multipart(&mut session, file, observer).await,
        };
        match result {
            Ok(receipt) => {
                tracing::info!(
                    "uploaded {} ({} bytes, {} parts)",
                    receipt.descriptor.filename,
                    receipt.descriptor.content_length,
                    receipt.parts.len().max(1)
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::debug!(
                    "upload failed in state {}, object={:?}: {e}",
                    session.state(),
                    session.object_id()
                );
                if let Some(object_id) = session.fail() {
                    if self.abort_on_failure {
                        self.abort(&object_id).await;
                    }
                }
                Err(e)
            }
        }
    }

    /// Uploads each file in `paths` into `target`, in order.
    ///
    /// Stops at the first failure. Files uploaded before the failure remain
    /// uploaded.
    pub async fn upload_files<I, Q>(
        &self,
        paths: I,
        target: &UploadTarget,
        observer: &dyn ProgressObserver,
    ) -> Result<Vec<UploadReceipt>>
    where
        I: IntoIterator<Item = Q>,
        Q: AsRef<Path>,
    {
        let mut receipts = Vec::new();
        for path in paths {
            receipts.push(self.upload_file(path, target, observer).await?);
        }
        Ok(receipts)
    }

    async fn upload_single(
        &self,
        session: &mut UploadSession,
        file: tokio::fs::File,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadReceipt> {
        session
            .begin_single()
            .map_err(Error::invalid_argument)?;
        let size = session.descriptor().content_length;
        let mut progress = ProgressTracker::new(size);
        progress.start(observer);

        // Read one byte past the expected size to detect files that grew.
        let mut buffer = Vec::with_capacity(size as usize);
        file.take(size.saturating_add(1))
            .read_to_end(&mut buffer)
            .await
            .map_err(Error::io)?;
        if buffer.len() as u64 != size {
            return Err(Error::io(format!(
                "{} changed while uploading, expected {size} bytes",
                session.descriptor().filename
            )));
        }

        let link = self
            .provider
            .request_single_upload_link(session.descriptor(), session.target())
            .await
            .map_err(Error::link_request)?;
        let etag = self
            .uploader
            .upload_single(&link, Bytes::from(buffer))
            .await?;
        progress.part_completed(size, observer);
        session.finish().map_err(Error::invalid_argument)?;

        Ok(UploadReceipt {
            descriptor: session.descriptor().clone(),
            strategy: Strategy::Single,
            object_id: None,
            parts: Vec::new(),
            etag,
        })
    }

    async fn upload_multipart(
        &self,
        session: &mut UploadSession,
        file: tokio::fs::File,
        observer: &dyn ProgressObserver,
    ) -> Result<UploadReceipt> {
        let size = session.descriptor().content_length;
        let mut reader = ChunkReader::new(file, self.chunk_size)?;
        let object_id = self
            .provider
            .init_multipart_upload(session.descriptor(), session.target())
            .await
            .map_err(Error::link_request)?;
        session
            .begin_multipart(object_id.clone())
            .map_err(Error::invalid_argument)?;
        tracing::debug!("multipart upload {object_id} started");

        let mut progress = ProgressTracker::new(size);
        progress.start(observer);
        while let Some(chunk) = reader.next().await {
            let chunk = chunk?;
            if reader.bytes_read() > size {
                return Err(size_changed(session.descriptor(), reader.bytes_read()));
            }
            let part_number = chunk.part_number;
            let len = chunk.len() as u64;
            let link = self
                .provider
                .request_part_upload_link(&object_id, part_number, len)
                .await
                .map_err(Error::link_request)?;
            let part = self.uploader.upload_part(&link, chunk).await?;
            session
                .record_part(part)
                .map_err(|e| Error::upload(Some(part_number), None, e))?;
            progress.part_completed(len, observer);
            tracing::debug!("part {part_number} of {object_id} uploaded ({len} bytes)");
        }
        if reader.bytes_read() != size {
            return Err(size_changed(session.descriptor(), reader.bytes_read()));
        }

        let expected = reader.next_part_number() - 1;
        let parts = session.begin_finalize(expected).map_err(Error::finalize)?;
        self.provider
            .finalize_multipart_upload(&object_id, &parts)
            .await
            .map_err(Error::finalize)?;
        session.finish().map_err(Error::invalid_argument)?;

        Ok(UploadReceipt {
            descriptor: session.descriptor().clone(),
            strategy: Strategy::Multipart,
            object_id: Some(object_id),
            parts,
            etag: None,
        })
    }

    async fn abort(&self, object_id: &ObjectId) {
        match self.provider.abort_multipart_upload(object_id).await {
            Ok(()) => tracing::debug!("multipart upload {object_id} aborted"),
            Err(e) => tracing::warn!("cannot abort multipart upload {object_id}: {e}"),
        }
    }
}

fn size_changed(descriptor: &FileDescriptor, read: u64) -> Error {
    Error::io(format!(
        "{} changed while uploading, expected {} bytes, read {read}",
        descriptor.filename, descriptor.content_length
    ))
}

/// Configures an [Uploader].
///
/// # Example
/// ```
/// # use presigned_upload::{HttpLinkProvider, Uploader};
/// let provider = HttpLinkProvider::builder()
///     .with_endpoint("https://metadata.example.com")
///     .with_token("my-token")
///     .build()?;
/// let uploader = Uploader::builder(provider)
///     .with_abort_on_failure(true)
///     .build()?;
/// # anyhow::Ok(())
/// ```
#[derive(Debug)]
pub struct UploaderBuilder<P> {
    provider: P,
    threshold: u64,
    chunk_size: usize,
    abort_on_failure: bool,
    client: Option<reqwest::Client>,
}

impl<P> UploaderBuilder<P>
where
    P: LinkProvider,
{
    fn new(provider: P) -> Self {
        Self {
            provider,
            threshold: MULTIPART_THRESHOLD,
            chunk_size: CHUNK_SIZE,
            abort_on_failure: false,
            client: None,
        }
    }

    /// Files larger than this use multipart uploads.
    ///
    /// The default is [MULTIPART_THRESHOLD]. Only change it if the service
    /// validates uploads against a different value.
    pub fn with_threshold(mut self, v: u64) -> Self {
        self.threshold = v;
        self
    }

    /// The size of each part in a multipart upload.
    ///
    /// The default is [CHUNK_SIZE].
    pub fn with_chunk_size(mut self, v: usize) -> Self {
        self.chunk_size = v;
        self
    }

    /// Abort multipart uploads that fail after they start.
    ///
    /// Disabled by default, failed multipart uploads are left unfinalized for
    /// the service to expire.
    pub fn with_abort_on_failure(mut self, v: bool) -> Self {
        self.abort_on_failure = v;
        self
    }

    /// The HTTP client used to send data to the presigned links.
    pub fn with_http_client(mut self, v: reqwest::Client) -> Self {
        self.client = Some(v);
        self
    }

    pub fn build(self) -> std::result::Result<Uploader<P>, BuilderError> {
        if self.chunk_size == 0 {
            return Err(BuilderError::InvalidChunkSize);
        }
        let client = match self.client {
            Some(c) => c,
            None => reqwest::Client::builder()
                .build()
                .map_err(|e| BuilderError::Transport(e.into()))?,
        };
        Ok(Uploader {
            provider: self.provider,
            uploader: PartUploader::new(client),
            threshold: self.threshold,
            chunk_size: self.chunk_size,
            abort_on_failure: self.abort_on_failure,
        })
    }
}
