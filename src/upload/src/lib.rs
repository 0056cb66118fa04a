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

//! Upload files to object storage through presigned links.
//!
//! A metadata service issues short-lived, presigned links, and this crate
//! sends the file contents to them. Small files are sent with a single `PUT`.
//! Files larger than [MULTIPART_THRESHOLD] are split into [CHUNK_SIZE] parts,
//! each sent with its own link, and then assembled by the service.
//!
//! Most applications will use [Uploader] with [HttpLinkProvider]:
//!
//! ```no_run
//! # use presigned_upload::{HttpLinkProvider, NoProgress, UploadTarget, Uploader};
//! # tokio_test::block_on(async {
//! let provider = HttpLinkProvider::builder()
//!     .with_endpoint("https://metadata.example.com")
//!     .with_token("my-token")
//!     .build()?;
//! let uploader = Uploader::new(provider)?;
//! uploader
//!     .upload_file("reads.fastq", &UploadTarget::new("group-123"), &NoProgress)
//!     .await?;
//! # anyhow::Ok(()) });
//! ```
//!
//! Applications talking to a different service implement [LinkProvider].
//!
//! This crate never retries failed requests, and uploads their parts one at a
//! time. An upload that fails must start again from the beginning.

pub mod chunk_reader;
pub mod dataset;
pub mod error;
pub mod http_provider;
pub mod link_provider;
pub mod model;
pub mod part_uploader;
pub mod progress;
mod session;
pub mod strategy;
pub mod upload;

pub use chunk_reader::ChunkReader;
pub use dataset::{DatasetBackend, DatasetVersion, upload_dataset_version};
pub use error::Error;
pub use http_provider::HttpLinkProvider;
pub use link_provider::LinkProvider;
pub use model::{
    Chunk, CompletedPart, FileDescriptor, ObjectId, PresignedLink, UploadReceipt, UploadTarget,
};
pub use part_uploader::PartUploader;
pub use progress::{ChannelProgress, NoProgress, ProgressObserver, UploadProgress};
pub use strategy::{CHUNK_SIZE, MULTIPART_THRESHOLD, Strategy};
pub use upload::{Uploader, UploaderBuilder};

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
