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

//! Upload a set of files as the contents of a dataset version.
//!
//! Uploading into a dataset version takes three steps. First, create an
//! object group attached to the version. Then, upload every file into that
//! object group. Finally, mark the version as available and make it the
//! current version of the dataset. [upload_dataset_version] runs the
//! sequence, using a [DatasetBackend] for the bookkeeping.

use crate::Result;
use crate::error::Error;
use crate::link_provider::LinkProvider;
use crate::model::{UploadReceipt, UploadTarget};
use crate::progress::ProgressObserver;
use crate::upload::Uploader;
use std::path::Path;

/// Identifies a version of a dataset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetVersion {
    dataset_id: String,
    version_id: String,
}

impl DatasetVersion {
    pub fn new<D: Into<String>, V: Into<String>>(dataset_id: D, version_id: V) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            version_id: version_id.into(),
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }
}

/// Records dataset versions and their object groups.
pub trait DatasetBackend: std::fmt::Debug + Send + Sync {
    /// The error type returned by all operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Creates an object group attached to `version` and returns it as an
    /// upload target.
    fn create_object_group(
        &self,
        version: &DatasetVersion,
        name: &str,
    ) -> impl Future<Output = std::result::Result<UploadTarget, Self::Error>> + Send;

    /// Marks `version` as available, all its objects are uploaded.
    fn mark_version_available(
        &self,
        version: &DatasetVersion,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;

    /// Makes `version` the current version of its dataset.
    fn set_current_version(
        &self,
        version: &DatasetVersion,
    ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send;
}

/// Uploads `paths` as a new object group of `version`, then publishes the
/// version.
///
/// The files are uploaded in order and the upload stops at the first failure.
/// The version is only published once every file is uploaded. Errors from the
/// bookkeeping calls satisfy [Error::is_dataset].
///
/// # Example
/// ```no_run
/// # use presigned_upload::{DatasetVersion, HttpLinkProvider, NoProgress, Uploader};
/// # use presigned_upload::upload_dataset_version;
/// # tokio_test::block_on(async {
/// let provider = HttpLinkProvider::builder()
///     .with_endpoint("https://metadata.example.com")
///     .with_token("my-token")
///     .build()?;
/// let uploader = Uploader::new(provider.clone())?;
/// let version = DatasetVersion::new("dataset-1", "version-3");
/// let receipts = upload_dataset_version(
///     &uploader, &provider, &version, "raw-reads", ["a.fastq", "b.fastq"], &NoProgress,
/// ).await?;
/// assert_eq!(receipts.len(), 2);
/// # anyhow::Ok(()) });
/// ```
pub async fn upload_dataset_version<P, D, I, Q>(
    uploader: &Uploader<P>,
    backend: &D,
    version: &DatasetVersion,
    group_name: &str,
    paths: I,
    observer: &dyn ProgressObserver,
) -> Result<Vec<UploadReceipt>>
where
    P: LinkProvider,
    D: DatasetBackend,
    I: IntoIterator<Item = Q>,
    Q: AsRef<Path>,
{
    let target = backend
        .create_object_group(version, group_name)
        .await
        .map_err(Error::dataset)?;
    tracing::info!(
        "created object group {target} for dataset {} version {}",
        version.dataset_id(),
        version.version_id()
    );

    let receipts = uploader.upload_files(paths, &target, observer).await?;

    backend
        .mark_version_available(version)
        .await
        .map_err(Error::dataset)?;
    backend
        .set_current_version(version)
        .await
        .map_err(Error::dataset)?;
    tracing::info!(
        "dataset {} version {} is available with {} files",
        version.dataset_id(),
        version.version_id(),
        receipts.len()
    );
    Ok(receipts)
}
