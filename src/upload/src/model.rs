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

//! Values exchanged between the uploader and the link provider.

use crate::Result;
use crate::error::Error;
use crate::strategy::Strategy;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identifies where the uploaded bytes attach.
///
/// This is typically the id of an object group within a dataset version. The
/// uploader never interprets its contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadTarget(String);

impl UploadTarget {
    pub fn new<V: Into<String>>(v: V) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The service-assigned identifier of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new<V: Into<String>>(v: V) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The metadata sent to the service when an upload starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct FileDescriptor {
    /// The final component of the source file path.
    pub filename: String,
    /// The size of the file in bytes.
    pub content_length: u64,
    /// The file extension, including the leading `.`, or empty.
    pub filetype: String,
    /// When the upload was started.
    pub created: DateTime<Utc>,
}

impl FileDescriptor {
    /// Describes a file with the given name and size, created now.
    ///
    /// # Example
    /// ```
    /// # use presigned_upload::FileDescriptor;
    /// let descriptor = FileDescriptor::new("reads.fastq", 1024);
    /// assert_eq!(descriptor.filetype, ".fastq");
    /// ```
    pub fn new<V: Into<String>>(filename: V, content_length: u64) -> Self {
        let filename = filename.into();
        let filetype = extension(&filename).to_string();
        Self {
            filename,
            content_length,
            filetype,
            created: Utc::now(),
        }
    }

    /// Replaces the creation timestamp.
    pub fn with_created(mut self, v: DateTime<Utc>) -> Self {
        self.created = v;
        self
    }

    /// Describes the file at `path`, querying its size from the filesystem.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(Error::io)?;
        Self::from_metadata(path, &metadata)
    }

    pub(crate) fn from_metadata(path: &Path, metadata: &std::fs::Metadata) -> Result<Self> {
        if !metadata.is_file() {
            return Err(Error::io(format!("{} is not a regular file", path.display())));
        }
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::io(format!("{} has no file name", path.display())))?;
        Ok(Self::new(filename, metadata.len()))
    }
}

fn extension(filename: &str) -> &str {
    filename.rfind('.').map(|i| &filename[i..]).unwrap_or_default()
}

/// A contiguous range of the source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Starts at 1 and increases by one for each chunk.
    pub part_number: u32,
    /// The position of the first byte within the file.
    pub offset: u64,
    pub data: Bytes,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A short-lived URL accepting a single `PUT`.
#[derive(Clone, Debug, PartialEq)]
pub struct PresignedLink {
    pub url: String,
    /// The part this link uploads, `None` for single-shot uploads.
    pub part_number: Option<u32>,
    /// The multipart upload this link belongs to.
    pub object_id: Option<ObjectId>,
}

impl PresignedLink {
    /// A link to upload a whole file.
    pub fn single<V: Into<String>>(url: V) -> Self {
        Self {
            url: url.into(),
            part_number: None,
            object_id: None,
        }
    }

    /// A link to upload one part of a multipart upload.
    pub fn part<V: Into<String>>(url: V, object_id: ObjectId, part_number: u32) -> Self {
        Self {
            url: url.into(),
            part_number: Some(part_number),
            object_id: Some(object_id),
        }
    }
}

/// A part accepted by the object storage service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    pub part_number: u32,
    /// The entity tag, without any surrounding quotes.
    pub etag: String,
}

impl CompletedPart {
    pub fn new<V: Into<String>>(part_number: u32, etag: V) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

/// The result of a successful upload.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct UploadReceipt {
    pub descriptor: FileDescriptor,
    pub strategy: Strategy,
    /// The multipart upload id, `None` for single-shot uploads.
    pub object_id: Option<ObjectId>,
    /// The finalized parts in ascending order, empty for single-shot uploads.
    pub parts: Vec<CompletedPart>,
    /// The entity tag of a single-shot upload, when the service returned one.
    pub etag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    #[test_case("reads.fastq", ".fastq")]
    #[test_case("archive.tar.gz", ".gz")]
    #[test_case("README", "")]
    #[test_case(".bashrc", ".bashrc")]
    #[test_case("trailing.", ".")]
    fn filetype(name: &str, want: &str) {
        let descriptor = FileDescriptor::new(name, 0);
        assert_eq!(descriptor.filetype, want);
        assert_eq!(descriptor.filename, name);
    }

    #[test]
    fn descriptor_json() -> TestResult {
        let created = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")?.with_timezone(&Utc);
        let descriptor = FileDescriptor::new("a.csv", 42).with_created(created);
        let got = serde_json::to_value(&descriptor)?;
        let want = serde_json::json!({
            "filename": "a.csv",
            "contentLength": 42,
            "filetype": ".csv",
            "created": "2025-03-01T10:00:00Z",
        });
        assert_eq!(got, want);
        Ok(())
    }

    #[tokio::test]
    async fn from_path() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sample.bin");
        tokio::fs::write(&path, vec![0_u8; 1234]).await?;

        let descriptor = FileDescriptor::from_path(&path).await?;
        assert_eq!(descriptor.filename, "sample.bin");
        assert_eq!(descriptor.content_length, 1234);
        assert_eq!(descriptor.filetype, ".bin");
        Ok(())
    }

    #[tokio::test]
    async fn from_path_missing() -> TestResult {
        let dir = tempfile::tempdir()?;
        let err = FileDescriptor::from_path(dir.path().join("missing"))
            .await
            .expect_err("missing files should fail");
        assert!(err.is_io(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn from_path_directory() -> TestResult {
        let dir = tempfile::tempdir()?;
        let err = FileDescriptor::from_path(dir.path())
            .await
            .expect_err("directories should fail");
        assert!(err.is_io(), "{err:?}");
        Ok(())
    }

    #[test]
    fn completed_part_json() -> TestResult {
        let got = serde_json::to_value(CompletedPart::new(3, "abc"))?;
        assert_eq!(got, serde_json::json!({"partNumber": 3, "etag": "abc"}));
        Ok(())
    }

    #[test]
    fn links() {
        let link = PresignedLink::single("https://example.com/a");
        assert_eq!(link.part_number, None);
        assert_eq!(link.object_id, None);

        let link = PresignedLink::part("https://example.com/b", ObjectId::new("obj-1"), 4);
        assert_eq!(link.part_number, Some(4));
        assert_eq!(link.object_id, Some(ObjectId::new("obj-1")));
    }
}
