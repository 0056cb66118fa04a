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

//! The interface to the service issuing presigned links.
//!
//! [HttpLinkProvider][crate::HttpLinkProvider] implements this trait for the
//! HTTP metadata service. Applications may provide their own implementation,
//! for example to talk to a different backend, or to mock the service in
//! tests.

use crate::model::{CompletedPart, FileDescriptor, ObjectId, PresignedLink, UploadTarget};

/// Issues presigned links and records multipart uploads.
///
/// The uploader calls these functions sequentially, at most one at a time for
/// each upload. Any error aborts the upload, the uploader never retries them.
/// Errors from [init_multipart_upload][LinkProvider::init_multipart_upload]
/// and the link requests surface as
/// [Error::is_link_request][crate::Error::is_link_request], errors from
/// [finalize_multipart_upload][LinkProvider::finalize_multipart_upload] as
/// [Error::is_finalize][crate::Error::is_finalize].
pub trait LinkProvider: std::fmt::Debug + Send + Sync {
    /// The error type returned by all operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns a link to upload the whole file in a single `PUT`.
    fn request_single_upload_link(
        &self,
        descriptor: &FileDescriptor,
        target: &UploadTarget,
    ) -> impl Future<Output = Result<PresignedLink, Self::Error>> + Send;

    /// Starts a multipart upload and returns its id.
    fn init_multipart_upload(
        &self,
        descriptor: &FileDescriptor,
        target: &UploadTarget,
    ) -> impl Future<Output = Result<ObjectId, Self::Error>> + Send;

    /// Returns a link to upload part `part_number` of `object_id`.
    ///
    /// Part numbers start at 1. `content_length` is the exact size of the
    /// part.
    fn request_part_upload_link(
        &self,
        object_id: &ObjectId,
        part_number: u32,
        content_length: u64,
    ) -> impl Future<Output = Result<PresignedLink, Self::Error>> + Send;

    /// Assembles the uploaded parts into the final object.
    ///
    /// `parts` is sorted by part number, starting at 1, without gaps.
    fn finalize_multipart_upload(
        &self,
        object_id: &ObjectId,
        parts: &[CompletedPart],
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Releases the resources of a multipart upload that will not complete.
    ///
    /// The default implementation does nothing, for services that expire
    /// abandoned uploads on their own.
    fn abort_multipart_upload(
        &self,
        object_id: &ObjectId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let _ = object_id;
        std::future::ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoCleanup;

    impl LinkProvider for NoCleanup {
        type Error = std::io::Error;

        async fn request_single_upload_link(
            &self,
            _descriptor: &FileDescriptor,
            _target: &UploadTarget,
        ) -> Result<PresignedLink, Self::Error> {
            Ok(PresignedLink::single("http://localhost/single"))
        }

        async fn init_multipart_upload(
            &self,
            _descriptor: &FileDescriptor,
            _target: &UploadTarget,
        ) -> Result<ObjectId, Self::Error> {
            Ok(ObjectId::new("obj"))
        }

        async fn request_part_upload_link(
            &self,
            object_id: &ObjectId,
            part_number: u32,
            _content_length: u64,
        ) -> Result<PresignedLink, Self::Error> {
            Ok(PresignedLink::part(
                format!("http://localhost/{object_id}/{part_number}"),
                object_id.clone(),
                part_number,
            ))
        }

        async fn finalize_multipart_upload(
            &self,
            _object_id: &ObjectId,
            _parts: &[CompletedPart],
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_abort_succeeds() -> anyhow::Result<()> {
        let provider = NoCleanup;
        provider
            .abort_multipart_upload(&ObjectId::new("obj"))
            .await?;
        let link = provider
            .request_part_upload_link(&ObjectId::new("obj"), 2, 10)
            .await?;
        assert_eq!(link.url, "http://localhost/obj/2");
        assert_eq!(link.part_number, Some(2));
        Ok(())
    }
}
