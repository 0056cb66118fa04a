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

//! Errors returned by the upload functions.
//!
//! Every failed upload returns a single [Error]. Applications classify it with
//! the predicates ([Error::is_io], [Error::is_link_request],
//! [Error::is_upload], [Error::is_finalize]) and, for data plane failures,
//! inspect [Error::part_number] and [Error::http_status_code]. The underlying
//! cause is always available via [std::error::Error::source].

/// The boxed error type used to carry the underlying cause of an [Error].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The core error returned by all upload operations.
///
/// None of these errors are retried by this crate. An upload that fails must
/// be started again from the beginning, which creates a new multipart upload
/// on the service.
///
/// # Troubleshooting
///
/// - [is_io()][Error::is_io]: the source file could not be opened, queried, or
///   read. Verify the file exists, is readable, and did not change while the
///   upload was running.
/// - [is_link_request()][Error::is_link_request]: the service refused to issue
///   a presigned link or to start a multipart upload. Check the token and the
///   upload target.
/// - [is_upload()][Error::is_upload]: the object storage service rejected a
///   `PUT`, the connection failed, or the response lacked an entity tag. A
///   `403` usually means the presigned link expired.
/// - [is_finalize()][Error::is_finalize]: all the parts were uploaded, but the
///   service could not assemble them.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: BoxError,
}

impl Error {
    /// The source file could not be opened, queried, or read.
    ///
    /// # Example
    /// ```
    /// # use presigned_upload::Error;
    /// let error = Error::io(std::io::Error::other("disk on fire"));
    /// assert!(error.is_io());
    /// ```
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Io, source)
    }

    /// Returns true if the source file could not be read.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// A request to the link provider failed.
    pub fn link_request<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::LinkRequest, source)
    }

    /// Returns true if a request for a presigned link failed.
    ///
    /// This includes failures to start a multipart upload.
    pub fn is_link_request(&self) -> bool {
        matches!(self.kind, ErrorKind::LinkRequest)
    }

    /// A `PUT` to a presigned link failed.
    ///
    /// The `part` is `None` for single-shot uploads. The `status` is `None`
    /// when the request never produced a response.
    pub fn upload<T: Into<BoxError>>(part: Option<u32>, status: Option<u16>, source: T) -> Self {
        Self::new(ErrorKind::Upload { part, status }, source)
    }

    /// Returns true if the transfer of a file or part failed.
    pub fn is_upload(&self) -> bool {
        matches!(self.kind, ErrorKind::Upload { .. })
    }

    /// The multipart upload could not be finalized.
    pub fn finalize<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Finalize, source)
    }

    /// Returns true if the multipart upload could not be finalized.
    pub fn is_finalize(&self) -> bool {
        matches!(self.kind, ErrorKind::Finalize)
    }

    /// A dataset bookkeeping request failed.
    pub fn dataset<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::Dataset, source)
    }

    /// Returns true if the service could not update the dataset.
    ///
    /// Only returned by [upload_dataset_version][crate::upload_dataset_version],
    /// when creating the object group or publishing the dataset version fails.
    pub fn is_dataset(&self) -> bool {
        matches!(self.kind, ErrorKind::Dataset)
    }

    /// The application provided an invalid configuration value.
    pub fn invalid_argument<T: Into<BoxError>>(source: T) -> Self {
        Self::new(ErrorKind::InvalidArgument, source)
    }

    /// Returns true if the upload was rejected before any I/O took place.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidArgument)
    }

    /// The part number of the failed transfer, if known.
    pub fn part_number(&self) -> Option<u32> {
        match &self.kind {
            ErrorKind::Upload { part, .. } => *part,
            _ => None,
        }
    }

    /// The HTTP status code returned by the object storage service, if any.
    ///
    /// # Example
    /// ```
    /// # use presigned_upload::Error;
    /// # use presigned_upload::error::UploadError;
    /// let error = Error::upload(
    ///     Some(2),
    ///     Some(403),
    ///     UploadError::UnexpectedStatus { status: 403, part: Some(2) },
    /// );
    /// assert_eq!(error.http_status_code(), Some(403));
    /// assert_eq!(error.part_number(), Some(2));
    /// ```
    pub fn http_status_code(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Upload { status, .. } => *status,
            _ => None,
        }
    }

    fn new<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let e = &self.source;
        match &self.kind {
            ErrorKind::Io => write!(f, "cannot read the source file: {e}"),
            ErrorKind::LinkRequest => write!(f, "cannot obtain a presigned link: {e}"),
            ErrorKind::Upload { part: Some(p), .. } => {
                write!(f, "the upload of part {p} failed: {e}")
            }
            ErrorKind::Upload { part: None, .. } => write!(f, "the upload failed: {e}"),
            ErrorKind::Finalize => write!(f, "cannot finalize the multipart upload: {e}"),
            ErrorKind::Dataset => write!(f, "cannot update the dataset: {e}"),
            ErrorKind::InvalidArgument => write!(f, "invalid argument: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref() as &(dyn std::error::Error))
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ErrorKind {
    Io,
    LinkRequest,
    Upload {
        part: Option<u32>,
        status: Option<u16>,
    },
    Finalize,
    Dataset,
    InvalidArgument,
}

/// Details about a failed `PUT` to a presigned link.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum UploadError {
    /// The object storage service returned something other than `200 OK`.
    #[error("unexpected HTTP status {status}{}", part_suffix(.part))]
    UnexpectedStatus { status: u16, part: Option<u32> },

    /// The response was successful but did not include an `ETag` header.
    #[error("the response is missing 'etag', a required header{}", part_suffix(.part))]
    MissingEntityTag { part: Option<u32> },

    /// The `ETag` header was present but unusable.
    #[error("the 'etag' header is empty or not valid ASCII{}", part_suffix(.part))]
    InvalidEntityTag { part: Option<u32> },

    /// The request could not be sent or the response could not be received.
    #[error("cannot send the request{}", part_suffix(.part))]
    Transport {
        part: Option<u32>,
        #[source]
        source: BoxError,
    },
}

fn part_suffix(part: &Option<u32>) -> String {
    part.map(|p| format!(" for part {p}")).unwrap_or_default()
}

/// Errors returned by [HttpLinkProvider][crate::HttpLinkProvider].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// The request could not be sent or the response could not be received.
    #[error("cannot send the request to the metadata service")]
    Transport(#[source] BoxError),

    /// The metadata service returned an error status.
    #[error("the metadata service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The response could not be parsed.
    #[error("cannot deserialize the metadata service response")]
    Deserialize(#[source] BoxError),
}

impl BackendError {
    /// The HTTP status code returned by the metadata service, if any.
    pub fn http_status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors creating an [HttpLinkProvider][crate::HttpLinkProvider].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BuilderError {
    #[error("an endpoint is required, use `with_endpoint()` to set it")]
    MissingEndpoint,
    #[error("the endpoint `{endpoint}` is not a valid base URL")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: Option<url::ParseError>,
    },
    #[error("an API token is required, use `with_token()` to set it")]
    MissingToken,
    #[error("the chunk size must be positive")]
    InvalidChunkSize,
    #[error("could not initialize transport client")]
    Transport(#[source] BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use test_case::test_case;

    #[test]
    fn io() {
        let error = Error::io(std::io::Error::other("bad sector"));
        assert!(error.is_io(), "{error:?}");
        assert!(!error.is_upload(), "{error:?}");
        assert_eq!(error.part_number(), None);
        assert_eq!(error.http_status_code(), None);
        let fmt = error.to_string();
        assert!(fmt.contains("bad sector"), "{fmt}");
        assert!(error.source().is_some(), "{error:?}");
    }

    #[test]
    fn upload_with_part() {
        let error = Error::upload(
            Some(2),
            Some(403),
            UploadError::UnexpectedStatus {
                status: 403,
                part: Some(2),
            },
        );
        assert!(error.is_upload(), "{error:?}");
        assert_eq!(error.part_number(), Some(2));
        assert_eq!(error.http_status_code(), Some(403));
        let fmt = error.to_string();
        assert!(fmt.contains("part 2"), "{fmt}");
        assert!(fmt.contains("403"), "{fmt}");
        let source = error
            .source()
            .and_then(|e| e.downcast_ref::<UploadError>());
        assert!(
            matches!(source, Some(UploadError::UnexpectedStatus { status: 403, .. })),
            "{error:?}"
        );
    }

    #[test_case(Error::io("e"), true, false, false, false)]
    #[test_case(Error::link_request("e"), false, true, false, false)]
    #[test_case(Error::upload(None, None, "e"), false, false, true, false)]
    #[test_case(Error::finalize("e"), false, false, false, true)]
    fn predicates(error: Error, io: bool, link: bool, upload: bool, finalize: bool) {
        assert_eq!(error.is_io(), io, "{error:?}");
        assert_eq!(error.is_link_request(), link, "{error:?}");
        assert_eq!(error.is_upload(), upload, "{error:?}");
        assert_eq!(error.is_finalize(), finalize, "{error:?}");
        assert!(!error.is_dataset(), "{error:?}");
        assert!(!error.is_invalid_argument(), "{error:?}");
    }

    #[test]
    fn upload_error_display() {
        let fmt = UploadError::MissingEntityTag { part: Some(7) }.to_string();
        assert!(fmt.contains("etag"), "{fmt}");
        assert!(fmt.contains("part 7"), "{fmt}");

        let fmt = UploadError::MissingEntityTag { part: None }.to_string();
        assert!(!fmt.contains("part"), "{fmt}");
    }

    #[test]
    fn backend_error() {
        let error = BackendError::Status {
            code: 404,
            body: "no such dataset".into(),
        };
        assert_eq!(error.http_status_code(), Some(404));
        let fmt = error.to_string();
        assert!(fmt.contains("404"), "{fmt}");
        assert!(fmt.contains("no such dataset"), "{fmt}");

        let error = BackendError::Transport("connection reset".into());
        assert_eq!(error.http_status_code(), None);
    }
}
