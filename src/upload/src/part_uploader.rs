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

use crate::Result;
use crate::error::{Error, UploadError};
use crate::model::{Chunk, CompletedPart, PresignedLink};
use bytes::Bytes;
use reqwest::header::{ETAG, HeaderValue};

/// Sends the bytes of a file or part to a presigned link.
///
/// Each call issues exactly one `PUT`. Only `200 OK` is treated as success.
#[derive(Clone, Debug)]
pub struct PartUploader {
    client: reqwest::Client,
}

impl PartUploader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Uploads a whole file.
    ///
    /// Returns the entity tag, without quotes, if the service returned one.
    pub async fn upload_single(&self, link: &PresignedLink, data: Bytes) -> Result<Option<String>> {
        self.put(&link.url, data, None).await
    }

    /// Uploads one part of a multipart upload.
    ///
    /// The response must include an entity tag, it identifies the part when
    /// the upload is finalized.
    pub async fn upload_part(&self, link: &PresignedLink, chunk: Chunk) -> Result<CompletedPart> {
        let part = chunk.part_number;
        let etag = self.put(&link.url, chunk.data, Some(part)).await?;
        let etag = etag.ok_or_else(|| {
            Error::upload(
                Some(part),
                Some(200),
                UploadError::MissingEntityTag { part: Some(part) },
            )
        })?;
        Ok(CompletedPart::new(part, etag))
    }

    async fn put(&self, url: &str, data: Bytes, part: Option<u32>) -> Result<Option<String>> {
        let response = self
            .client
            .put(url)
            .body(data)
            .send()
            .await
            .map_err(|e| {
                Error::upload(
                    part,
                    None,
                    UploadError::Transport {
                        part,
                        source: e.into(),
                    },
                )
            })?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::upload(
                part,
                Some(status),
                UploadError::UnexpectedStatus { status, part },
            ));
        }
        response
            .headers()
            .get(ETAG)
            .map(|v| parse_etag(v, part))
            .transpose()
    }
}

fn parse_etag(value: &HeaderValue, part: Option<u32>) -> Result<String> {
    let invalid = || Error::upload(part, Some(200), UploadError::InvalidEntityTag { part });
    let etag = value.to_str().map_err(|_| invalid())?.replace('"', "");
    if etag.is_empty() {
        return Err(invalid());
    }
    Ok(etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectId;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use test_case::test_case;

    type TestResult = anyhow::Result<()>;

    fn chunk(part_number: u32, data: &'static str) -> Chunk {
        Chunk {
            part_number,
            offset: 0,
            data: Bytes::from_static(data.as_bytes()),
        }
    }

    fn part_link(server: &Server, part_number: u32) -> PresignedLink {
        PresignedLink::part(
            server.url_str(&format!("/upload/part-{part_number}")),
            ObjectId::new("obj-1"),
            part_number,
        )
    }

    #[tokio::test]
    async fn upload_part() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/upload/part-1"),
                request::headers(contains(("content-length", "5"))),
                request::body("hello"),
            ])
            .respond_with(status_code(200).append_header("etag", "\"abc123\"")),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let part = uploader
            .upload_part(&part_link(&server, 1), chunk(1, "hello"))
            .await?;
        assert_eq!(part, CompletedPart::new(1, "abc123"));
        Ok(())
    }

    #[test_case("\"abc\"", "abc")]
    #[test_case("abc", "abc")]
    #[test_case("W/\"abc\"", "W/abc")]
    #[test_case("\"a\"b\"", "ab")]
    #[tokio::test]
    async fn strips_quotes(header: &'static str, want: &str) -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part-3"))
                .respond_with(status_code(200).append_header("etag", header)),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let part = uploader
            .upload_part(&part_link(&server, 3), chunk(3, "abc"))
            .await?;
        assert_eq!(part.etag, want);
        assert_eq!(part.part_number, 3);
        Ok(())
    }

    #[test_case(201)]
    #[test_case(204)]
    #[test_case(403)]
    #[test_case(500)]
    #[tokio::test]
    async fn status_other_than_ok(code: u16) -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part-2"))
                .respond_with(status_code(code).append_header("etag", "\"abc\"")),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let err = uploader
            .upload_part(&part_link(&server, 2), chunk(2, "abc"))
            .await
            .expect_err("only 200 is a success");
        assert!(err.is_upload(), "{err:?}");
        assert_eq!(err.http_status_code(), Some(code));
        assert_eq!(err.part_number(), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn missing_etag() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part-1"))
                .respond_with(status_code(200)),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let err = uploader
            .upload_part(&part_link(&server, 1), chunk(1, "abc"))
            .await
            .expect_err("parts require an entity tag");
        assert!(err.is_upload(), "{err:?}");
        assert_eq!(err.part_number(), Some(1));
        let source = std::error::Error::source(&err)
            .and_then(|e| e.downcast_ref::<UploadError>());
        assert!(
            matches!(source, Some(UploadError::MissingEntityTag { part: Some(1) })),
            "{err:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_etag() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/part-1"))
                .respond_with(status_code(200).append_header("etag", "\"\"")),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let err = uploader
            .upload_part(&part_link(&server, 1), chunk(1, "abc"))
            .await
            .expect_err("an empty entity tag is unusable");
        assert!(err.is_upload(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn upload_single() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("PUT", "/upload/file"),
                request::body("whole file"),
            ])
            .respond_with(status_code(200)),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let link = PresignedLink::single(server.url_str("/upload/file"));
        let etag = uploader
            .upload_single(&link, Bytes::from_static(b"whole file"))
            .await?;
        assert_eq!(etag, None);
        Ok(())
    }

    #[tokio::test]
    async fn upload_single_forbidden() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("PUT", "/upload/file"))
                .respond_with(status_code(403)),
        );

        let uploader = PartUploader::new(reqwest::Client::new());
        let link = PresignedLink::single(server.url_str("/upload/file"));
        let err = uploader
            .upload_single(&link, Bytes::from_static(b"abc"))
            .await
            .expect_err("403 is an error");
        assert!(err.is_upload(), "{err:?}");
        assert_eq!(err.part_number(), None);
        assert_eq!(err.http_status_code(), Some(403));
        Ok(())
    }

    #[tokio::test]
    async fn transport_error() -> TestResult {
        let uploader = PartUploader::new(reqwest::Client::new());
        let link = PresignedLink::part("http://127.0.0.1:1/upload", ObjectId::new("o"), 4);
        let err = uploader
            .upload_part(&link, chunk(4, "abc"))
            .await
            .expect_err("nothing listens on port 1");
        assert!(err.is_upload(), "{err:?}");
        assert_eq!(err.part_number(), Some(4));
        assert_eq!(err.http_status_code(), None);
        Ok(())
    }
}
