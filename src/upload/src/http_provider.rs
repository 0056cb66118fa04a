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

//! A [LinkProvider] and [DatasetBackend] for the HTTP metadata service.

use crate::dataset::{DatasetBackend, DatasetVersion};
use crate::error::{BackendError, BuilderError};
use crate::link_provider::LinkProvider;
use crate::model::{CompletedPart, FileDescriptor, ObjectId, PresignedLink, UploadTarget};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// The header carrying the API token in every request.
pub const TOKEN_HEADER: &str = "UserAPIToken";

type Result<T> = std::result::Result<T, BackendError>;

/// Talks to the metadata service over HTTP and JSON.
///
/// Cloning this type is cheap, all clones share the same connection pool.
///
/// # Example
/// ```
/// # use presigned_upload::HttpLinkProvider;
/// let provider = HttpLinkProvider::builder()
///     .with_endpoint("https://metadata.example.com")
///     .with_token("my-token")
///     .with_timeout(std::time::Duration::from_secs(30))
///     .build()?;
/// # anyhow::Ok(())
/// ```
#[derive(Clone, Debug)]
pub struct HttpLinkProvider {
    inner: Arc<HttpLinkProviderInner>,
}

struct HttpLinkProviderInner {
    client: reqwest::Client,
    endpoint: url::Url,
    token: String,
}

// Never print the token.
impl std::fmt::Debug for HttpLinkProviderInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLinkProviderInner")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"[censored]")
            .finish()
    }
}

impl HttpLinkProvider {
    /// Returns a builder for [HttpLinkProvider].
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    fn url(&self, segments: &[&str]) -> url::Url {
        let mut url = self.inner.endpoint.clone();
        // The endpoint is validated as a base URL when the client is built.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = builder
            .header(TOKEN_HEADER, &self.inner.token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.into()))?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("cannot read the body of a {status} response: {e}");
                    format!("[response body unavailable: {e}]")
                }
            };
            return Err(BackendError::Status {
                code: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn post<B, R>(&self, segments: &[&str], body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(segments);
        tracing::debug!("POST {url}");
        let builder = self.inner.client.post(url).json(body);
        let response = self.send(builder).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.into()))?;
        if bytes.is_empty() {
            return serde_json::from_slice(b"{}").map_err(|e| BackendError::Deserialize(e.into()));
        }
        serde_json::from_slice(&bytes).map_err(|e| BackendError::Deserialize(e.into()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateObjectRequest<'a> {
    object: &'a FileDescriptor,
    object_group_id: &'a UploadTarget,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartLinkRequest {
    part_number: u32,
    content_length: u64,
}

#[derive(Serialize)]
struct FinishRequest<'a> {
    parts: &'a [CompletedPart],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateObjectGroupRequest<'a> {
    name: &'a str,
    dataset_version_ids: [&'a str; 1],
}

#[derive(Serialize)]
struct VersionStatusRequest {
    status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentVersionRequest<'a> {
    dataset_version_id: &'a str,
    stage: &'static str,
}

#[derive(Deserialize)]
struct LinkResponse {
    link: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitResponse {
    object_id: ObjectId,
}

#[derive(Deserialize)]
struct ObjectGroupResponse {
    id: String,
}

/// Responses without a payload.
#[derive(Deserialize)]
struct Empty {}

impl LinkProvider for HttpLinkProvider {
    type Error = BackendError;

    async fn request_single_upload_link(
        &self,
        descriptor: &FileDescriptor,
        target: &UploadTarget,
    ) -> Result<PresignedLink> {
        let request = CreateObjectRequest {
            object: descriptor,
            object_group_id: target,
        };
        let response: LinkResponse = self.post(&["v1", "uploads"], &request).await?;
        Ok(PresignedLink::single(response.link))
    }

    async fn init_multipart_upload(
        &self,
        descriptor: &FileDescriptor,
        target: &UploadTarget,
    ) -> Result<ObjectId> {
        let request = CreateObjectRequest {
            object: descriptor,
            object_group_id: target,
        };
        let response: InitResponse = self.post(&["v1", "multipart-uploads"], &request).await?;
        Ok(response.object_id)
    }

    async fn request_part_upload_link(
        &self,
        object_id: &ObjectId,
        part_number: u32,
        content_length: u64,
    ) -> Result<PresignedLink> {
        let request = PartLinkRequest {
            part_number,
            content_length,
        };
        let response: LinkResponse = self
            .post(
                &["v1", "multipart-uploads", object_id.as_str(), "parts"],
                &request,
            )
            .await?;
        Ok(PresignedLink::part(
            response.link,
            object_id.clone(),
            part_number,
        ))
    }

    async fn finalize_multipart_upload(
        &self,
        object_id: &ObjectId,
        parts: &[CompletedPart],
    ) -> Result<()> {
        let action = format!("{object_id}:finish");
        let _: Empty = self
            .post(&["v1", "multipart-uploads", &action], &FinishRequest { parts })
            .await?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, object_id: &ObjectId) -> Result<()> {
        let url = self.url(&["v1", "multipart-uploads", object_id.as_str()]);
        tracing::debug!("DELETE {url}");
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }
}

impl DatasetBackend for HttpLinkProvider {
    type Error = BackendError;

    async fn create_object_group(
        &self,
        version: &DatasetVersion,
        name: &str,
    ) -> Result<UploadTarget> {
        let request = CreateObjectGroupRequest {
            name,
            dataset_version_ids: [version.version_id()],
        };
        let response: ObjectGroupResponse = self
            .post(
                &["v1", "datasets", version.dataset_id(), "object-groups"],
                &request,
            )
            .await?;
        Ok(UploadTarget::new(response.id))
    }

    async fn mark_version_available(&self, version: &DatasetVersion) -> Result<()> {
        let action = format!("{}:status", version.version_id());
        let request = VersionStatusRequest {
            status: "AVAILABLE",
        };
        let _: Empty = self
            .post(&["v1", "dataset-versions", &action], &request)
            .await?;
        Ok(())
    }

    async fn set_current_version(&self, version: &DatasetVersion) -> Result<()> {
        let action = format!("{}:current-version", version.dataset_id());
        let request = CurrentVersionRequest {
            dataset_version_id: version.version_id(),
            stage: "STABLE",
        };
        let _: Empty = self.post(&["v1", "datasets", &action], &request).await?;
        Ok(())
    }
}

/// A builder for [HttpLinkProvider].
#[derive(Clone, Debug, Default)]
pub struct ClientBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Sets the metadata service endpoint, e.g. `https://metadata.example.com`.
    pub fn with_endpoint<V: Into<String>>(mut self, v: V) -> Self {
        self.endpoint = Some(v.into());
        self
    }

    /// Sets the API token sent in the [TOKEN_HEADER] header.
    pub fn with_token<V: Into<String>>(mut self, v: V) -> Self {
        self.token = Some(v.into());
        self
    }

    /// Sets a timeout for each request to the metadata service.
    ///
    /// By default requests have no timeout. This applies only to clients
    /// created by the builder, see [with_http_client][Self::with_http_client].
    pub fn with_timeout(mut self, v: Duration) -> Self {
        self.timeout = Some(v);
        self
    }

    /// Uses an existing HTTP client instead of creating a new one.
    pub fn with_http_client(mut self, v: reqwest::Client) -> Self {
        self.client = Some(v);
        self
    }

    pub fn build(self) -> std::result::Result<HttpLinkProvider, BuilderError> {
        let endpoint = self.endpoint.ok_or(BuilderError::MissingEndpoint)?;
        let parsed = url::Url::parse(&endpoint).map_err(|e| BuilderError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            source: Some(e),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(BuilderError::InvalidEndpoint {
                endpoint,
                source: None,
            });
        }
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or(BuilderError::MissingToken)?;
        let client = match self.client {
            Some(c) => c,
            None => {
                let builder = reqwest::Client::builder();
                let builder = match self.timeout {
                    Some(t) => builder.timeout(t),
                    None => builder,
                };
                builder
                    .build()
                    .map_err(|e| BuilderError::Transport(e.into()))?
            }
        };
        Ok(HttpLinkProvider {
            inner: Arc::new(HttpLinkProviderInner {
                client,
                endpoint: parsed,
                token,
            }),
        })
    }
}
