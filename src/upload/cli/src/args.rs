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

use anyhow::bail;
use clap::Parser;
use humantime::parse_duration;
use presigned_upload::{DatasetVersion, UploadTarget};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration options for the upload tool.
#[derive(Clone, Parser)]
#[command(version, about, long_about = super::DESCRIPTION)]
pub struct Args {
    /// The metadata service endpoint, e.g. `https://metadata.example.com`.
    #[arg(long, env = "UPLOAD_ENDPOINT")]
    pub endpoint: String,

    /// The API token used to authenticate with the metadata service.
    #[arg(short = 't', long, env = "UPLOAD_TOKEN", hide_env_values = true)]
    pub token: String,

    /// The files to upload.
    #[arg(short = 'f', long, num_args = 1.., required = true)]
    pub files: Vec<PathBuf>,

    /// Upload into an existing object group.
    ///
    /// The dataset version is not modified.
    #[arg(long)]
    pub target: Option<String>,

    /// The dataset receiving the files.
    ///
    /// Requires `--dataset-version`. The tool creates a new object group in
    /// this version, uploads the files into it, and then makes the version
    /// available and current.
    #[arg(short = 'd', long)]
    pub dataset: Option<String>,

    /// The dataset version receiving the files.
    #[arg(short = 'v', long)]
    pub dataset_version: Option<String>,

    /// The name of the object group created for a dataset version.
    #[arg(long, default_value = "upload")]
    pub object_group_name: String,

    /// The timeout for each request to the metadata service.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Abort multipart uploads that fail after they start.
    ///
    /// By default failed multipart uploads are left for the service to expire.
    #[arg(long, default_value_t = false)]
    pub abort_on_failure: bool,

    /// Log each request and part.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

// The token must never appear in the logs.
impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("endpoint", &self.endpoint)
            .field("token", &"[censored]")
            .field("files", &self.files)
            .field("target", &self.target)
            .field("dataset", &self.dataset)
            .field("dataset_version", &self.dataset_version)
            .field("object_group_name", &self.object_group_name)
            .field("timeout", &self.timeout)
            .field("abort_on_failure", &self.abort_on_failure)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Where the files are uploaded.
#[derive(Clone, Debug, PartialEq)]
pub enum Destination {
    Target(UploadTarget),
    Dataset(DatasetVersion),
}

impl Args {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token.is_empty() {
            bail!("the token cannot be empty")
        }
        if self.files.iter().any(|f| f.as_os_str().is_empty()) {
            bail!("empty file names are not allowed")
        }
        match (&self.target, &self.dataset, &self.dataset_version) {
            (Some(_), None, None) => {}
            (None, Some(_), Some(_)) => {}
            (Some(_), _, _) => bail!("--target cannot be combined with --dataset or --dataset-version"),
            (None, Some(_), None) => bail!("--dataset requires --dataset-version"),
            (None, None, Some(_)) => bail!("--dataset-version requires --dataset"),
            (None, None, None) => bail!("either --target or --dataset and --dataset-version are required"),
        }
        if self.object_group_name.is_empty() {
            bail!("the object group name cannot be empty")
        }
        Ok(())
    }

    pub fn destination(&self) -> anyhow::Result<Destination> {
        self.validate()?;
        match (&self.target, &self.dataset, &self.dataset_version) {
            (Some(t), _, _) => Ok(Destination::Target(UploadTarget::new(t))),
            (None, Some(d), Some(v)) => Ok(Destination::Dataset(DatasetVersion::new(d, v))),
            _ => bail!("either --target or --dataset and --dataset-version are required"),
        }
    }
}
