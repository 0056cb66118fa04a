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

mod args;

use anyhow::Result;
use args::{Args, Destination};
use clap::Parser;
use presigned_upload::{
    HttpLinkProvider, ProgressObserver, UploadProgress, Uploader, upload_dataset_version,
};
use std::io::Write;

const DESCRIPTION: &str = concat!(
    "Uploads one or more files through presigned links.",
    " Files larger than 15 MiB are sent as multipart uploads with 10 MiB parts.",
    " With --dataset and --dataset-version the files become a new object group",
    " of that version, and the version is made available once all uploads",
    " complete. With --target the files are added to an existing object group."
);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let destination = args.destination()?;
    let _guard = enable_tracing(&args);
    tracing::info!("Configuration: {args:?}");

    let mut builder = HttpLinkProvider::builder()
        .with_endpoint(&args.endpoint)
        .with_token(&args.token);
    if let Some(timeout) = args.timeout {
        builder = builder.with_timeout(timeout);
    }
    let provider = builder.build()?;
    let uploader = Uploader::builder(provider.clone())
        .with_abort_on_failure(args.abort_on_failure)
        .build()?;

    let observer = ConsoleProgress;
    let receipts = match destination {
        Destination::Target(target) => {
            uploader
                .upload_files(&args.files, &target, &observer)
                .await
        }
        Destination::Dataset(version) => {
            upload_dataset_version(
                &uploader,
                &provider,
                &version,
                &args.object_group_name,
                &args.files,
                &observer,
            )
            .await
        }
    };
    let receipts = match receipts {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("upload failed: {e}");
            return Err(e.into());
        }
    };
    for receipt in &receipts {
        tracing::info!(
            "{}: {} bytes, {} upload, object={:?}",
            receipt.descriptor.filename,
            receipt.descriptor.content_length,
            receipt.strategy,
            receipt.object_id
        );
    }
    Ok(())
}

/// Prints the upload percentage on a single terminal line.
struct ConsoleProgress;

impl ProgressObserver for ConsoleProgress {
    fn on_progress(&self, progress: UploadProgress) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\rPercentage of bytes uploaded: {:.2}%",
            progress.percentage()
        );
        if progress.is_complete() {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

fn enable_tracing(args: &Args) -> tracing::dispatcher::DefaultGuard {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_default(subscriber)
}
