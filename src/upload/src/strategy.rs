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

/// Files larger than this many bytes use multipart uploads.
///
/// The metadata service validates uploads against the same value.
pub const MULTIPART_THRESHOLD: u64 = 1024 * 1024 * 15;

/// The size of each part in a multipart upload, except possibly the last.
pub const CHUNK_SIZE: usize = 1024 * 1024 * 10;

/// How the bytes of a file are transferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// The whole file is sent in one `PUT`.
    Single,
    /// The file is split into parts, each sent with its own `PUT`.
    Multipart,
}

impl Strategy {
    /// Selects the strategy for a file of `size` bytes.
    ///
    /// A file exactly `threshold` bytes long uses [Strategy::Single].
    ///
    /// # Example
    /// ```
    /// # use presigned_upload::{MULTIPART_THRESHOLD, Strategy};
    /// assert_eq!(Strategy::select(MULTIPART_THRESHOLD, MULTIPART_THRESHOLD), Strategy::Single);
    /// assert_eq!(Strategy::select(MULTIPART_THRESHOLD + 1, MULTIPART_THRESHOLD), Strategy::Multipart);
    /// ```
    pub fn select(size: u64, threshold: u64) -> Self {
        if size > threshold {
            Self::Multipart
        } else {
            Self::Single
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => f.write_str("single"),
            Self::Multipart => f.write_str("multipart"),
        }
    }
}
