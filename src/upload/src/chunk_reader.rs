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
use crate::error::Error;
use crate::model::Chunk;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Splits a byte source into numbered, fixed-size chunks.
///
/// Each chunk is filled completely before it is returned, even if the source
/// returns short reads. Only the last chunk may be smaller than the chunk
/// size. A source whose length is a multiple of the chunk size produces no
/// empty trailing chunk, and an empty source produces no chunks at all.
///
/// The reader is not restartable. Once it reports the end of the data or an
/// error, every further call to [next][ChunkReader::next] returns `None`.
///
/// # Example
/// ```
/// # use presigned_upload::ChunkReader;
/// # tokio_test::block_on(async {
/// let mut reader = ChunkReader::new(&b"hello world"[..], 4)?;
/// let mut parts = Vec::new();
/// while let Some(chunk) = reader.next().await {
///     parts.push(chunk?.data);
/// }
/// assert_eq!(parts, vec!["hell", "o wo", "rld"]);
/// # Ok::<(), presigned_upload::Error>(()) });
/// ```
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    next_part: u32,
    offset: u64,
    done: bool,
}

impl<R> ChunkReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a reader producing chunks of `chunk_size` bytes.
    ///
    /// Returns an error if `chunk_size` is zero.
    pub fn new(source: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid_argument("the chunk size must be positive"));
        }
        Ok(Self {
            source,
            chunk_size,
            next_part: 1,
            offset: 0,
            done: false,
        })
    }

    /// Returns the next chunk, `None` at the end of the data.
    ///
    /// A read error is returned once, then the reader is exhausted. No chunk
    /// is produced for the bytes read before the error.
    pub async fn next(&mut self) -> Option<Result<Chunk>> {
        if self.done {
            return None;
        }
        let mut buffer = vec![0_u8; self.chunk_size];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.source.read(&mut buffer[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::io(e)));
                }
            }
        }
        if filled < self.chunk_size {
            self.done = true;
        }
        if filled == 0 {
            return None;
        }
        buffer.truncate(filled);
        let chunk = Chunk {
            part_number: self.next_part,
            offset: self.offset,
            data: Bytes::from(buffer),
        };
        self.next_part += 1;
        self.offset += filled as u64;
        Some(Ok(chunk))
    }

    /// The number of bytes returned so far.
    pub fn bytes_read(&self) -> u64 {
        self.offset
    }

    /// The part number assigned to the next chunk.
    pub fn next_part_number(&self) -> u32 {
        self.next_part
    }
}
