// Copyright 2024 Google LLC
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

use std::io::{self, Read};
use std::iter::FusedIterator;
use std::sync::Arc;

use crate::byte_order::ByteOrder;
use crate::codec::{Decoder, HeaderFields};
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::header::{FileFormat, FileHeader, TimestampResolution, MAGIC_LEN, RECORD_HEADER_LEN};
use crate::pool::BufferPool;
use crate::record::PacketRecord;

/// Reads pcap records from a blocking byte stream.
///
/// The file header is parsed on construction. Records are then pulled one
/// at a time with [`Reader::next_record`] or through the `Iterator` impl.
/// The first error stops iteration for good.
pub struct Reader<R> {
    inner: R,
    decoder: Decoder,
}

impl<R: Read> Reader<R> {
    /// Parses the file header from `inner` using the default configuration.
    ///
    /// # Arguments
    ///
    /// * `inner` - The stream to read the capture from.
    ///
    /// # Returns
    ///
    /// * `Ok(Reader)` - If a complete header with a known magic number was read.
    /// * `Err(Error)` - If the magic is unknown, the stream is short or failed.
    pub fn new(inner: R) -> Result<Self> {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Parses the file header from `inner` using `config`.
    ///
    /// The magic number is checked before anything else is read; on a bad
    /// magic the stream is left wherever it stopped.
    pub fn with_config(mut inner: R, config: CodecConfig) -> Result<Self> {
        let mut magic = [0u8; MAGIC_LEN];
        fill_exact(&mut inner, &mut magic)?;
        let format = FileFormat::detect(&magic)?;
        let mut fields: HeaderFields = Default::default();
        fill_exact(&mut inner, &mut fields)?;
        Ok(Reader { inner, decoder: Decoder::new(format, &fields, config) })
    }

    /// Reads the next record.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(PacketRecord))` - The next record in stream order.
    /// * `Ok(None)` - The stream ended cleanly at a record boundary.
    /// * `Err(Error)` - The stream is malformed or failed. The same error is
    ///   returned by every later call.
    pub fn next_record(&mut self) -> Result<Option<PacketRecord>> {
        if let Some(outcome) = self.decoder.stopped() {
            return outcome;
        }
        let outcome = self.read_record();
        self.decoder.settle(outcome)
    }

    fn read_record(&mut self) -> Result<Option<PacketRecord>> {
        let mut bytes = [0u8; RECORD_HEADER_LEN];
        let filled = fill(&mut self.inner, &mut bytes)?;
        let Some(mut pending) = self.decoder.begin(&bytes, filled)? else {
            return Ok(None);
        };
        fill_exact(&mut self.inner, pending.payload_mut())?;
        Ok(Some(pending.finish()))
    }
}

impl<R> Reader<R> {
    /// The file header as parsed.
    pub fn header(&self) -> &FileHeader {
        self.decoder.header()
    }

    /// Byte order and timestamp resolution detected from the magic number.
    pub fn format(&self) -> FileFormat {
        self.decoder.format()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.decoder.format().byte_order
    }

    pub fn resolution(&self) -> TimestampResolution {
        self.decoder.format().resolution
    }

    pub fn config(&self) -> &CodecConfig {
        self.decoder.config()
    }

    /// The pool that lends payload buffers to this reader's records.
    pub fn pool(&self) -> &Arc<BufferPool> {
        self.decoder.pool()
    }

    /// Number of payload buffers allocated so far.
    pub fn allocations(&self) -> usize {
        self.decoder.pool().allocations()
    }

    /// The error that stopped iteration, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.decoder.last_error()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Gives back the underlying stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<PacketRecord>;

    /// Yields records until the end of the stream, or yields the first error
    /// and then ends.
    fn next(&mut self) -> Option<Self::Item> {
        if self.decoder.is_stopped() {
            return None;
        }
        self.next_record().transpose()
    }
}

impl<R: Read> FusedIterator for Reader<R> {}

/// Reads until `buf` is full or the stream ends, returning the byte count.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

fn fill_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let filled = fill(reader, buf)?;
    if filled < buf.len() {
        return Err(Error::ShortRead { expected: buf.len(), actual: filled });
    }
    Ok(())
}
