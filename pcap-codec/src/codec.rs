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

//! Stream-independent halves of the readers and writers.
//!
//! The blocking and async front ends only move bytes; everything that
//! decides what those bytes mean lives here.

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::config::{CodecConfig, PayloadPolicy};
use crate::error::{Error, Result};
use crate::header::{
    FileFormat, FileHeader, RecordHeader, TimestampResolution, FILE_HEADER_LEN, MAGIC_LEN,
    RECORD_HEADER_LEN,
};
use crate::pool::{BufferPool, PooledBuffer};
use crate::record::PacketRecord;

/// Header bytes that follow the magic number.
pub(crate) type HeaderFields = [u8; FILE_HEADER_LEN - MAGIC_LEN];

enum State {
    Reading,
    Finished,
    Failed(Error),
}

/// Read-side state: the parsed header, the buffer pool and where iteration stands.
pub(crate) struct Decoder {
    header: FileHeader,
    format: FileFormat,
    config: CodecConfig,
    pool: Arc<BufferPool>,
    state: State,
}

impl Decoder {
    pub(crate) fn new(format: FileFormat, fields: &HeaderFields, config: CodecConfig) -> Decoder {
        let header = FileHeader::decode_fields(format, fields);
        debug!(
            "Parsed pcap header: version {}.{}, snaplen {}, linktype {}, {:?} byte order, {:?} timestamps",
            header.version_major,
            header.version_minor,
            header.snapshot_length,
            header.link_type,
            format.byte_order,
            format.resolution
        );
        let pool = BufferPool::new(header.snapshot_length as usize, config.max_idle_buffers);
        Decoder { header, format, config, pool, state: State::Reading }
    }

    pub(crate) fn header(&self) -> &FileHeader {
        &self.header
    }

    pub(crate) fn format(&self) -> FileFormat {
        self.format
    }

    pub(crate) fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub(crate) fn last_error(&self) -> Option<&Error> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn is_stopped(&self) -> bool {
        !matches!(self.state, State::Reading)
    }

    /// The answer to give without touching the stream once iteration has
    /// stopped: end of sequence, or the error that stopped it.
    pub(crate) fn stopped(&self) -> Option<Result<Option<PacketRecord>>> {
        match &self.state {
            State::Reading => None,
            State::Finished => Some(Ok(None)),
            State::Failed(err) => Some(Err(err.clone())),
        }
    }

    /// Interprets a record header of which `filled` bytes arrived.
    ///
    /// No bytes at all is a clean end of stream; a partial header is a
    /// short read.
    pub(crate) fn begin(
        &self,
        bytes: &[u8; RECORD_HEADER_LEN],
        filled: usize,
    ) -> Result<Option<PendingRecord>> {
        if filled == 0 {
            return Ok(None);
        }
        if filled < RECORD_HEADER_LEN {
            return Err(Error::ShortRead { expected: RECORD_HEADER_LEN, actual: filled });
        }
        let header = RecordHeader::decode(self.format.byte_order, bytes);
        if header.captured_length > self.header.snapshot_length {
            return Err(Error::CapturedLengthExceedsSnapshot {
                captured: header.captured_length,
                snapshot: self.header.snapshot_length,
            });
        }
        let buffer = self.pool.acquire();
        let payload_len = match self.config.payload_policy {
            PayloadPolicy::Exact => header.captured_length as usize,
            PayloadPolicy::Fixed => buffer.len(),
        };
        Ok(Some(PendingRecord { header, resolution: self.format.resolution, buffer, payload_len }))
    }

    /// Remembers how a read ended so that later calls repeat it.
    pub(crate) fn settle(
        &mut self,
        outcome: Result<Option<PacketRecord>>,
    ) -> Result<Option<PacketRecord>> {
        match &outcome {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("End of pcap stream");
                self.state = State::Finished;
            }
            Err(err) => self.state = State::Failed(err.clone()),
        }
        outcome
    }
}

/// A record whose header is parsed and whose payload is still to be read.
pub(crate) struct PendingRecord {
    header: RecordHeader,
    resolution: TimestampResolution,
    buffer: PooledBuffer,
    payload_len: usize,
}

impl PendingRecord {
    /// The part of the buffer the payload bytes must fill.
    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.payload_len]
    }

    pub(crate) fn finish(self) -> PacketRecord {
        PacketRecord::from_parts(&self.header, self.resolution, self.buffer)
    }
}

/// Write-side state: the header as emitted and the byte count.
pub(crate) struct Encoder {
    header: FileHeader,
    resolution: TimestampResolution,
    config: CodecConfig,
    bytes_written: u64,
}

impl Encoder {
    /// Fails with a bad-magic error unless the header names a timestamp
    /// resolution. Output is always little-endian, so the magic written is
    /// the little-endian one for that resolution.
    pub(crate) fn new(header: &FileHeader, config: CodecConfig) -> Result<Encoder> {
        let format = FileFormat::from_magic(header.magic_number)
            .ok_or(Error::BadMagic(header.magic_number))?;
        let header = FileHeader { magic_number: format.resolution.magic(), ..*header };
        Ok(Encoder { header, resolution: format.resolution, config, bytes_written: 0 })
    }

    pub(crate) fn header(&self) -> &FileHeader {
        &self.header
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn add_written(&mut self, count: u64) {
        self.bytes_written += count;
    }

    /// Captured length of a packet written from raw bytes.
    pub(crate) fn captured_length(&self, data: &[u8]) -> Result<u32> {
        let snapshot = self.header.snapshot_length;
        match u32::try_from(data.len()) {
            Ok(captured) if captured <= snapshot => Ok(captured),
            Ok(captured) => Err(Error::CapturedLengthExceedsSnapshot { captured, snapshot }),
            Err(_) => Err(Error::CapturedLengthExceedsSnapshot { captured: u32::MAX, snapshot }),
        }
    }

    /// Lays out one record. Only the first `captured_length` bytes of `data`
    /// are written; the rest of the payload area is zero-filled.
    pub(crate) fn frame<'a>(
        &self,
        timestamp: Duration,
        captured_length: u32,
        original_length: u32,
        data: &'a [u8],
    ) -> Result<Frame<'a>> {
        let snapshot = self.header.snapshot_length;
        if captured_length > snapshot {
            return Err(Error::CapturedLengthExceedsSnapshot {
                captured: captured_length,
                snapshot,
            });
        }
        let area = match self.config.payload_policy {
            PayloadPolicy::Exact => captured_length as usize,
            PayloadPolicy::Fixed => snapshot as usize,
        };
        let payload = &data[..(captured_length as usize).min(data.len())];
        let header = RecordHeader::from_timestamp(
            timestamp,
            self.resolution,
            captured_length,
            original_length,
        )?;
        Ok(Frame { header: header.to_bytes(), payload, padding: (area - payload.len()) as u64 })
    }
}

/// The bytes of one record, in write order.
pub(crate) struct Frame<'a> {
    pub(crate) header: [u8; RECORD_HEADER_LEN],
    pub(crate) payload: &'a [u8],
    /// Zero bytes that complete the payload area.
    pub(crate) padding: u64,
}

impl Frame<'_> {
    pub(crate) fn len(&self) -> u64 {
        (RECORD_HEADER_LEN + self.payload.len()) as u64 + self.padding
    }
}
