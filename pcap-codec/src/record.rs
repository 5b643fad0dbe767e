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

use std::fmt;
use std::time::Duration;

use pcap_common::util::time_display::TimeDisplay;

use crate::header::{RecordHeader, TimestampResolution};
use crate::pool::PooledBuffer;

/// One captured packet.
///
/// The payload lives in a buffer borrowed from the reader's pool and goes
/// back to the pool when the record is dropped.
#[derive(Debug)]
pub struct PacketRecord {
    /// Time of capture as an offset since the UNIX epoch.
    pub timestamp: Duration,
    /// Number of payload bytes stored in the record.
    pub captured_length: u32,
    /// Length of the packet on the wire.
    pub original_length: u32,
    buffer: PooledBuffer,
}

impl PacketRecord {
    /// Creates a record that owns its payload outright.
    ///
    /// `data` is zero-extended if it is shorter than `captured_length`. Bytes
    /// past `captured_length` stay in [`PacketRecord::buffer`] but are never
    /// written out.
    pub fn new(
        timestamp: Duration,
        captured_length: u32,
        original_length: u32,
        mut data: Vec<u8>,
    ) -> PacketRecord {
        let captured = captured_length as usize;
        if data.len() < captured {
            data.resize(captured, 0);
        }
        PacketRecord {
            timestamp,
            captured_length,
            original_length,
            buffer: PooledBuffer::detached(data),
        }
    }

    /// Creates an untruncated record: both lengths equal `data.len()`.
    pub fn from_packet(timestamp: Duration, data: Vec<u8>) -> PacketRecord {
        let length = data.len() as u32;
        PacketRecord::new(timestamp, length, length, data)
    }

    pub(crate) fn from_parts(
        header: &RecordHeader,
        resolution: TimestampResolution,
        buffer: PooledBuffer,
    ) -> PacketRecord {
        PacketRecord {
            timestamp: resolution.to_duration(header.ts_seconds, header.ts_fraction),
            captured_length: header.captured_length,
            original_length: header.original_length,
            buffer,
        }
    }

    /// The captured bytes of the packet.
    pub fn payload(&self) -> &[u8] {
        let end = (self.captured_length as usize).min(self.buffer.len());
        &self.buffer[..end]
    }

    /// The whole backing buffer, including any bytes past the captured ones.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns true if the packet was cut short when captured.
    pub fn is_truncated(&self) -> bool {
        self.original_length > self.captured_length
    }

    /// Returns true while the payload buffer is on loan from a pool.
    pub fn is_pooled(&self) -> bool {
        self.buffer.is_pooled()
    }

    /// Returns the payload buffer to its pool.
    pub fn release(self) {
        self.buffer.release()
    }

    /// Takes the captured bytes, keeping the buffer out of the pool.
    pub fn into_payload(self) -> Vec<u8> {
        let captured = self.captured_length as usize;
        let mut data = self.buffer.detach();
        data.truncate(captured);
        data
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} caplen={} len={}",
            TimeDisplay::from_epoch_offset(self.timestamp).utc_display_precise(),
            self.captured_length,
            self.original_length
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::BufferPool;

    #[test]
    fn test_new_pads_short_data() {
        let record = PacketRecord::new(Duration::ZERO, 4, 60, vec![1, 2]);
        assert_eq!(record.payload(), &[1, 2, 0, 0]);
        assert!(record.is_truncated());
        assert!(!record.is_pooled());
    }

    #[test]
    fn test_payload_excludes_padding() {
        let mut data = vec![0u8; 65535];
        data[..3].copy_from_slice(&[7, 8, 9]);
        let record = PacketRecord::new(Duration::ZERO, 3, 3, data);
        assert_eq!(record.payload(), &[7, 8, 9]);
        assert_eq!(record.buffer().len(), 65535);
        assert_eq!(record.into_payload(), vec![7, 8, 9]);
    }

    #[test]
    fn test_drop_returns_pooled_buffer() {
        let pool = BufferPool::new(32, 4);
        let header =
            RecordHeader { ts_seconds: 1, ts_fraction: 2, captured_length: 5, original_length: 9 };
        let record = PacketRecord::from_parts(&header, TimestampResolution::Micro, pool.acquire());
        assert_eq!(record.timestamp, Duration::new(1, 2000));
        assert_eq!(record.payload().len(), 5);
        assert!(record.is_pooled());
        drop(record);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_display() {
        let record = PacketRecord::from_packet(Duration::new(1112172466, 496046000), vec![0; 42]);
        assert_eq!(record.to_string(), "2005-03-30 08:47:46.496046000 caplen=42 len=42");
    }
}
