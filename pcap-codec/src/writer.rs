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

use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;

use crate::codec::{Encoder, Frame};
use crate::config::CodecConfig;
use crate::error::Result;
use crate::header::{FileHeader, FILE_HEADER_LEN};
use crate::record::PacketRecord;

/// Writes a little-endian pcap stream to a blocking byte sink.
///
/// A failed write leaves the sink holding whatever was written before the
/// failure; nothing is rolled back.
pub struct Writer<W: Write> {
    inner: W,
    encoder: Encoder,
}

impl<W: Write> Writer<W> {
    /// Writes and flushes the file header using the default configuration.
    ///
    /// # Arguments
    ///
    /// * `inner` - The sink to write the capture to.
    /// * `header` - The file header. Its magic number selects the timestamp
    ///   resolution of every record.
    ///
    /// # Returns
    ///
    /// * `Ok(Writer)` - If the header was written.
    /// * `Err(Error)` - If the magic number is unknown or the write failed.
    pub fn new(inner: W, header: &FileHeader) -> Result<Self> {
        Self::with_config(inner, header, CodecConfig::default())
    }

    /// Writes and flushes the file header using `config`.
    pub fn with_config(mut inner: W, header: &FileHeader, config: CodecConfig) -> Result<Self> {
        let mut encoder = Encoder::new(header, config)?;
        inner.write_all(&encoder.header().to_bytes())?;
        inner.flush()?;
        encoder.add_written(FILE_HEADER_LEN as u64);
        debug!(
            "Wrote pcap header: snaplen {}, linktype {}",
            encoder.header().snapshot_length,
            encoder.header().link_type
        );
        Ok(Writer { inner, encoder })
    }

    /// Appends a record, keeping its captured and original lengths.
    pub fn write(&mut self, record: &PacketRecord) -> Result<()> {
        let frame = self.encoder.frame(
            record.timestamp,
            record.captured_length,
            record.original_length,
            record.buffer(),
        )?;
        Self::emit(&mut self.inner, &frame)?;
        self.encoder.add_written(frame.len());
        Ok(())
    }

    /// Appends a packet captured in full from raw bytes.
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Time of capture as an offset since the UNIX epoch.
    /// * `original_length` - Length of the packet on the wire.
    /// * `data` - The captured bytes.
    pub fn write_packet(
        &mut self,
        timestamp: Duration,
        original_length: u32,
        data: &[u8],
    ) -> Result<()> {
        let captured_length = self.encoder.captured_length(data)?;
        let frame = self.encoder.frame(timestamp, captured_length, original_length, data)?;
        Self::emit(&mut self.inner, &frame)?;
        self.encoder.add_written(frame.len());
        Ok(())
    }

    fn emit(inner: &mut W, frame: &Frame<'_>) -> Result<()> {
        // https://tools.ietf.org/id/draft-gharris-opsawg-pcap-00.html#name-packet-record
        inner.write_all(&frame.header)?;
        inner.write_all(frame.payload)?;
        if frame.padding > 0 {
            io::copy(&mut io::repeat(0).take(frame.padding), inner)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    /// The header as written. Its magic number is the little-endian one.
    pub fn header(&self) -> &FileHeader {
        self.encoder.header()
    }

    /// Total bytes handed to the sink, file header included.
    pub fn bytes_written(&self) -> u64 {
        self.encoder.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Gives back the underlying sink without flushing it.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadPolicy;
    use crate::error::Error;
    use crate::header::LinkType;

    /// Accepts `room` bytes, then fails every write.
    struct Cramped {
        written: Vec<u8>,
        room: usize,
    }

    impl Write for Cramped {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() >= self.room {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "no room"));
            }
            let n = buf.len().min(self.room - self.written.len());
            self.written.extend(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_header_written_on_construction() {
        let header = FileHeader::new(LinkType::BluetoothHciH4WithPhdr, 1024);
        let writer = Writer::new(Vec::new(), &header).unwrap();
        assert_eq!(writer.bytes_written(), 24);
        assert_eq!(writer.into_inner(), header.to_bytes().to_vec());
    }

    #[test]
    fn test_header_write_failure() {
        let sink = Cramped { written: Vec::new(), room: 10 };
        match Writer::new(sink, &FileHeader::default()) {
            Err(Error::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::WriteZero),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("header write should fail"),
        }
    }

    #[test]
    fn test_write_packet_layout() {
        let mut writer = Writer::new(Vec::new(), &FileHeader::default()).unwrap();
        writer.write_packet(Duration::new(0x0102, 5_000), 60, &[0xaa, 0xbb]).unwrap();
        assert_eq!(writer.bytes_written(), 24 + 16 + 2);
        let bytes = writer.into_inner();
        assert_eq!(
            &bytes[24..],
            &[0x02, 0x01, 0, 0, 5, 0, 0, 0, 2, 0, 0, 0, 60, 0, 0, 0, 0xaa, 0xbb]
        );
    }

    #[test]
    fn test_fixed_policy_pads_to_snaplen() {
        let header = FileHeader { snapshot_length: 8, ..Default::default() };
        let config = CodecConfig::default().with_payload_policy(PayloadPolicy::Fixed);
        let mut writer = Writer::with_config(Vec::new(), &header, config).unwrap();
        writer.write(&PacketRecord::from_packet(Duration::ZERO, vec![1, 2, 3])).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 24 + 16 + 8);
        assert_eq!(&bytes[40..], &[1, 2, 3, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_fixed_policy_zeroes_bytes_past_capture() {
        let header = FileHeader { snapshot_length: 8, ..Default::default() };
        let config = CodecConfig::default().with_payload_policy(PayloadPolicy::Fixed);
        let mut writer = Writer::with_config(Vec::new(), &header, config).unwrap();
        let stale = PacketRecord::new(Duration::ZERO, 2, 2, vec![1, 2, 0xaa, 0xaa, 0xaa]);
        writer.write(&stale).unwrap();
        let bytes = writer.into_inner();
        assert_eq!(&bytes[40..], &[1, 2, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_packet_longer_than_snaplen() {
        let header = FileHeader { snapshot_length: 4, ..Default::default() };
        let mut writer = Writer::new(Vec::new(), &header).unwrap();
        assert!(matches!(
            writer.write_packet(Duration::ZERO, 5, &[0; 5]),
            Err(Error::CapturedLengthExceedsSnapshot { captured: 5, snapshot: 4 })
        ));
        assert_eq!(writer.bytes_written(), 24);
    }

    #[test]
    fn test_write_rejects_timestamp_past_2106() {
        let mut writer = Writer::new(Vec::new(), &FileHeader::default()).unwrap();
        let late = Duration::from_secs(u64::from(u32::MAX) + 1);
        assert!(matches!(
            writer.write_packet(late, 1, &[1]),
            Err(Error::TimestampOutOfRange { .. })
        ));
        assert_eq!(writer.into_inner().len(), 24);
    }

    #[test]
    fn test_oversized_packet_is_rejected() {
        let header = FileHeader { snapshot_length: 4, ..Default::default() };
        let mut writer = Writer::new(Vec::new(), &header).unwrap();
        assert!(matches!(
            writer.write_packet(Duration::ZERO, 5, &[0; 5]),
            Err(Error::CapturedLengthExceedsSnapshot { captured: 5, snapshot: 4 })
        ));
        assert_eq!(writer.into_inner().len(), 24);
    }

    #[test]
    fn test_partial_record_left_in_sink() {
        let sink = Cramped { written: Vec::new(), room: 24 + 16 + 1 };
        let mut writer = Writer::new(sink, &FileHeader::default()).unwrap();
        assert!(writer.write_packet(Duration::ZERO, 4, &[1, 2, 3, 4]).is_err());
        assert_eq!(writer.bytes_written(), 24);
        assert_eq!(writer.into_inner().written.len(), 41);
    }
}
