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

//! Tokio front ends for the pcap reader and writer.
//!
//! These behave exactly like [`crate::Reader`] and [`crate::Writer`]: same
//! end-of-stream rule, same remembered errors, same payload policies.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::{Decoder, Encoder, Frame, HeaderFields};
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::header::{FileFormat, FileHeader, FILE_HEADER_LEN, MAGIC_LEN, RECORD_HEADER_LEN};
use crate::pool::BufferPool;
use crate::record::PacketRecord;

/// Reads pcap records from an asynchronous byte stream.
pub struct AsyncReader<R> {
    inner: R,
    decoder: Decoder,
}

impl<R: AsyncRead + Unpin> AsyncReader<R> {
    /// Parses the file header from `inner` using the default configuration.
    pub async fn new(inner: R) -> Result<Self> {
        Self::with_config(inner, CodecConfig::default()).await
    }

    /// Parses the file header from `inner` using `config`.
    pub async fn with_config(mut inner: R, config: CodecConfig) -> Result<Self> {
        let mut magic = [0u8; MAGIC_LEN];
        fill_exact(&mut inner, &mut magic).await?;
        let format = FileFormat::detect(&magic)?;
        let mut fields: HeaderFields = Default::default();
        fill_exact(&mut inner, &mut fields).await?;
        Ok(AsyncReader { inner, decoder: Decoder::new(format, &fields, config) })
    }

    /// Reads the next record; `Ok(None)` at a clean end of stream.
    pub async fn next_record(&mut self) -> Result<Option<PacketRecord>> {
        if let Some(outcome) = self.decoder.stopped() {
            return outcome;
        }
        let outcome = self.read_record().await;
        self.decoder.settle(outcome)
    }

    async fn read_record(&mut self) -> Result<Option<PacketRecord>> {
        let mut bytes = [0u8; RECORD_HEADER_LEN];
        let filled = fill(&mut self.inner, &mut bytes).await?;
        let Some(mut pending) = self.decoder.begin(&bytes, filled)? else {
            return Ok(None);
        };
        fill_exact(&mut self.inner, pending.payload_mut()).await?;
        Ok(Some(pending.finish()))
    }

    pub fn header(&self) -> &FileHeader {
        self.decoder.header()
    }

    pub fn format(&self) -> FileFormat {
        self.decoder.format()
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        self.decoder.pool()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.decoder.last_error()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes a little-endian pcap stream to an asynchronous byte sink.
pub struct AsyncWriter<W> {
    inner: W,
    encoder: Encoder,
}

impl<W: AsyncWrite + Unpin> AsyncWriter<W> {
    /// Writes and flushes the file header using the default configuration.
    pub async fn new(inner: W, header: &FileHeader) -> Result<Self> {
        Self::with_config(inner, header, CodecConfig::default()).await
    }

    /// Writes and flushes the file header using `config`.
    pub async fn with_config(
        mut inner: W,
        header: &FileHeader,
        config: CodecConfig,
    ) -> Result<Self> {
        let mut encoder = Encoder::new(header, config)?;
        inner.write_all(&encoder.header().to_bytes()).await?;
        inner.flush().await?;
        encoder.add_written(FILE_HEADER_LEN as u64);
        debug!("Wrote pcap header: snaplen {}", encoder.header().snapshot_length);
        Ok(AsyncWriter { inner, encoder })
    }

    /// Appends a record, keeping its captured and original lengths.
    pub async fn write(&mut self, record: &PacketRecord) -> Result<()> {
        let frame = self.encoder.frame(
            record.timestamp,
            record.captured_length,
            record.original_length,
            record.buffer(),
        )?;
        emit(&mut self.inner, &frame).await?;
        self.encoder.add_written(frame.len());
        Ok(())
    }

    /// Appends a packet captured in full from raw bytes.
    pub async fn write_packet(
        &mut self,
        timestamp: Duration,
        original_length: u32,
        data: &[u8],
    ) -> Result<()> {
        let captured_length = self.encoder.captured_length(data)?;
        let frame = self.encoder.frame(timestamp, captured_length, original_length, data)?;
        emit(&mut self.inner, &frame).await?;
        self.encoder.add_written(frame.len());
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush().await?)
    }

    pub fn header(&self) -> &FileHeader {
        self.encoder.header()
    }

    pub fn bytes_written(&self) -> u64 {
        self.encoder.bytes_written()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

async fn emit<W: AsyncWrite + Unpin>(inner: &mut W, frame: &Frame<'_>) -> Result<()> {
    inner.write_all(&frame.header).await?;
    inner.write_all(frame.payload).await?;
    if frame.padding > 0 {
        tokio::io::copy(&mut tokio::io::repeat(0).take(frame.padding), inner).await?;
    }
    Ok(())
}

async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

async fn fill_exact<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let filled = fill(reader, buf).await?;
    if filled < buf.len() {
        return Err(Error::ShortRead { expected: buf.len(), actual: filled });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadPolicy;
    use crate::header::TimestampResolution;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_round_trip() -> Result<()> {
        let header = FileHeader { magic_number: FileHeader::MAGIC_NANOS, ..Default::default() };
        let mut writer = AsyncWriter::new(Vec::new(), &header).await?;
        writer.write_packet(Duration::new(1, 999_999_999), 100, &[1, 2, 3]).await?;
        writer.write(&PacketRecord::new(Duration::new(2, 0), 2, 2, vec![4, 5, 6])).await?;
        writer.flush().await?;
        let bytes = writer.into_inner();

        let mut reader = AsyncReader::new(BufReader::new(Cursor::new(bytes))).await?;
        assert_eq!(reader.format().resolution, TimestampResolution::Nano);
        assert_eq!(reader.header(), &header);

        let first = reader.next_record().await?.expect("first record");
        assert_eq!(first.timestamp, Duration::new(1, 999_999_999));
        assert_eq!((first.captured_length, first.original_length), (3, 100));
        assert_eq!(first.payload(), &[1, 2, 3]);
        let second = reader.next_record().await?.expect("second record");
        assert_eq!(second.payload(), &[4, 5]);
        assert!(reader.next_record().await?.is_none());
        assert!(reader.next_record().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_truncated_record_header() {
        let mut bytes = FileHeader::default().to_bytes().to_vec();
        bytes.extend([0u8; 10]);
        let mut reader = AsyncReader::new(Cursor::new(bytes)).await.unwrap();
        for _ in 0..2 {
            assert!(matches!(
                reader.next_record().await,
                Err(Error::ShortRead { expected: 16, actual: 10 })
            ));
        }
        assert!(reader.last_error().is_some());
    }

    #[tokio::test]
    async fn test_fixed_policy() -> Result<()> {
        let header = FileHeader { snapshot_length: 6, ..Default::default() };
        let config = CodecConfig::default().with_payload_policy(PayloadPolicy::Fixed);
        let mut writer = AsyncWriter::with_config(Vec::new(), &header, config.clone()).await?;
        writer.write_packet(Duration::ZERO, 2, &[7, 8]).await?;
        assert_eq!(writer.bytes_written(), 24 + 16 + 6);

        let bytes = writer.into_inner();
        let mut reader = AsyncReader::with_config(Cursor::new(bytes), config).await?;
        let record = reader.next_record().await?.expect("record");
        assert_eq!(record.buffer(), &[7, 8, 0, 0, 0, 0]);
        assert_eq!(record.payload(), &[7, 8]);
        drop(record);
        assert_eq!(reader.pool().idle(), 1);
        Ok(())
    }
}
