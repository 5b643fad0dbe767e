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

//! File and record headers of the classic pcap format.
//!
//! https://tools.ietf.org/id/draft-gharris-opsawg-pcap-00.html

use std::mem::size_of;
use std::time::Duration;

use zerocopy::byteorder::{LittleEndian, I32, U16, U32};
use zerocopy::AsBytes;
use zerocopy_derive::AsBytes;

use crate::byte_order::ByteOrder;
use crate::error::{Error, Result};

/// Size of the file header in bytes.
pub const FILE_HEADER_LEN: usize = 24;
/// Size of the per-record header in bytes.
pub const RECORD_HEADER_LEN: usize = 16;
/// Size of the magic number that opens the file header.
pub const MAGIC_LEN: usize = 4;

/// Resolution of the fractional part of record timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimestampResolution {
    /// The fraction counts microseconds.
    Micro,
    /// The fraction counts nanoseconds.
    Nano,
}

impl TimestampResolution {
    /// Returns the magic number announcing this resolution, as written by a
    /// little-endian producer.
    pub fn magic(self) -> u32 {
        match self {
            TimestampResolution::Micro => FileHeader::MAGIC_MICROS,
            TimestampResolution::Nano => FileHeader::MAGIC_NANOS,
        }
    }

    /// Rebuilds an offset since the UNIX epoch from the two timestamp fields.
    pub fn to_duration(self, seconds: u32, fraction: u32) -> Duration {
        let seconds = Duration::from_secs(u64::from(seconds));
        match self {
            TimestampResolution::Micro => seconds + Duration::from_micros(u64::from(fraction)),
            TimestampResolution::Nano => seconds + Duration::from_nanos(u64::from(fraction)),
        }
    }

    /// Returns the fractional timestamp field for `timestamp`.
    pub fn fraction(self, timestamp: Duration) -> u32 {
        match self {
            TimestampResolution::Micro => timestamp.subsec_micros(),
            TimestampResolution::Nano => timestamp.subsec_nanos(),
        }
    }
}

/// Byte order and timestamp resolution, both carried by the magic number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileFormat {
    /// Byte order of every multi-byte field after the magic number.
    pub byte_order: ByteOrder,
    /// Resolution of the record timestamp fraction.
    pub resolution: TimestampResolution,
}

impl FileFormat {
    /// Classifies a magic number decoded little-endian from the first four
    /// bytes of a stream. Returns `None` for anything that is not pcap.
    pub fn from_magic(magic: u32) -> Option<FileFormat> {
        let (byte_order, resolution) = match magic {
            0xa1b2c3d4 => (ByteOrder::Little, TimestampResolution::Micro),
            0xa1b23c4d => (ByteOrder::Little, TimestampResolution::Nano),
            0xd4c3b2a1 => (ByteOrder::Big, TimestampResolution::Micro),
            0x4d3cb2a1 => (ByteOrder::Big, TimestampResolution::Nano),
            _ => return None,
        };
        Some(FileFormat { byte_order, resolution })
    }

    /// Detects the format from the first four bytes of a stream.
    pub fn detect(magic_bytes: &[u8; MAGIC_LEN]) -> Result<FileFormat> {
        let magic = ByteOrder::Little.read_u32(magic_bytes);
        FileFormat::from_magic(magic).ok_or(Error::BadMagic(magic))
    }
}

/// Represents the global header of a pcap capture file.
///
/// # File Header format
/// ```text
///                         1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  0 |                          Magic Number                         |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  4 |          Major Version        |         Minor Version         |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  8 |                        Time Zone Offset                       |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 12 |                      Significant Figures                      |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 16 |                            SnapLen                            |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 20 |                            LinkType                           |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// `magic_number` always holds the little-endian spelling of the magic for the
/// timestamp resolution in use; the byte order a stream was read with is
/// reported separately through [`FileFormat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// Magic number identifying the format and timestamp resolution.
    pub magic_number: u32,
    /// Major version of the pcap format.
    pub version_major: u16,
    /// Minor version of the pcap format.
    pub version_minor: u16,
    /// Historical time zone offset, passed through unchanged.
    pub time_zone_offset: i32,
    /// Historical timestamp accuracy, passed through unchanged.
    pub sig_figs: u32,
    /// Maximum number of payload bytes stored per record.
    pub snapshot_length: u32,
    /// Link-layer type of the captured packets.
    pub link_type: u32,
}

impl FileHeader {
    pub const MAGIC_MICROS: u32 = 0xa1b2c3d4;
    pub const MAGIC_NANOS: u32 = 0xa1b23c4d;
    const VERSION_MAJOR: u16 = 2u16;
    const VERSION_MINOR: u16 = 4u16;
    const SNAP_LEN: u32 = 65535;

    /// Creates a microsecond-resolution header for the given link type.
    pub fn new(link_type: LinkType, snapshot_length: u32) -> FileHeader {
        FileHeader { link_type: link_type.into(), snapshot_length, ..Default::default() }
    }

    /// Returns the timestamp resolution announced by the magic number.
    pub fn resolution(&self) -> Option<TimestampResolution> {
        FileFormat::from_magic(self.magic_number).map(|format| format.resolution)
    }

    /// Returns the link type, if it is one this crate names.
    pub fn link_type(&self) -> Option<LinkType> {
        LinkType::try_from(self.link_type).ok()
    }

    /// Decodes the twenty bytes that follow the magic number.
    pub(crate) fn decode_fields(format: FileFormat, bytes: &[u8]) -> FileHeader {
        let order = format.byte_order;
        FileHeader {
            magic_number: format.resolution.magic(),
            version_major: order.read_u16(&bytes[0..2]),
            version_minor: order.read_u16(&bytes[2..4]),
            time_zone_offset: order.read_i32(&bytes[4..8]),
            sig_figs: order.read_u32(&bytes[8..12]),
            snapshot_length: order.read_u32(&bytes[12..16]),
            link_type: order.read_u32(&bytes[16..20]),
        }
    }

    /// Encodes the header little-endian.
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_LEN] {
        let wire = FileHeaderLe {
            magic_number: U32::new(self.magic_number),
            version_major: U16::new(self.version_major),
            version_minor: U16::new(self.version_minor),
            time_zone_offset: I32::new(self.time_zone_offset),
            sig_figs: U32::new(self.sig_figs),
            snapshot_length: U32::new(self.snapshot_length),
            link_type: U32::new(self.link_type),
        };
        let mut bytes = [0u8; FILE_HEADER_LEN];
        bytes.copy_from_slice(wire.as_bytes());
        bytes
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        FileHeader {
            magic_number: FileHeader::MAGIC_MICROS,
            version_major: FileHeader::VERSION_MAJOR,
            version_minor: FileHeader::VERSION_MINOR,
            time_zone_offset: 0,
            sig_figs: 0,
            snapshot_length: FileHeader::SNAP_LEN,
            link_type: LinkType::Ethernet.into(),
        }
    }
}

/// Represents the link layer header type of a pcap capture.
///
/// These values specify the format of the link-layer header that precedes
/// the network layer header in each packet. The codec passes the value
/// through unchanged; this enum only names common ones.
///
/// For a complete list refer to the tcpdump documentation:
/// https://www.tcpdump.org/linktypes.html
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// Null link type (BSD loopback)
    Null = 0,
    /// Ethernet
    Ethernet = 1,
    /// Raw IPv4 or IPv6, no link-layer header
    Raw = 101,
    /// IEEE 802.11 wireless LAN
    Ieee80211 = 105,
    /// Linux "cooked" capture encapsulation
    LinuxSll = 113,
    /// Radiotap link-layer information followed by an 802.11 header.
    Ieee80211RadioTap = 127,
    /// Bluetooth HCI UART transport layer
    BluetoothHciH4WithPhdr = 201,
    /// Ultra-wideband controller interface protocol
    FiraUci = 299,
}

impl From<LinkType> for u32 {
    fn from(val: LinkType) -> Self {
        val as u32
    }
}

impl TryFrom<u32> for LinkType {
    type Error = u32;

    fn try_from(value: u32) -> std::result::Result<Self, u32> {
        Ok(match value {
            0 => LinkType::Null,
            1 => LinkType::Ethernet,
            101 => LinkType::Raw,
            105 => LinkType::Ieee80211,
            113 => LinkType::LinuxSll,
            127 => LinkType::Ieee80211RadioTap,
            201 => LinkType::BluetoothHciH4WithPhdr,
            299 => LinkType::FiraUci,
            other => return Err(other),
        })
    }
}

/// Represents the header prepended to each packet in a pcap capture file.
///
/// # Fields
/// ```text
///                        1                   2                   3
///    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  0 |                      Timestamp (Seconds)                      |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  4 |            Timestamp (Microseconds or nanoseconds)            |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  8 |                    Captured Packet Length                     |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 12 |                    Original Packet Length                     |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// 16 /                                                               /
///    /                          Packet Data                          /
///    /                        variable length                        /
///    /                                                               /
///    +---------------------------------------------------------------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Timestamp of the captured packet (seconds).
    pub ts_seconds: u32,
    /// Timestamp of the captured packet (micro- or nanoseconds).
    pub ts_fraction: u32,
    /// Number of bytes captured from the packet.
    pub captured_length: u32,
    /// Original length of the packet on the network.
    pub original_length: u32,
}

impl RecordHeader {
    /// Builds the header for a packet captured at `timestamp`.
    ///
    /// Fails if the seconds do not fit the 32-bit field, which happens for
    /// times after early 2106.
    pub fn from_timestamp(
        timestamp: Duration,
        resolution: TimestampResolution,
        captured_length: u32,
        original_length: u32,
    ) -> Result<RecordHeader> {
        let seconds = timestamp.as_secs();
        let ts_seconds =
            u32::try_from(seconds).map_err(|_| Error::TimestampOutOfRange { seconds })?;
        Ok(RecordHeader {
            ts_seconds,
            ts_fraction: resolution.fraction(timestamp),
            captured_length,
            original_length,
        })
    }

    pub(crate) fn decode(order: ByteOrder, bytes: &[u8; RECORD_HEADER_LEN]) -> RecordHeader {
        RecordHeader {
            ts_seconds: order.read_u32(&bytes[0..4]),
            ts_fraction: order.read_u32(&bytes[4..8]),
            captured_length: order.read_u32(&bytes[8..12]),
            original_length: order.read_u32(&bytes[12..16]),
        }
    }

    /// Encodes the header little-endian.
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_LEN] {
        let wire = RecordHeaderLe {
            ts_seconds: U32::new(self.ts_seconds),
            ts_fraction: U32::new(self.ts_fraction),
            captured_length: U32::new(self.captured_length),
            original_length: U32::new(self.original_length),
        };
        let mut bytes = [0u8; RECORD_HEADER_LEN];
        bytes.copy_from_slice(wire.as_bytes());
        bytes
    }
}

#[repr(C)]
#[derive(AsBytes)]
struct FileHeaderLe {
    magic_number: U32<LittleEndian>,
    version_major: U16<LittleEndian>,
    version_minor: U16<LittleEndian>,
    time_zone_offset: I32<LittleEndian>,
    sig_figs: U32<LittleEndian>,
    snapshot_length: U32<LittleEndian>,
    link_type: U32<LittleEndian>,
}

#[repr(C)]
#[derive(AsBytes)]
struct RecordHeaderLe {
    ts_seconds: U32<LittleEndian>,
    ts_fraction: U32<LittleEndian>,
    captured_length: U32<LittleEndian>,
    original_length: U32<LittleEndian>,
}

const _: () = assert!(size_of::<FileHeaderLe>() == FILE_HEADER_LEN);
const _: () = assert!(size_of::<RecordHeaderLe>() == RECORD_HEADER_LEN);
