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

//! A streaming codec for classic pcap (packet capture) files.
//!
//! The crate reads and writes the classic pcap container: a 24-byte file
//! header followed by records, each a 16-byte record header and a payload.
//! Opening files and capturing traffic are left to the caller, who supplies
//! the byte stream.
//!
//! # Features
//!
//! * **Byte order detection:** The reader accepts both byte orders and both
//!   timestamp resolutions, detected from the magic number.
//! * **Buffer reuse:** Payloads live in buffers borrowed from a pool sized
//!   by the snapshot length. Dropping a record returns its buffer.
//! * **Blocking and async:** [`Reader`] and [`Writer`] work on `std::io`
//!   streams; [`asynchronous`] offers the same over Tokio.
//! * **Explicit payload layout:** [`PayloadPolicy`] picks between records of
//!   exactly `captured_length` bytes and fixed snapshot-sized records.
//!
//! The pcapng successor format is not supported.

pub mod asynchronous;
/// Byte order helpers for multi-byte fields.
pub mod byte_order;
mod codec;
pub mod config;
pub mod error;
pub mod header;
pub mod pool;
pub mod reader;
pub mod record;
pub mod writer;

pub use byte_order::ByteOrder;
pub use config::{CodecConfig, PayloadPolicy};
pub use error::{Error, Result};
pub use header::{FileFormat, FileHeader, LinkType, RecordHeader, TimestampResolution};
pub use pool::{BufferPool, PooledBuffer};
pub use reader::Reader;
pub use record::PacketRecord;
pub use writer::Writer;
