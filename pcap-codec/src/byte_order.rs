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

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order of every multi-byte field in a pcap stream.
///
/// Fixed once from the magic number and used for the rest of the stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// The magic number reads as written when decoded little-endian.
    Little,
    /// The magic number reads byte-swapped when decoded little-endian.
    Big,
}

impl ByteOrder {
    /// Decodes a `u32` from the first four bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` holds fewer than four bytes.
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::Little => LittleEndian::read_u32(bytes),
            ByteOrder::Big => BigEndian::read_u32(bytes),
        }
    }

    /// Decodes a `u16` from the first two bytes of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` holds fewer than two bytes.
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::Little => LittleEndian::read_u16(bytes),
            ByteOrder::Big => BigEndian::read_u16(bytes),
        }
    }

    /// Decodes an `i32` from the first four bytes of `bytes`.
    pub fn read_i32(self, bytes: &[u8]) -> i32 {
        self.read_u32(bytes) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32() {
        let bytes = [0xd4, 0xc3, 0xb2, 0xa1, 0xff];
        assert_eq!(ByteOrder::Little.read_u32(&bytes), 0xa1b2c3d4);
        assert_eq!(ByteOrder::Big.read_u32(&bytes), 0xd4c3b2a1);
    }

    #[test]
    fn test_read_u16() {
        let bytes = [0x02, 0x00];
        assert_eq!(ByteOrder::Little.read_u16(&bytes), 2);
        assert_eq!(ByteOrder::Big.read_u16(&bytes), 0x0200);
    }

    #[test]
    fn test_read_i32() {
        assert_eq!(ByteOrder::Little.read_i32(&[0xf0, 0xf1, 0xff, 0xff]), -3600);
        assert_eq!(ByteOrder::Big.read_i32(&[0xff, 0xff, 0xf1, 0xf0]), -3600);
    }
}
