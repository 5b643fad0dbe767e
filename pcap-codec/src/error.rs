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

//! This module defines the codec error types.

use std::io;
use std::sync::Arc;

/// An enumeration of possible errors.
///
/// Errors are `Clone` so a reader can hand the same failure back on every
/// call after iteration has stopped.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The first four bytes of the stream are not a pcap magic number.
    #[error("bad magic number: 0x{0:08x}")]
    BadMagic(u32),
    /// The stream ended inside a fixed-width structure.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },
    /// A record claims more payload than the snapshot length allows.
    #[error("captured length {captured} exceeds snapshot length {snapshot}")]
    CapturedLengthExceedsSnapshot { captured: u32, snapshot: u32 },
    /// A timestamp has more seconds than the 32-bit record field holds.
    #[error("timestamp of {seconds} seconds does not fit a pcap record")]
    TimestampOutOfRange { seconds: u64 },
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<io::Error>),
}

impl Error {
    /// Returns true if the stream ran out of bytes mid-structure.
    pub fn is_short_read(&self) -> bool {
        matches!(self, Error::ShortRead { .. })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_error_chaining() {
        let inner_error = io::Error::new(io::ErrorKind::BrokenPipe, "sink closed");
        let outer_error = Error::from(inner_error);

        assert!(outer_error.to_string().contains("sink closed"));
        assert!(outer_error.source().is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::BadMagic(0xdeadbeef).to_string(), "bad magic number: 0xdeadbeef");
        let short = Error::ShortRead { expected: 16, actual: 10 };
        assert_eq!(short.to_string(), "short read: expected 16 bytes, got 10");
        assert!(short.is_short_read());
        assert!(!Error::BadMagic(0).is_short_read());
        let late = Error::TimestampOutOfRange { seconds: 1 << 32 };
        assert_eq!(
            late.to_string(),
            "timestamp of 4294967296 seconds does not fit a pcap record"
        );
    }

    #[test]
    fn test_clone_keeps_io_error() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        let copy = err.clone();
        assert_eq!(err.to_string(), copy.to_string());
    }
}
