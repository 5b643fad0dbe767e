//
//  Copyright 2023 Google, Inc.
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at:
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! A logger for programs and tests built on the pcap crates.
//!
//! Uses the env_logger crate that allows control of logging through
//! the RUST_LOG environment variable.

use env_logger::{Builder, Env};
use log::{Level, Record, SetLoggerError};
use std::{ffi::OsStr, io::Write, path::Path};

use crate::util::time_display::log_current_time;

/// Installs the global logger with the given line prefix.
///
/// Lines look like `<prefix> <level> <time> <file>:<line> - <message>`.
/// Fails if a global logger has already been installed.
pub fn init(prefix: &'static str) -> Result<(), SetLoggerError> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "{} {} {} {}:{} - {}",
            prefix,
            level_to_string(record.level()),
            log_current_time(),
            format_file(record),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder.try_init()
}

/// Installs a logger suitable for unit and integration tests.
///
/// Output goes through the test harness capture. Calling this more than
/// once is harmless; only the first call installs the logger.
pub fn init_for_test() {
    let mut binding = Builder::from_env(Env::default().default_filter_or("debug"));
    let builder = binding.is_test(true);
    builder.format(move |buf, record| {
        let level = level_to_string(record.level());
        writeln!(buf, "{} {} \t| pcap-test: {}", level, log_current_time(), record.args())
    });
    let _ = builder.try_init();
}

/// Parses the file name from the record's source path.
fn format_file<'a>(record: &'a Record<'a>) -> &'a str {
    record
        .file()
        .and_then(|filepath| Path::new(filepath).file_name())
        .and_then(OsStr::to_str)
        .unwrap_or("N/A")
}

/// Translates log levels to their one-letter form.
fn level_to_string(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_for_test_twice() {
        init_for_test();
        init_for_test();
        log::info!("logger installed");
    }

    #[test]
    fn test_level_to_string() {
        assert_eq!(level_to_string(Level::Error), "E");
        assert_eq!(level_to_string(Level::Trace), "T");
    }

    #[test]
    fn test_format_file() {
        let record =
            Record::builder().args(format_args!("message")).file(Some("src/reader.rs")).build();
        assert_eq!(format_file(&record), "reader.rs");
        let record = Record::builder().args(format_args!("message")).build();
        assert_eq!(format_file(&record), "N/A");
    }
}
