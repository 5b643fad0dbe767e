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

//! # Time Display class

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Timelike, Utc};

/// A simple class that contains information required to display time
pub struct TimeDisplay {
    /// seconds since std::time::UNIX_EPOCH
    secs: i64,
    /// nano sub seconds since std::time::UNIX_EPOCH
    nsecs: u32,
}

impl TimeDisplay {
    /// Creates a new TimeDisplay with given secs and nsecs
    ///
    /// # Arguments
    ///
    /// * `secs` - seconds since std::time::UNIX_EPOCH
    /// * `nsecs` - nano sub seconds since std::time::UNIX_EPOCH
    pub fn new(secs: i64, nsecs: u32) -> TimeDisplay {
        TimeDisplay { secs, nsecs }
    }

    /// Creates a TimeDisplay from an offset since std::time::UNIX_EPOCH,
    /// the way packet timestamps are stored.
    pub fn from_epoch_offset(offset: Duration) -> TimeDisplay {
        let secs = i64::try_from(offset.as_secs()).unwrap_or(i64::MAX);
        TimeDisplay::new(secs, offset.subsec_nanos())
    }

    fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.secs, self.nsecs)
    }

    /// Displays date & time in UTC with nanosecond precision, with a format
    /// YYYY-MM-DD HH:MM:SS.nnnnnnnnn
    pub fn utc_display_precise(&self) -> String {
        match self.datetime() {
            Some(datetime) => format!(
                "{}-{:02}-{:02} {:02}:{:02}:{:02}.{:09}",
                datetime.year(),
                datetime.month(),
                datetime.day(),
                datetime.hour(),
                datetime.minute(),
                datetime.second(),
                datetime.timestamp_subsec_nanos()
            ),
            None => "INVALID-TIMESTAMP".to_string(),
        }
    }

    /// Displays time in UTC for logs, with millisecond precision.
    fn utc_display_log(&self) -> String {
        match self.datetime() {
            Some(datetime) => format!(
                "{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
                datetime.month(),
                datetime.day(),
                datetime.hour(),
                datetime.minute(),
                datetime.second(),
                datetime.timestamp_subsec_millis()
            ),
            None => "INVALID-TIMESTAMP".to_string(),
        }
    }
}

// Get TimeDisplay of current_time
fn get_current_time() -> TimeDisplay {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    TimeDisplay::from_epoch_offset(since_epoch)
}

/// Return the timestamp of the current time for logs
pub fn log_current_time() -> String {
    get_current_time().utc_display_log()
}
