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

//! Reader and writer configuration.

/// How many payload bytes each record occupies in the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadPolicy {
    /// Each record carries exactly `captured_length` payload bytes.
    #[default]
    Exact,
    /// Each record carries a full `snapshot_length` payload; bytes past
    /// `captured_length` are padding. Matches producers that always emit
    /// fixed-size records.
    Fixed,
}

/// Options shared by the reader and the writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecConfig {
    /// Payload layout of every record.
    pub payload_policy: PayloadPolicy,
    /// Idle buffers the reader's pool keeps for reuse; buffers released
    /// beyond this are freed.
    pub max_idle_buffers: usize,
}

impl CodecConfig {
    const MAX_IDLE_BUFFERS: usize = 64;

    /// Sets the payload policy.
    pub fn with_payload_policy(mut self, payload_policy: PayloadPolicy) -> Self {
        self.payload_policy = payload_policy;
        self
    }

    /// Sets how many idle buffers the pool keeps.
    pub fn with_max_idle_buffers(mut self, max_idle_buffers: usize) -> Self {
        self.max_idle_buffers = max_idle_buffers;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            payload_policy: PayloadPolicy::default(),
            max_idle_buffers: CodecConfig::MAX_IDLE_BUFFERS,
        }
    }
}
