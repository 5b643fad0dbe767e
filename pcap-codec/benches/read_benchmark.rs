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

use pcap_codec::asynchronous::AsyncReader;
use pcap_codec::{FileHeader, LinkType, Reader, Writer};
use std::io::Cursor;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

const RECORDS: u32 = 1_000;

fn capture() -> Vec<u8> {
    let header = FileHeader::new(LinkType::Ethernet, 1514);
    let mut writer = Writer::new(Vec::new(), &header).unwrap();
    for i in 0..RECORDS {
        let frame = vec![i as u8; 64 + (i as usize * 13) % 1450];
        let timestamp = Duration::from_micros(u64::from(i) * 250);
        writer.write_packet(timestamp, frame.len() as u32, &frame).unwrap();
    }
    writer.into_inner()
}

fn read_benchmark(data: &[u8]) -> usize {
    let reader = Reader::new(Cursor::new(data)).unwrap();
    let mut bytes = 0;
    for record in reader {
        bytes += record.unwrap().payload().len();
    }
    bytes
}

async fn async_read_benchmark(data: &[u8]) -> usize {
    let mut reader = AsyncReader::new(Cursor::new(data)).await.unwrap();
    let mut bytes = 0;
    while let Some(record) = reader.next_record().await.unwrap() {
        bytes += record.payload().len();
    }
    bytes
}

fn main() {
    let iterations = 2_000;
    let data = capture();
    let rt = Runtime::new().unwrap();
    let handle = rt.handle();
    for _ in 0..5 {
        let time_start = Instant::now();
        for _ in 0..iterations {
            assert!(read_benchmark(&data) > 0);
        }
        let blocking = time_start.elapsed();

        let time_start = Instant::now();
        for _ in 0..iterations {
            assert!(handle.block_on(async_read_benchmark(&data)) > 0);
        }
        let asynchronous = time_start.elapsed();
        println!(
            "** Time per iteration {}us blocking, {}us async",
            (blocking.as_micros() as f64) / (iterations as f64),
            (asynchronous.as_micros() as f64) / (iterations as f64)
        );
    }
}
