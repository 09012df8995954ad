//! Per-device statistic records.

use serde::{Deserialize, Serialize};

/// Block device counters.
///
/// Source: `/proc/diskstats`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DiskStats {
    pub major: u32,
    pub minor: u32,
    /// Display name. When empty the device-naming resolver is asked.
    pub name: String,
    /// Completed I/O requests.
    pub nr_ios: u64,
    /// 512-byte sectors read.
    pub rd_sect: u64,
    /// 512-byte sectors written.
    pub wr_sect: u64,
    /// 512-byte sectors discarded.
    pub dc_sect: u64,
    /// Milliseconds spent reading.
    pub rd_ticks: u32,
    /// Milliseconds spent writing.
    pub wr_ticks: u32,
    /// Milliseconds spent discarding.
    pub dc_ticks: u32,
    /// Milliseconds the device was busy.
    pub tot_ticks: u32,
    /// Weighted milliseconds spent doing I/O.
    pub rq_ticks: u32,
}

/// Serial line counters.
///
/// Source: `/proc/tty/driver/serial`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SerialStats {
    pub line: u32,
    pub rx: u32,
    pub tx: u32,
    pub frame: u32,
    pub parity: u32,
    pub brk: u32,
    pub overrun: u32,
}

/// Mounted filesystem usage. Sizes in bytes.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FilesystemStats {
    pub fs_name: String,
    pub total_bytes: u64,
    pub free_bytes: u64,
    /// Free bytes available to unprivileged users.
    pub avail_bytes: u64,
    pub files: u64,
    pub free_files: u64,
}

/// Fibre Channel host counters.
///
/// Source: `/sys/class/fc_host/<host>/statistics`
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(default)]
pub struct FchostStats {
    pub name: String,
    pub rx_frames: u64,
    pub tx_frames: u64,
    /// Received 4-byte words.
    pub rx_words: u64,
    /// Transmitted 4-byte words.
    pub tx_words: u64,
}
