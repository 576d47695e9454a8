// src/stream/frame.rs

use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of a frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Channel tag value for stderr; every other tag is stdout.
pub const STDERR_TAG: u8 = 2;

/// Logical output channel of an agent job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
}

impl Channel {
    pub fn from_tag(tag: u8) -> Self {
        if tag == STDERR_TAG {
            Channel::Stderr
        } else {
            Channel::Stdout
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub channel: Channel,
    pub len: u32,
}

impl FrameHeader {
    /// Decode a header. Bytes 1..4 are padding and ignored.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        let len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Self {
            channel: Channel::from_tag(bytes[0]),
            len,
        }
    }

    /// Encode a header for `channel` with a payload of `len` bytes.
    pub fn encode(channel: Channel, len: u32) -> [u8; HEADER_LEN] {
        let tag = match channel {
            Channel::Stdout => 1,
            Channel::Stderr => STDERR_TAG,
        };
        let mut header = [0u8; HEADER_LEN];
        header[0] = tag;
        header[4..].copy_from_slice(&len.to_be_bytes());
        header
    }
}
