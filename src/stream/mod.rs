// src/stream/mod.rs

//! Framed-stream demultiplexing.
//!
//! A single byte stream carries stdout and stderr interleaved as frames:
//! an 8-byte header (channel tag at offset 0, big-endian payload length at
//! offset 4) followed by the payload.
//!
//! - [`frame`] decodes headers and maps channel tags.
//! - [`tail`] keeps the most recent N entries per channel in bounded memory
//!   and formats the truncation banner.
//! - [`demux`] reads any `AsyncRead` and splits it into two channel logs.

pub mod demux;
pub mod frame;
pub mod tail;

pub use demux::{demux, DemuxOutput, Demultiplexer};
pub use frame::{Channel, FrameHeader, HEADER_LEN};
pub use tail::{truncation_banner, ChannelLog, TailBuffer, BANNER_WIDTH};
