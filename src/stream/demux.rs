// src/stream/demux.rs

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::frame::{Channel, FrameHeader, HEADER_LEN};
use super::tail::{ChannelLog, TailBuffer};

const READ_CHUNK: usize = 8 * 1024;

/// Result of demultiplexing a framed stream, in channel order `[stdout, stderr]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxOutput {
    pub stdout: ChannelLog,
    pub stderr: ChannelLog,
}

impl DemuxOutput {
    pub fn is_truncated(&self) -> bool {
        self.stdout.truncated() || self.stderr.truncated()
    }

    /// `[stdout, stderr]` as text, each with its banner when truncated.
    pub fn into_text(self) -> [String; 2] {
        [self.stdout.render(), self.stderr.render()]
    }

    /// `[stdout, stderr]` as line arrays, each with its banner when truncated.
    pub fn into_lines(self) -> [Vec<String>; 2] {
        [self.stdout.into_lines(), self.stderr.into_lines()]
    }
}

/// Splits a framed byte stream into per-channel tail buffers.
///
/// Bytes are accumulated until a whole header, then a whole payload, are
/// available; partial frames stay buffered across reads. Each payload is one
/// entry, with a single trailing line terminator removed.
#[derive(Debug)]
pub struct Demultiplexer<R> {
    reader: R,
    tail: Option<usize>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> Demultiplexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            tail: None,
            pending: Vec::new(),
        }
    }

    /// Keep only the last `tail` entries per channel.
    pub fn with_tail(mut self, tail: Option<usize>) -> Self {
        self.tail = tail;
        self
    }

    /// Read the stream to its end.
    ///
    /// A read error aborts immediately and is returned as-is.
    pub async fn run(mut self) -> io::Result<DemuxOutput> {
        let mut stdout = TailBuffer::new(Channel::Stdout, self.tail);
        let mut stderr = TailBuffer::new(Channel::Stderr, self.tail);
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            self.pending.extend_from_slice(&chunk[..n]);

            let consumed = drain_frames(&self.pending, &mut stdout, &mut stderr);
            self.pending.drain(..consumed);
        }

        if !self.pending.is_empty() {
            warn!(
                leftover_bytes = self.pending.len(),
                "stream ended inside a frame; discarding incomplete frame"
            );
        }

        debug!(
            stdout_total = stdout.total(),
            stderr_total = stderr.total(),
            tail = ?self.tail,
            "framed stream finished"
        );

        Ok(DemuxOutput {
            stdout: stdout.finish(),
            stderr: stderr.finish(),
        })
    }
}

/// Convenience wrapper: demultiplex `reader` keeping the last `tail` entries.
pub async fn demux<R: AsyncRead + Unpin>(reader: R, tail: Option<usize>) -> io::Result<DemuxOutput> {
    Demultiplexer::new(reader).with_tail(tail).run().await
}

/// Consume every complete frame at the front of `buf`; return bytes consumed.
fn drain_frames(buf: &[u8], stdout: &mut TailBuffer, stderr: &mut TailBuffer) -> usize {
    let mut offset = 0;

    while let Some(header_bytes) = buf.get(offset..offset + HEADER_LEN) {
        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(header_bytes);
        let header = FrameHeader::parse(&raw);

        let start = offset + HEADER_LEN;
        let end = start + header.len as usize;
        let Some(payload) = buf.get(start..end) else {
            break;
        };

        let line = strip_terminator(String::from_utf8_lossy(payload).into_owned());
        match header.channel {
            Channel::Stdout => stdout.push(line),
            Channel::Stderr => stderr.push(line),
        }
        offset = end;
    }

    offset
}

fn strip_terminator(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
