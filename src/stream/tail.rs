// src/stream/tail.rs

//! Tail retention for per-channel log buffers.

use std::collections::VecDeque;

use super::frame::Channel;

/// Width of the truncation banner rules.
pub const BANNER_WIDTH: usize = 64;

/// Growing sequence that keeps only the most recent `tail` entries.
///
/// While entries are pushed the buffer may hold up to `2 * tail` entries
/// before it drops the oldest ones back down to `tail`; [`TailBuffer::finish`]
/// trims to exactly `tail`. `total` counts every entry ever pushed.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    channel: Channel,
    tail: Option<usize>,
    lines: VecDeque<String>,
    total: usize,
}

impl TailBuffer {
    /// `tail = None` keeps everything.
    pub fn new(channel: Channel, tail: Option<usize>) -> Self {
        Self {
            channel,
            tail,
            lines: VecDeque::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        self.total += 1;

        if let Some(tail) = self.tail {
            if self.lines.len() > tail.saturating_mul(2) {
                self.trim_to(tail);
            }
        }
    }

    /// Number of entries currently buffered.
    pub fn buffered(&self) -> usize {
        self.lines.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn finish(mut self) -> ChannelLog {
        if let Some(tail) = self.tail {
            self.trim_to(tail);
        }
        ChannelLog {
            channel: self.channel,
            lines: self.lines.into(),
            total: self.total,
        }
    }

    fn trim_to(&mut self, tail: usize) {
        let excess = self.lines.len().saturating_sub(tail);
        self.lines.drain(..excess);
    }
}

/// Retained lines of one channel plus how many were produced in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLog {
    pub channel: Channel,
    pub lines: Vec<String>,
    pub total: usize,
}

impl ChannelLog {
    pub fn empty(channel: Channel) -> Self {
        Self {
            channel,
            lines: Vec::new(),
            total: 0,
        }
    }

    /// True when fewer lines are retained than were produced.
    pub fn truncated(&self) -> bool {
        self.total > self.lines.len()
    }

    pub fn banner(&self) -> Option<String> {
        self.truncated()
            .then(|| truncation_banner(self.channel, self.lines.len(), self.total))
    }

    /// Retained lines, preceded by the banner lines when truncated.
    pub fn into_lines(self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.lines.len() + 3);
        if let Some(banner) = self.banner() {
            out.extend(banner.lines().map(str::to_string));
        }
        out.extend(self.lines);
        out
    }

    /// Newline-terminated text, preceded by the banner when truncated.
    pub fn render(&self) -> String {
        let mut out = self.banner().unwrap_or_default();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Three-line banner announcing that `channel` shows `shown` of `total` lines.
pub fn truncation_banner(channel: Channel, shown: usize, total: usize) -> String {
    let rule = "#".repeat(BANNER_WIDTH);
    let text = format!(" {channel}: showing last {shown} of {total} lines ");
    let pad = BANNER_WIDTH.saturating_sub(text.chars().count());
    let left = pad / 2;
    let right = pad - left;
    format!(
        "{rule}\n{}{text}{}\n{rule}\n",
        "#".repeat(left),
        "#".repeat(right)
    )
}
