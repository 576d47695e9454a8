#![allow(dead_code)]

pub use backup_supervisor_test_utils::builders::{
    policy, ConfigBuilder, Harness, StartOptionsBuilder, DEPLOYMENT, INSTANCE_ID,
    NO_BACKUP_PLAN_ID, PLAN_ID,
};
pub use backup_supervisor_test_utils::fake_agent::{status, FakeAgent};
pub use backup_supervisor_test_utils::{init_tracing, with_timeout, RecordingScheduler};

use backup_supervisor::stream::{Channel, FrameHeader};

/// Encode one frame: 8-byte header followed by `payload`.
pub fn frame(channel: Channel, payload: &str) -> Vec<u8> {
    let mut out = FrameHeader::encode(channel, payload.len() as u32).to_vec();
    out.extend_from_slice(payload.as_bytes());
    out
}

/// Concatenate frames into one stream.
pub fn stream(frames: &[(Channel, &str)]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|(channel, payload)| frame(*channel, payload))
        .collect()
}
