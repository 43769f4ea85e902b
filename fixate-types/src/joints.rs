use byteorder::{ByteOrder, NativeEndian};
use serde::{Deserialize, Serialize};

/// Packed on-wire size of one joint-state record: f64 timestamp, f32 yaw,
/// f32 pitch.
pub const JOINT_RECORD_SIZE: usize = 16;

/// One timestamped head pose sample from the joint-state publisher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSample {
    /// Unix seconds, publisher clock.
    pub timestamp: f64,
    /// Head yaw, radians. Positive is left.
    pub yaw: f64,
    /// Head pitch, radians. Positive is down.
    pub pitch: f64,
}

impl JointSample {
    /// Decode the 16-byte packed record. The publisher runs on the same
    /// host, so the record is native byte order (the video header, in
    /// contrast, is explicitly little-endian).
    pub fn from_record(buf: &[u8]) -> Option<Self> {
        if buf.len() != JOINT_RECORD_SIZE {
            return None;
        }
        Some(Self {
            timestamp: NativeEndian::read_f64(&buf[0..8]),
            yaw: NativeEndian::read_f32(&buf[8..12]) as f64,
            pitch: NativeEndian::read_f32(&buf[12..16]) as f64,
        })
    }

    pub fn to_record(&self) -> [u8; JOINT_RECORD_SIZE] {
        let mut buf = [0u8; JOINT_RECORD_SIZE];
        NativeEndian::write_f64(&mut buf[0..8], self.timestamp);
        NativeEndian::write_f32(&mut buf[8..12], self.yaw as f32);
        NativeEndian::write_f32(&mut buf[12..16], self.pitch as f32);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let orig = JointSample {
            timestamp: 1234.5678,
            yaw: -0.25,
            pitch: 0.125,
        };
        let decoded = JointSample::from_record(&orig.to_record()).unwrap();
        assert_eq!(decoded.timestamp, orig.timestamp);
        // yaw/pitch pass through f32
        assert!((decoded.yaw - orig.yaw).abs() < 1e-6);
        assert!((decoded.pitch - orig.pitch).abs() < 1e-6);
    }

    #[test]
    fn wrong_size_rejected() {
        assert!(JointSample::from_record(&[0u8; 15]).is_none());
        assert!(JointSample::from_record(&[0u8; 17]).is_none());
    }
}
