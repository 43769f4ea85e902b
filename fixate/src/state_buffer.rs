//! Time-indexed buffer of joint-state telemetry.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use fixate_types::{JointSample, JOINT_RECORD_SIZE};

use crate::subscribe::{run_subscriber, Deliver};

/// Samples are usable up to this far outside the buffered range.
const SLACK: f64 = 0.05;

pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded ring of joint samples ordered by timestamp, with
/// interpolated lookup.
///
/// At the nominal 50 Hz publish rate the 200-sample ring covers a ~4 s
/// window, comfortably more than the worst perception latency.
#[derive(Debug)]
pub struct StateBuffer {
    ring: Mutex<VecDeque<JointSample>>,
    capacity: usize,
}

impl Default for StateBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl StateBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a sample. The ring is strictly append-only in time:
    /// out-of-order samples are dropped.
    pub fn insert(&self, sample: JointSample) {
        let mut ring = self.ring.lock();
        if let Some(back) = ring.back() {
            if sample.timestamp < back.timestamp {
                debug!(
                    "dropping out-of-order joint sample ({} < {})",
                    sample.timestamp, back.timestamp
                );
                return;
            }
        }
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(sample);
    }

    pub fn latest(&self) -> Option<JointSample> {
        self.ring.lock().back().copied()
    }

    /// Interpolated (yaw, pitch) at `query_t`.
    ///
    /// `None` when the ring is empty or the query predates the window by
    /// more than the slack; queries past the newest sample clamp to it.
    pub fn at(&self, query_t: f64) -> Option<(f64, f64)> {
        let ring = self.ring.lock();
        let first = ring.front()?;
        let last = ring.back()?;

        if query_t < first.timestamp - SLACK {
            return None;
        }
        if query_t >= last.timestamp {
            // includes the +slack window and anything newer (clamp-to-end)
            return Some((last.yaw, last.pitch));
        }
        if query_t <= first.timestamp {
            return Some((first.yaw, first.pitch));
        }

        // first bracketing index with timestamp > query_t
        let idx = ring.partition_point(|s| s.timestamp <= query_t);
        let s0 = ring[idx - 1];
        let s1 = ring[idx];
        let span = s1.timestamp - s0.timestamp;
        let alpha = if span > 0.0 {
            (query_t - s0.timestamp) / span
        } else {
            0.0
        };
        Some((
            s0.yaw + alpha * (s1.yaw - s0.yaw),
            s0.pitch + alpha * (s1.pitch - s0.pitch),
        ))
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }
}

/// Spawn the receiver thread feeding `buffer` from the joint-state
/// channel.
pub fn spawn_receiver(
    addr: String,
    running: Arc<AtomicBool>,
    buffer: Arc<StateBuffer>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("joint-state-rx".to_string())
        .spawn(move || {
            run_subscriber(&addr, b"joints", Deliver::All, &running, |msg| {
                if msg.len() != 2 || msg[1].len() != JOINT_RECORD_SIZE {
                    warn!("malformed joint-state message ({} parts)", msg.len());
                    return;
                }
                if let Some(sample) = JointSample::from_record(&msg[1]) {
                    buffer.insert(sample);
                }
            });
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(t: f64, yaw: f64) -> JointSample {
        JointSample {
            timestamp: t,
            yaw,
            pitch: yaw / 2.0,
        }
    }

    #[test]
    fn empty_buffer_has_no_answer() {
        let buf = StateBuffer::default();
        assert_eq!(buf.at(0.0), None);
    }

    #[test]
    fn midpoint_interpolation() {
        let buf = StateBuffer::default();
        buf.insert(sample(0.00, 0.0));
        buf.insert(sample(0.10, 1.0));
        let (yaw, pitch) = buf.at(0.05).unwrap();
        assert_relative_eq!(yaw, 0.5, epsilon = 1e-9);
        assert_relative_eq!(pitch, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn too_old_query_is_refused() {
        let buf = StateBuffer::default();
        buf.insert(sample(0.00, 0.0));
        buf.insert(sample(0.10, 1.0));
        assert_eq!(buf.at(-0.06), None);
        // within the slack, clamps to the first sample
        assert_eq!(buf.at(-0.04), Some((0.0, 0.0)));
    }

    #[test]
    fn future_query_clamps_to_latest() {
        let buf = StateBuffer::default();
        buf.insert(sample(0.00, 0.0));
        buf.insert(sample(0.10, 1.0));
        assert_eq!(buf.at(0.14), Some((1.0, 0.5)));
        // exactly at and beyond the slack boundary, still the latest
        assert_eq!(buf.at(0.15), Some((1.0, 0.5)));
        assert_eq!(buf.at(0.151), Some((1.0, 0.5)));
    }

    #[test]
    fn out_of_order_samples_are_dropped() {
        let buf = StateBuffer::default();
        buf.insert(sample(1.0, 0.0));
        buf.insert(sample(0.5, 9.0));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.latest().unwrap().timestamp, 1.0);
    }

    #[test]
    fn ring_is_bounded() {
        let buf = StateBuffer::with_capacity(10);
        for k in 0..25 {
            buf.insert(sample(k as f64, k as f64));
        }
        assert_eq!(buf.len(), 10);
        // oldest surviving sample is k=15
        assert_eq!(buf.at(15.0), Some((15.0, 7.5)));
        assert_eq!(buf.at(14.9 - SLACK - 1e-9), None);
    }

    #[test]
    fn interpolation_stays_in_convex_hull() {
        let buf = StateBuffer::default();
        buf.insert(sample(0.0, -0.3));
        buf.insert(sample(0.1, 0.7));
        buf.insert(sample(0.2, 0.1));
        for k in 0..200 {
            let t = k as f64 * 0.001;
            let (yaw, _) = buf.at(t).unwrap();
            assert!((-0.3..=0.7).contains(&yaw));
        }
    }
}
