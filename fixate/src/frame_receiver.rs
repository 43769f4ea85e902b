//! Video subscriber thread: decodes raw frames and hands the newest one
//! to the vision callback.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::warn;

use fixate_types::wire::decode_timestamp_header;

use crate::frame::{decode_frame, BgrImage};
use crate::subscribe::{run_subscriber, Deliver};

/// Callback invoked on the receiver thread with (capture timestamp,
/// decoded BGR frame). It may block; frames arriving in the meantime are
/// conflated so only the newest is delivered next.
pub type FrameCallback = Box<dyn FnMut(f64, BgrImage) + Send>;

pub struct FrameReceiver {
    join: Option<std::thread::JoinHandle<()>>,
}

impl FrameReceiver {
    /// Start the receiver thread. `running` is the orchestrator-wide
    /// flag; the thread terminates only when it clears.
    pub fn start(
        addr: String,
        running: Arc<AtomicBool>,
        mut callback: FrameCallback,
    ) -> std::io::Result<Self> {
        let join = std::thread::Builder::new()
            .name("frame-rx".to_string())
            .spawn(move || {
                run_subscriber(&addr, b"video", Deliver::Newest, &running, |msg| {
                    if msg.len() != 3 {
                        warn!("malformed video message ({} parts)", msg.len());
                        return;
                    }
                    let Some(timestamp) = decode_timestamp_header(&msg[1]) else {
                        warn!("bad video header length {}", msg[1].len());
                        return;
                    };
                    if let Some(image) = decode_frame(&msg[2]) {
                        callback(timestamp, image);
                    }
                });
            })?;
        Ok(Self { join: Some(join) })
    }

    /// Wait for the thread to finish (after the running flag cleared).
    pub fn join(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("frame receiver thread panicked");
            }
        }
    }
}
