//! Blocking TCP subscriber for the multipart pub/sub channels.
//!
//! The publisher pushes `[topic, ...]` multipart messages; subscribers
//! filter by topic. On any transport error the loop reconnects, so a
//! restarted publisher is picked up without intervention.

use std::io::Read;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use fixate_types::wire::{Multipart, MultipartCodec};

/// Delivery discipline for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliver {
    /// Hand every message to the handler in order (joint state).
    All,
    /// Conflate: when several messages are pending, hand over only the
    /// newest (video frames).
    Newest,
}

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const RECONNECT_DELAY: Duration = Duration::from_millis(500);
const CHUNK: usize = 64 * 1024;

/// Run a subscription until `running` clears. The handler is invoked on
/// the calling thread.
pub fn run_subscriber<F>(
    addr: &str,
    topic: &[u8],
    deliver: Deliver,
    running: &AtomicBool,
    mut handler: F,
) where
    F: FnMut(Multipart),
{
    while running.load(Ordering::Relaxed) {
        let stream = match TcpStream::connect(addr) {
            Ok(s) => s,
            Err(e) => {
                debug!("connect {addr}: {e}");
                interruptible_sleep(running, RECONNECT_DELAY);
                continue;
            }
        };
        info!("subscribed to {addr}");
        if let Err(e) = stream.set_read_timeout(Some(READ_TIMEOUT)) {
            warn!("set_read_timeout: {e}");
            continue;
        }
        if let Err(e) = pump(stream, topic, deliver, running, &mut handler) {
            info!("subscription to {addr} interrupted: {e}; reconnecting");
            interruptible_sleep(running, RECONNECT_DELAY);
        }
    }
}

fn interruptible_sleep(running: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(50);
    let mut remaining = total;
    while running.load(Ordering::Relaxed) && remaining > Duration::ZERO {
        std::thread::sleep(step.min(remaining));
        remaining = remaining.saturating_sub(step);
    }
}

fn pump<F>(
    mut stream: TcpStream,
    topic: &[u8],
    deliver: Deliver,
    running: &AtomicBool,
    handler: &mut F,
) -> std::io::Result<()>
where
    F: FnMut(Multipart),
{
    let mut codec = MultipartCodec::new();
    let mut chunk = vec![0u8; CHUNK];

    while running.load(Ordering::Relaxed) {
        match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "publisher closed",
                ));
            }
            Ok(n) => {
                codec.feed(&chunk[..n]);
                match deliver {
                    Deliver::All => {
                        while let Some(msg) = decode_or_bail(&mut codec)? {
                            if msg[0] == topic {
                                handler(msg);
                            }
                        }
                    }
                    Deliver::Newest => {
                        // Pull in whatever else is already queued so a
                        // slow handler sees only the freshest message.
                        drain_available(&mut stream, &mut codec)?;
                        let mut latest = None;
                        while let Some(msg) = decode_or_bail(&mut codec)? {
                            if msg[0] == topic {
                                latest = Some(msg);
                            }
                        }
                        if let Some(msg) = latest {
                            handler(msg);
                        }
                    }
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn decode_or_bail(codec: &mut MultipartCodec) -> std::io::Result<Option<Multipart>> {
    codec
        .try_decode()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

/// Read everything currently available without blocking.
fn drain_available(stream: &mut TcpStream, codec: &mut MultipartCodec) -> std::io::Result<()> {
    stream.set_nonblocking(true)?;
    let mut chunk = vec![0u8; CHUNK];
    let result = loop {
        match stream.read(&mut chunk) {
            Ok(0) => {
                break Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "publisher closed",
                ));
            }
            Ok(n) => codec.feed(&chunk[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    result
}
