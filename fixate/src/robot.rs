//! Upstream robot RPC.
//!
//! The actuator only needs two operations from the middleware shim; the
//! trait keeps the seam mockable for tests. The shim speaks the same
//! multipart framing as every other channel, one JSON part per message.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use fixate_types::wire::{encode_multipart, MultipartCodec};

use crate::error::{FixateError, Result};

pub trait RobotShim: Send + Sync {
    /// Set absolute joint angles with a fraction-of-maximum speed in
    /// `(0, 1]`. Both head joints go in one call so motion starts
    /// synchronized.
    fn set_angles(&self, names: &[&str], angles: &[f64], speed: f64) -> Result<()>;

    /// Set stiffness on a joint chain, effective immediately.
    fn set_stiffness(&self, chain: &str, value: f64) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
enum ShimRequest<'a> {
    SetAngles {
        names: &'a [&'a str],
        angles: &'a [f64],
        speed: f64,
    },
    SetStiffness {
        chain: &'a str,
        value: f64,
    },
}

const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// JSON-over-TCP client for the robot middleware shim.
pub struct ShimClient {
    addr: String,
    stream: Mutex<Option<TcpStream>>,
}

impl ShimClient {
    pub fn new(addr: String) -> Self {
        Self {
            addr,
            stream: Mutex::new(None),
        }
    }

    fn request(&self, body: &ShimRequest<'_>) -> Result<()> {
        let buf = serde_json::to_vec(body)?;
        let msg = encode_multipart(&[&buf]);

        let mut guard = self.stream.lock();
        if guard.is_none() {
            let stream = TcpStream::connect(&self.addr)?;
            stream.set_nodelay(true)?;
            stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
            debug!("robot shim connected at {}", self.addr);
            *guard = Some(stream);
        }
        let stream = guard.as_mut().expect("just set");

        let result = Self::exchange(stream, &msg);
        if result.is_err() {
            // next call reconnects
            *guard = None;
        }
        result
    }

    fn exchange(stream: &mut TcpStream, msg: &[u8]) -> Result<()> {
        stream.write_all(msg)?;
        let mut codec = MultipartCodec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(FixateError::Shim("shim closed connection".to_string()));
            }
            codec.feed(&chunk[..n]);
            if let Some(reply) = codec.try_decode()? {
                let value: serde_json::Value = serde_json::from_slice(&reply[0])?;
                if value.get("status").and_then(|s| s.as_str()) == Some("ok") {
                    return Ok(());
                }
                let message = value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown shim error");
                return Err(FixateError::Shim(message.to_string()));
            }
        }
    }
}

impl RobotShim for ShimClient {
    fn set_angles(&self, names: &[&str], angles: &[f64], speed: f64) -> Result<()> {
        self.request(&ShimRequest::SetAngles {
            names,
            angles,
            speed,
        })
    }

    fn set_stiffness(&self, chain: &str, value: f64) -> Result<()> {
        self.request(&ShimRequest::SetStiffness { chain, value })
    }
}

/// Recorded RPC call, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCall {
    SetAngles {
        names: Vec<String>,
        angles: Vec<f64>,
        speed: f64,
    },
    SetStiffness {
        chain: String,
        value: f64,
    },
}

/// In-memory shim that records every call. Test support.
#[derive(Debug, Default)]
pub struct RecordingShim {
    pub calls: Mutex<Vec<RobotCall>>,
}

impl RecordingShim {
    pub fn take_calls(&self) -> Vec<RobotCall> {
        std::mem::take(&mut self.calls.lock())
    }
}

impl RobotShim for RecordingShim {
    fn set_angles(&self, names: &[&str], angles: &[f64], speed: f64) -> Result<()> {
        self.calls.lock().push(RobotCall::SetAngles {
            names: names.iter().map(|s| s.to_string()).collect(),
            angles: angles.to_vec(),
            speed,
        });
        Ok(())
    }

    fn set_stiffness(&self, chain: &str, value: f64) -> Result<()> {
        self.calls.lock().push(RobotCall::SetStiffness {
            chain: chain.to_string(),
            value,
        });
        Ok(())
    }
}
