//! Blocking request/reply client for the external inference service.
//!
//! One request is `[metadata-json, jpeg]`; the reply is a single JSON
//! part `{"data": ...}`. A reply that does not arrive within the
//! round-trip timeout leaves the connection in an unusable half-state,
//! so the socket is dropped and re-opened on the next request.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use fixate_types::wire::{encode_multipart, MultipartCodec};

use crate::interpreter::PerceptionData;

const ROUNDTRIP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct PerceptionReply {
    #[serde(default)]
    data: Option<PerceptionData>,
}

pub struct PerceptionClient {
    addr: String,
    stream: Option<TcpStream>,
}

impl PerceptionClient {
    pub fn new(addr: String) -> Self {
        Self { addr, stream: None }
    }

    /// Submit a frame for inference. Returns `None` on timeout or any
    /// transport error; the connection is re-established on the next
    /// call.
    pub fn detect(&mut self, jpeg: &[u8], target: Option<&str>) -> Option<PerceptionData> {
        match self.roundtrip(jpeg, target) {
            Ok(data) => data,
            Err(e) => {
                info!("perception request failed: {e}; resetting connection");
                self.stream = None;
                None
            }
        }
    }

    pub fn close(&mut self) {
        self.stream = None;
    }

    fn connected(&mut self) -> std::io::Result<&mut TcpStream> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.addr)?;
            stream.set_nodelay(true)?;
            debug!("perception service connected at {}", self.addr);
            self.stream = Some(stream);
        }
        Ok(self.stream.as_mut().expect("just set"))
    }

    fn roundtrip(
        &mut self,
        jpeg: &[u8],
        target: Option<&str>,
    ) -> std::io::Result<Option<PerceptionData>> {
        let meta = match target {
            Some(t) => serde_json::json!({ "target": t }),
            None => serde_json::json!({}),
        };
        let meta_buf = meta.to_string();
        let request = encode_multipart(&[meta_buf.as_bytes(), jpeg]);

        let deadline = Instant::now() + ROUNDTRIP_TIMEOUT;
        let stream = self.connected()?;
        stream.write_all(&request)?;

        let mut codec = MultipartCodec::new();
        let mut chunk = [0u8; 16 * 1024];
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "perception timeout")
                })?;
            stream.set_read_timeout(Some(remaining))?;
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "perception service closed",
                    ));
                }
                Ok(n) => {
                    codec.feed(&chunk[..n]);
                    if let Some(msg) = codec.try_decode().map_err(|e| {
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                    })? {
                        let reply: PerceptionReply = serde_json::from_slice(&msg[0])
                            .map_err(|e| {
                                std::io::Error::new(std::io::ErrorKind::InvalidData, e)
                            })?;
                        return Ok(reply.data);
                    }
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "perception timeout",
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
