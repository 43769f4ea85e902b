//! External command channel: JSON request/reply for operator tooling.
//!
//! Requests are single-part multipart messages holding JSON like
//! `{"command": "track", "target": "person"}`; every request gets a
//! `{"status", "message"}` reply. A failed bind disables the feature
//! and the rest of the system keeps running.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use fixate_types::wire::{encode_multipart, MultipartCodec};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ExternalCommand {
    Track { target: String },
    StopTrack,
}

/// Outcome the handler reports back over the channel.
pub type CommandResult = std::result::Result<String, String>;

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const CLIENT_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Bind and spawn the listener thread. Returns `None` when the bind
/// fails; external commands are then unavailable but nothing else
/// stops.
pub fn spawn<F>(
    bind_addr: String,
    running: Arc<AtomicBool>,
    handler: F,
) -> Option<std::thread::JoinHandle<()>>
where
    F: Fn(ExternalCommand) -> CommandResult + Send + 'static,
{
    let listener = match TcpListener::bind(&bind_addr) {
        Ok(l) => l,
        Err(e) => {
            error!("could not bind command listener to {bind_addr}: {e}; external commands are unavailable");
            return None;
        }
    };
    if let Err(e) = listener.set_nonblocking(true) {
        error!("command listener setup failed: {e}");
        return None;
    }
    info!("external command listener bound to {bind_addr}");

    let join = std::thread::Builder::new()
        .name("command-listener".to_string())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, peer)) => {
                        debug!("command client connected from {peer}");
                        // one client at a time keeps request handling serialized
                        if let Err(e) = serve_client(stream, &running, &handler) {
                            debug!("command client dropped: {e}");
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(ACCEPT_POLL);
                    }
                    Err(e) => {
                        warn!("command listener accept error: {e}");
                        std::thread::sleep(ACCEPT_POLL);
                    }
                }
            }
        })
        .ok()?;
    Some(join)
}

fn serve_client<F>(
    mut stream: TcpStream,
    running: &AtomicBool,
    handler: &F,
) -> std::io::Result<()>
where
    F: Fn(ExternalCommand) -> CommandResult,
{
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;
    let mut codec = MultipartCodec::new();
    let mut chunk = [0u8; 4096];

    while running.load(Ordering::Relaxed) {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                codec.feed(&chunk[..n]);
                while let Some(msg) = codec.try_decode().map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                })? {
                    let reply = handle_request(&msg[0], handler);
                    stream.write_all(&encode_multipart(&[reply.to_string().as_bytes()]))?;
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

fn handle_request<F>(raw: &[u8], handler: &F) -> serde_json::Value
where
    F: Fn(ExternalCommand) -> CommandResult,
{
    match serde_json::from_slice::<ExternalCommand>(raw) {
        Ok(cmd) => match handler(cmd) {
            Ok(message) => serde_json::json!({"status": "ok", "message": message}),
            Err(message) => serde_json::json!({"status": "error", "message": message}),
        },
        Err(e) => {
            warn!("unparseable external command: {e}");
            serde_json::json!({"status": "error", "message": format!("bad command: {e}")})
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_stop_commands_parse() {
        let cmd: ExternalCommand =
            serde_json::from_str(r#"{"command": "track", "target": "bottle"}"#).unwrap();
        assert_eq!(
            cmd,
            ExternalCommand::Track {
                target: "bottle".to_string()
            }
        );
        let cmd: ExternalCommand = serde_json::from_str(r#"{"command": "stop_track"}"#).unwrap();
        assert_eq!(cmd, ExternalCommand::StopTrack);
    }

    #[test]
    fn protocol_errors_are_surfaced_in_the_reply() {
        let reply = handle_request(b"{\"command\": \"dance\"}", &|_| Ok(String::new()));
        assert_eq!(reply["status"], "error");
    }

    #[test]
    fn handler_errors_are_surfaced_in_the_reply() {
        let reply = handle_request(
            b"{\"command\": \"track\", \"target\": \"cup\"}",
            &|_| Err("not now".to_string()),
        );
        assert_eq!(reply["status"], "error");
        assert_eq!(reply["message"], "not now");
    }
}
