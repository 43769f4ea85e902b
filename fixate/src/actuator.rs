//! Fixed-rate actuator thread.
//!
//! Commands land in a single-slot mailbox; the freshest always wins and
//! nothing queues behind a slow RPC. Stiffness changes bypass the
//! mailbox and reach the shim immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use fixate_types::ControlCommand;

use crate::mailbox::Mailbox;
use crate::robot::RobotShim;

const RATE_HZ: f64 = 50.0;
const MAILBOX_WAIT: Duration = Duration::from_millis(100);

const HEAD_JOINTS: [&str; 2] = ["HeadYaw", "HeadPitch"];

#[derive(Clone)]
pub struct Actuator {
    mailbox: Arc<Mailbox<ControlCommand>>,
    robot: Arc<dyn RobotShim>,
}

impl Actuator {
    pub fn new(robot: Arc<dyn RobotShim>) -> Self {
        Self {
            mailbox: Arc::new(Mailbox::new()),
            robot,
        }
    }

    /// Queue a position command, replacing any unsent one.
    pub fn set_position(&self, yaw: f64, pitch: f64, speed: f64) {
        self.mailbox
            .post(ControlCommand::Position { yaw, pitch, speed });
    }

    /// Queue a velocity command, replacing any unsent one.
    pub fn set_velocity(&self, yaw: f64, pitch: f64) {
        self.mailbox.post(ControlCommand::Velocity { yaw, pitch });
    }

    /// Immediate, not mailboxed.
    pub fn set_stiffness(&self, value: f64) {
        if let Err(e) = self.robot.set_stiffness("Head", value) {
            error!("set_stiffness failed: {e}");
        }
    }

    /// Direct mailbox access for tests.
    pub fn mailbox(&self) -> &Mailbox<ControlCommand> {
        &self.mailbox
    }

    /// Spawn the consumer thread. RPC errors are logged and the thread
    /// keeps running; it exits only when `running` clears.
    pub fn spawn(&self, running: Arc<AtomicBool>) -> std::io::Result<std::thread::JoinHandle<()>> {
        let mailbox = self.mailbox.clone();
        let robot = self.robot.clone();
        let period = Duration::from_secs_f64(1.0 / RATE_HZ);
        std::thread::Builder::new()
            .name("actuator".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    let t0 = Instant::now();
                    match mailbox.take_timeout(MAILBOX_WAIT) {
                        Some(ControlCommand::Position { yaw, pitch, speed }) => {
                            if let Err(e) = robot.set_angles(&HEAD_JOINTS, &[yaw, pitch], speed) {
                                error!("set_angles failed: {e}");
                            }
                        }
                        Some(cmd @ ControlCommand::Velocity { .. }) => {
                            // reserved; the shim has no velocity call
                            debug!("dropping velocity command {cmd:?}");
                        }
                        None => continue,
                    }
                    if let Some(remaining) = period.checked_sub(t0.elapsed()) {
                        std::thread::sleep(remaining);
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::{RecordingShim, RobotCall};

    #[test]
    fn freshest_command_wins() {
        let robot = Arc::new(RecordingShim::default());
        let act = Actuator::new(robot.clone());
        act.set_position(0.1, 0.0, 0.2);
        act.set_position(0.2, 0.0, 0.2);
        act.set_position(0.3, 0.1, 0.2);
        let running = Arc::new(AtomicBool::new(true));
        let handle = act.spawn(running.clone()).unwrap();
        // give the thread a couple of periods
        std::thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        let calls = robot.take_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            RobotCall::SetAngles {
                names: vec!["HeadYaw".to_string(), "HeadPitch".to_string()],
                angles: vec![0.3, 0.1],
                speed: 0.2,
            }
        );
    }

    #[test]
    fn stiffness_bypasses_the_mailbox() {
        let robot = Arc::new(RecordingShim::default());
        let act = Actuator::new(robot.clone());
        act.set_stiffness(0.65);
        // no thread running; the call went straight through
        assert_eq!(
            robot.take_calls(),
            vec![RobotCall::SetStiffness {
                chain: "Head".to_string(),
                value: 0.65,
            }]
        );
    }

    #[test]
    fn velocity_commands_are_not_forwarded() {
        let robot = Arc::new(RecordingShim::default());
        let act = Actuator::new(robot.clone());
        act.set_velocity(0.5, 0.5);
        let running = Arc::new(AtomicBool::new(true));
        let handle = act.spawn(running.clone()).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(robot.take_calls().is_empty());
    }
}
