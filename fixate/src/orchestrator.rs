//! Wires the receivers, perception, tracker and actuator together and
//! owns every thread.
//!
//! Thread layout: frame receiver, joint-state receiver, actuator,
//! 100 Hz control loop, external command listener. Perception requests
//! run on the frame receiver thread and block it; the single-slot
//! detection mailbox absorbs the resulting jitter.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use fixate_tracking::HeadTracker;
use fixate_types::{unix_time, ControlCommand, Detection, TuningConfig};

use crate::actuator::Actuator;
use crate::command_listener::{self, ExternalCommand};
use crate::config::FixateConfig;
use crate::error::Result;
use crate::frame::encode_jpeg;
use crate::frame_receiver::{FrameCallback, FrameReceiver};
use crate::interpreter;
use crate::mailbox::Mailbox;
use crate::perception::PerceptionClient;
use crate::robot::RobotShim;
use crate::state_buffer::{self, StateBuffer};
use crate::telemetry::{TelemetryLog, TelemetryRow};

const CONTROL_RATE_HZ: f64 = 100.0;
/// After this long without a measurement the loop stops commanding
/// entirely, beyond the recenter issued at the (shorter) lost timeout.
const HARD_TIMEOUT: f64 = 1.0;
const RECENTER_SPEED: f64 = 0.1;
const TUNING_RELOAD_TICKS: u64 = 100;
const JPEG_QUALITY: u8 = 75;

/// State shared between the control thread, the vision callback and the
/// command intake.
pub struct Shared {
    pub state: Arc<StateBuffer>,
    pub detections: Mailbox<Detection>,
    pub active_target: Mutex<Option<String>>,
    /// Capture timestamp of the most recent accepted detection;
    /// 0.0 until the first one arrives.
    pub last_measurement_time: Mutex<f64>,
    pub tuning: RwLock<Arc<TuningConfig>>,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StateBuffer::default()),
            detections: Mailbox::new(),
            active_target: Mutex::new(None),
            last_measurement_time: Mutex::new(0.0),
            tuning: RwLock::new(Arc::new(TuningConfig::default())),
        }
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// Target changes requested from other threads, applied at the top of
/// the next control tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetRequest {
    Track(String),
    Stop,
    /// Stop and actively halt the head, used when an external behavior
    /// takes over.
    Yield,
}

/// The 100 Hz control loop, separated from its thread so ticks can be
/// driven with scripted clocks in tests.
pub struct ControlLoop {
    shared: Arc<Shared>,
    actuator: Actuator,
    tracker: HeadTracker,
    requests: Receiver<TargetRequest>,
    tuning_path: PathBuf,
    tuning_raw: String,
    last_stiffness: Option<f64>,
    target_lost: bool,
    tick_count: u64,
    telemetry: Option<TelemetryLog>,
}

impl ControlLoop {
    pub fn new(
        shared: Arc<Shared>,
        actuator: Actuator,
        requests: Receiver<TargetRequest>,
        config: &FixateConfig,
    ) -> Self {
        let (tuning_raw, tuning) = match std::fs::read_to_string(&config.tuning_path) {
            Ok(buf) => match TuningConfig::from_json(&buf) {
                Ok(t) => (buf, Arc::new(t)),
                Err(e) => {
                    warn!("tuning parse error ({e}); starting from defaults");
                    (String::new(), Arc::new(TuningConfig::default()))
                }
            },
            Err(e) => {
                info!(
                    "no tuning file at {} ({e}); starting from defaults",
                    config.tuning_path.display()
                );
                (String::new(), Arc::new(TuningConfig::default()))
            }
        };
        *shared.tuning.write() = tuning.clone();

        let tracker = HeadTracker::new(config.frame_width, config.frame_height, tuning.clone());

        actuator.set_stiffness(tuning.stiffness.min);

        let telemetry = config.telemetry_csv.as_ref().and_then(|path| {
            match TelemetryLog::create(path, unix_time()) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!("cannot open telemetry log {}: {e}", path.display());
                    None
                }
            }
        });

        Self {
            shared,
            actuator,
            tracker,
            requests,
            tuning_path: config.tuning_path.clone(),
            tuning_raw,
            last_stiffness: Some(tuning.stiffness.min),
            target_lost: false,
            tick_count: 0,
            telemetry,
        }
    }

    /// Run until the flag clears, pacing ticks with the wall clock.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        let period = Duration::from_secs_f64(1.0 / CONTROL_RATE_HZ);
        while running.load(Ordering::Relaxed) {
            let t0 = Instant::now();
            self.tick(unix_time());
            if let Some(remaining) = period.checked_sub(t0.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
    }

    /// One control tick at time `now`.
    pub fn tick(&mut self, now: f64) {
        self.tick_count += 1;

        while let Ok(req) = self.requests.try_recv() {
            self.apply_request(req);
        }

        if self.shared.active_target.lock().is_none() {
            return;
        }

        // Consume at most one detection; the mailbox guarantees it is
        // the newest and never re-observed.
        let detection = self.shared.detections.take();
        if let Some(det) = &detection {
            *self.shared.last_measurement_time.lock() = det.timestamp;
            if self.target_lost {
                debug!("target reacquired");
                self.target_lost = false;
            }
        }

        let tuning = self.shared.tuning.read().clone();
        let last_measurement = *self.shared.last_measurement_time.lock();

        if last_measurement > 0.0
            && now - last_measurement > tuning.native.target_lost_timeout
        {
            if !self.target_lost {
                info!(
                    "target lost after {:.2}s without measurement; recentering",
                    now - last_measurement
                );
                self.tracker.reset();
                self.actuator.set_position(0.0, 0.0, RECENTER_SPEED);
                self.target_lost = true;
                self.log_telemetry(now, false, None, None);
            }
            return;
        }

        if self.tick_count % TUNING_RELOAD_TICKS == 0 {
            self.reload_tuning();
        }

        if last_measurement > 0.0 && now - last_measurement > HARD_TIMEOUT {
            self.actuator.set_velocity(0.0, 0.0);
            return;
        }

        let current_state = self.shared.state.at(now);
        let latency = detection.as_ref().map(|d| now - d.timestamp);
        let command = self.tracker.update(detection.as_ref(), current_state, now);

        match command {
            Some(ControlCommand::Position { yaw, pitch, speed }) => {
                self.actuator.set_position(yaw, pitch, speed);
                self.log_telemetry(now, detection.is_some(), Some((yaw, pitch)), latency);
            }
            Some(ControlCommand::Velocity { yaw, pitch }) => {
                self.actuator.set_velocity(yaw, pitch);
                self.log_telemetry(now, detection.is_some(), Some((yaw, pitch)), latency);
            }
            None => {
                self.log_telemetry(now, detection.is_some(), None, latency);
            }
        }
    }

    fn log_telemetry(
        &mut self,
        now: f64,
        measured: bool,
        cmd: Option<(f64, f64)>,
        latency: Option<f64>,
    ) {
        if let Some(log) = self.telemetry.as_mut() {
            log.append(
                now,
                TelemetryRow {
                    time: 0.0,
                    measured,
                    cmd_yaw: cmd.map(|c| c.0),
                    cmd_pitch: cmd.map(|c| c.1),
                    latency,
                    target_lost: self.target_lost,
                },
            );
        }
    }

    fn apply_request(&mut self, req: TargetRequest) {
        match req {
            TargetRequest::Track(label) => self.set_target(Some(label)),
            TargetRequest::Stop => self.set_target(None),
            TargetRequest::Yield => {
                self.set_target(None);
                self.actuator.set_velocity(0.0, 0.0);
            }
        }
    }

    /// Change (or clear) the tracked label. Any change resets the
    /// tracker and discards the pending detection.
    fn set_target(&mut self, label: Option<String>) {
        let mut active = self.shared.active_target.lock();
        if *active == label {
            return;
        }
        info!("target changed: {:?} -> {:?}", *active, label);
        *active = label;
        drop(active);
        self.tracker.reset();
        self.target_lost = false;
        *self.shared.last_measurement_time.lock() = 0.0;
        self.shared.detections.take();
    }

    fn reload_tuning(&mut self) {
        let buf = match std::fs::read_to_string(&self.tuning_path) {
            Ok(buf) => buf,
            Err(e) => {
                debug!("tuning file unreadable: {e}");
                return;
            }
        };
        if buf == self.tuning_raw {
            return;
        }
        match TuningConfig::from_json(&buf) {
            Ok(t) => {
                info!("tuning reloaded from {}", self.tuning_path.display());
                let tuning = Arc::new(t);
                *self.shared.tuning.write() = tuning.clone();
                self.tracker.set_tuning(tuning.clone());
                if self.last_stiffness != Some(tuning.stiffness.min) {
                    self.actuator.set_stiffness(tuning.stiffness.min);
                    self.last_stiffness = Some(tuning.stiffness.min);
                }
                self.tuning_raw = buf;
            }
            Err(e) => {
                warn!("tuning parse error ({e}); keeping previous snapshot");
            }
        }
    }
}

pub struct Orchestrator {
    running: Arc<AtomicBool>,
    shared: Arc<Shared>,
    requests_tx: Sender<TargetRequest>,
    frame_receiver: Option<FrameReceiver>,
    command_join: Option<std::thread::JoinHandle<()>>,
    state_join: Option<std::thread::JoinHandle<()>>,
    actuator_join: Option<std::thread::JoinHandle<()>>,
    control_join: Option<std::thread::JoinHandle<()>>,
}

impl Orchestrator {
    /// Start every thread. The returned handle owns them; dropping it
    /// stops the system.
    pub fn start(config: FixateConfig, robot: Arc<dyn RobotShim>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(Shared::new());
        let actuator = Actuator::new(robot);
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded();

        let state_join = state_buffer::spawn_receiver(
            config.joints_addr.clone(),
            running.clone(),
            shared.state.clone(),
        )?;

        let actuator_join = actuator.spawn(running.clone())?;

        let frame_receiver = FrameReceiver::start(
            config.video_addr.clone(),
            running.clone(),
            Self::vision_callback(
                shared.clone(),
                running.clone(),
                PerceptionClient::new(config.perception_addr.clone()),
            ),
        )?;

        let command_join = command_listener::spawn(
            config.command_bind_addr.clone(),
            running.clone(),
            Self::command_handler(requests_tx.clone()),
        );

        let control = ControlLoop::new(shared.clone(), actuator, requests_rx, &config);
        let control_running = running.clone();
        let control_join = std::thread::Builder::new()
            .name("control-loop".to_string())
            .spawn(move || control.run(control_running))?;

        Ok(Self {
            running,
            shared,
            requests_tx,
            frame_receiver: Some(frame_receiver),
            command_join,
            state_join: Some(state_join),
            actuator_join: Some(actuator_join),
            control_join: Some(control_join),
        })
    }

    /// The per-frame pipeline: perception round-trip, interpretation,
    /// mailbox deposit. Runs on the frame receiver thread.
    fn vision_callback(
        shared: Arc<Shared>,
        running: Arc<AtomicBool>,
        mut perception: PerceptionClient,
    ) -> FrameCallback {
        Box::new(move |capture_ts, image| {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            let Some(target) = shared.active_target.lock().clone() else {
                return;
            };
            let jpeg = match encode_jpeg(&image, JPEG_QUALITY) {
                Ok(j) => j,
                Err(e) => {
                    warn!("jpeg encode failed: {e}");
                    return;
                }
            };
            let Some(data) = perception.detect(&jpeg, Some(&target)) else {
                return;
            };
            let source_angles = shared.state.at(capture_ts);
            if let Some(detection) = interpreter::interpret(
                &data,
                &target,
                image.width,
                image.height,
                capture_ts,
                source_angles,
            ) {
                shared.detections.post(detection);
                *shared.last_measurement_time.lock() = capture_ts;
            }
        })
    }

    fn command_handler(
        tx: Sender<TargetRequest>,
    ) -> impl Fn(ExternalCommand) -> command_listener::CommandResult + Send + 'static {
        move |cmd| match cmd {
            ExternalCommand::Track { target } => {
                if target.trim().is_empty() {
                    return Err("empty target".to_string());
                }
                tx.send(TargetRequest::Track(target.clone()))
                    .map_err(|e| e.to_string())?;
                Ok(format!("tracking {target}"))
            }
            ExternalCommand::StopTrack => {
                tx.send(TargetRequest::Stop).map_err(|e| e.to_string())?;
                Ok("tracking stopped".to_string())
            }
        }
    }

    pub fn set_target(&self, label: Option<&str>) {
        let req = match label {
            Some(l) => TargetRequest::Track(l.to_string()),
            None => TargetRequest::Stop,
        };
        if self.requests_tx.send(req).is_err() {
            warn!("control loop gone; target request dropped");
        }
    }

    /// Clear the target and halt the head so an external behavior can
    /// take it.
    pub fn yield_control(&self) {
        if self.requests_tx.send(TargetRequest::Yield).is_err() {
            warn!("control loop gone; yield request dropped");
        }
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Block until the control thread exits (i.e. until [`stop`] is
    /// called from elsewhere or the process dies).
    ///
    /// [`stop`]: Orchestrator::stop
    pub fn wait(&mut self) {
        if let Some(join) = self.control_join.take() {
            if join.join().is_err() {
                warn!("control thread panicked");
            }
        }
    }

    /// Stop order: command listener, frame receiver, joint-state
    /// receiver, actuator, control thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(join) = self.command_join.take() {
            if join.join().is_err() {
                warn!("command listener panicked");
            }
        }
        if let Some(mut receiver) = self.frame_receiver.take() {
            receiver.join();
        }
        if let Some(join) = self.state_join.take() {
            if join.join().is_err() {
                warn!("joint-state receiver panicked");
            }
        }
        if let Some(join) = self.actuator_join.take() {
            if join.join().is_err() {
                warn!("actuator thread panicked");
            }
        }
        if let Some(join) = self.control_join.take() {
            if join.join().is_err() {
                warn!("control thread panicked");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}
