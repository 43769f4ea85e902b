//! Scenario tests driving the control loop with a scripted clock.

use std::sync::Arc;

use fixate::actuator::Actuator;
use fixate::config::FixateConfig;
use fixate::orchestrator::{ControlLoop, Shared, TargetRequest};
use fixate::robot::{RecordingShim, RobotCall};
use fixate_types::{BBox, ControlCommand, Detection, JointSample};

struct Rig {
    shared: Arc<Shared>,
    actuator: Actuator,
    robot: Arc<RecordingShim>,
    requests: crossbeam_channel::Sender<TargetRequest>,
    control: ControlLoop,
    now: f64,
}

fn rig_with_config(config: FixateConfig) -> Rig {
    let shared = Arc::new(Shared::new());
    let robot = Arc::new(RecordingShim::default());
    let actuator = Actuator::new(robot.clone());
    let (tx, rx) = crossbeam_channel::unbounded();
    let control = ControlLoop::new(shared.clone(), actuator.clone(), rx, &config);
    robot.take_calls(); // discard the startup stiffness call
    Rig {
        shared,
        actuator,
        robot,
        requests: tx,
        control,
        now: 1000.0,
    }
}

fn rig() -> Rig {
    let mut config = FixateConfig::default();
    config.tuning_path = "/nonexistent/tuning.json".into();
    rig_with_config(config)
}

impl Rig {
    /// Advance one 10 ms tick, feeding a fresh joint sample, and return
    /// whatever command the tick left in the actuator mailbox.
    fn tick(&mut self, detection: Option<Detection>) -> Option<ControlCommand> {
        self.now += 0.01;
        self.shared.state.insert(JointSample {
            timestamp: self.now,
            yaw: 0.0,
            pitch: 0.0,
        });
        if let Some(det) = detection {
            self.shared.detections.post(det);
        }
        self.control.tick(self.now);
        self.actuator.mailbox().take()
    }

    fn centered_detection(&self) -> Detection {
        Detection {
            label: "person".to_string(),
            confidence: 0.9,
            bbox: BBox::new(160.0, 120.0, 160.0, 120.0),
            timestamp: self.now + 0.01,
            source_angles: Some((0.0, 0.0)),
        }
    }

    fn track(&mut self, label: &str) {
        self.requests
            .send(TargetRequest::Track(label.to_string()))
            .unwrap();
    }
}

#[test]
fn idle_without_target() {
    let mut rig = rig();
    for _ in 0..20 {
        let det = rig.centered_detection();
        assert_eq!(rig.tick(Some(det)), None);
    }
    assert!(rig.robot.take_calls().is_empty());
}

#[test]
fn centered_target_produces_centered_commands() {
    let mut rig = rig();
    rig.track("person");
    for _ in 0..30 {
        let det = rig.centered_detection();
        let cmd = rig.tick(Some(det)).expect("command every tick");
        let ControlCommand::Position { yaw, pitch, .. } = cmd else {
            panic!("expected position command, got {cmd:?}");
        };
        assert!(yaw.abs() < 1e-6);
        assert!(pitch.abs() < 1e-6);
    }
}

/// Detections stop; after the lost timeout there is exactly one
/// recenter command and then silence until a detection returns.
#[test]
fn target_loss_recenter_and_recovery() {
    let mut rig = rig();
    rig.track("person");

    for _ in 0..10 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }

    let mut recenters = 0;
    let mut commands_after_recenter = 0;
    for _ in 0..80 {
        match rig.tick(None) {
            Some(ControlCommand::Position { yaw, pitch, speed })
                if yaw == 0.0 && pitch == 0.0 && speed == 0.1 && recenters == 0 =>
            {
                recenters += 1;
            }
            Some(_) if recenters > 0 => commands_after_recenter += 1,
            _ => {}
        }
    }
    assert_eq!(recenters, 1, "expected exactly one recenter command");
    assert_eq!(
        commands_after_recenter, 0,
        "no commands may follow the recenter while lost"
    );

    // a detection revives tracking
    let det = rig.centered_detection();
    assert!(rig.tick(Some(det)).is_some());
    let det = rig.centered_detection();
    assert!(rig.tick(Some(det)).is_some());
}

/// The ghost interval between the last detection and the lost timeout
/// still produces (bounded) commands.
#[test]
fn ghost_interval_keeps_commanding() {
    let mut rig = rig();
    rig.track("person");
    for _ in 0..10 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }
    let mut ghost_commands = 0;
    for _ in 0..40 {
        // 0.4 s < lost timeout
        if rig.tick(None).is_some() {
            ghost_commands += 1;
        }
    }
    assert_eq!(ghost_commands, 40);
}

/// The control tick only ever observes the newest pending detection.
#[test]
fn stale_detections_are_never_observed() {
    let mut rig = rig();
    rig.track("person");

    let mk = |ts: f64, x: f64| Detection {
        label: "person".to_string(),
        confidence: 0.9,
        bbox: BBox::new(x, 120.0, x, 120.0),
        timestamp: ts,
        source_angles: Some((0.0, 0.0)),
    };
    rig.shared.detections.post(mk(rig.now + 0.001, 10.0));
    rig.shared.detections.post(mk(rig.now + 0.002, 20.0));
    let freshest_ts = rig.now + 0.003;
    rig.tick(Some(mk(freshest_ts, 30.0)));

    assert_eq!(*rig.shared.last_measurement_time.lock(), freshest_ts);
    // consumed: a second take yields nothing
    assert!(rig.shared.detections.take().is_none());
}

#[test]
fn stop_target_silences_commands() {
    let mut rig = rig();
    rig.track("person");
    for _ in 0..5 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }
    rig.requests.send(TargetRequest::Stop).unwrap();
    for _ in 0..20 {
        let det = rig.centered_detection();
        assert_eq!(rig.tick(Some(det)), None);
    }
}

#[test]
fn yield_control_halts_the_head() {
    let mut rig = rig();
    rig.track("person");
    for _ in 0..5 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }
    rig.requests.send(TargetRequest::Yield).unwrap();
    rig.now += 0.01;
    rig.control.tick(rig.now);
    assert_eq!(
        rig.actuator.mailbox().take(),
        Some(ControlCommand::Velocity {
            yaw: 0.0,
            pitch: 0.0
        })
    );
}

#[test]
fn tuning_hot_reload_applies_stiffness_changes() {
    let dir = tempfile::tempdir().unwrap();
    let tuning_path = dir.path().join("tuning.json");
    std::fs::write(&tuning_path, "{}").unwrap();

    let mut config = FixateConfig::default();
    config.tuning_path = tuning_path.clone();
    let mut rig = rig_with_config(config);
    rig.track("person");

    // unchanged file across a reload boundary: no stiffness traffic
    for _ in 0..150 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }
    assert!(rig
        .robot
        .take_calls()
        .iter()
        .all(|c| !matches!(c, RobotCall::SetStiffness { .. })));

    std::fs::write(&tuning_path, r#"{"stiffness": {"min": 0.8}}"#).unwrap();
    for _ in 0..110 {
        let det = rig.centered_detection();
        rig.tick(Some(det));
    }
    let stiffness: Vec<_> = rig
        .robot
        .take_calls()
        .into_iter()
        .filter(|c| matches!(c, RobotCall::SetStiffness { .. }))
        .collect();
    assert_eq!(
        stiffness,
        vec![RobotCall::SetStiffness {
            chain: "Head".to_string(),
            value: 0.8,
        }]
    );
    assert_eq!(rig.shared.tuning.read().stiffness.min, 0.8);
}
