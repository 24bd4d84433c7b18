mod support;

use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use hand_overlay::{
    CaptureError, ConfigError, DetectionOptions, GestureKind, PipelineState, Resolution,
    pipeline::DetectorStatus,
};

use support::{
    CameraEvent, FakeCamera, FakeLandmarker, LandmarkEvent, canvas_color, controller,
    controller_with, device_color, init_logging, open_hand, pinch_hand, pump_until,
};

fn running_on(device: &str) -> PipelineState {
    PipelineState::Running {
        device_id: device.to_string(),
    }
}

fn position(events: &[CameraEvent], pred: impl Fn(&CameraEvent) -> bool) -> usize {
    events
        .iter()
        .position(pred)
        .expect("event present in camera log")
}

#[test]
fn start_enumerates_and_runs_first_camera() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand()]);
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert_eq!(c.cameras().len(), 2);
    assert!(pump_until(&mut c, |c| !c.gestures().is_empty()));

    assert_eq!(c.state(), &running_on("cam0"));
    let session = c.session();
    assert!(session.running);
    assert_eq!(session.selected_device_id.as_deref(), Some("cam0"));
    assert_eq!(session.detector, DetectorStatus::Ready);

    let gesture = c.current_gesture();
    assert_eq!(gesture.kind, GestureKind::Pinch);
    assert_abs_diff_eq!(gesture.pinch_distance, 0.02, epsilon = 1e-4);
    assert_eq!(gesture.fingertips.len(), 5);
    assert_abs_diff_eq!(gesture.fingertips[1].x, 0.48, epsilon = 1e-6);
    assert_eq!(canvas_color(&c), Some(device_color("cam0")));
}

#[test]
fn fps_is_committed_after_a_second_of_frames() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.fps() > 0));
    assert_eq!(c.session().fps_text(), format!("FPS: {}", c.fps()));
}

#[test]
fn max_hands_change_restarts_capture_and_rebinds_once() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand()]);
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.is_running()
        && c.session().detector == DetectorStatus::Ready));
    assert_eq!(camera.opens(), 1);

    c.update_options(|o| o.max_hands = 2).unwrap();
    assert!(!c.is_running());
    assert!(pump_until(&mut c, |c| c.is_running()
        && c.session().detector == DetectorStatus::Ready));

    assert_eq!(camera.opens(), 2);
    assert_eq!(camera.stops(), 1);
    let events = camera.events();
    let stop = position(&events, |e| matches!(e, CameraEvent::Stop(_)));
    let reopen = events
        .iter()
        .rposition(|e| matches!(e, CameraEvent::Open { .. }))
        .unwrap();
    assert!(stop < reopen);

    assert_eq!(landmarks.creates(), 2);
    assert_eq!(landmarks.closes(), 1);
    match landmarks.events().last() {
        Some(LandmarkEvent::Create(options)) => assert_eq!(options.max_hands, 2),
        other => panic!("expected a fresh binding, got {other:?}"),
    }
}

#[test]
fn switching_device_releases_old_stream_before_new_frames() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.frames_rendered() > 0));

    c.select_camera("cam1").unwrap();
    assert!(pump_until(&mut c, |c| c.is_running()
        && canvas_color(c) == Some(device_color("cam1"))));
    assert_eq!(c.state(), &running_on("cam1"));

    let events = camera.events();
    let stop_old = position(&events, |e| *e == CameraEvent::Stop("cam0".into()));
    let open_new = position(
        &events,
        |e| matches!(e, CameraEvent::Open { device, .. } if device == "cam1"),
    );
    let first_new_frame = position(&events, |e| *e == CameraEvent::Frame("cam1".into()));
    assert!(stop_old < open_new);
    assert!(stop_old < first_new_frame);
    assert!(!events[stop_old..]
        .iter()
        .any(|e| *e == CameraEvent::Frame("cam0".into())));
}

#[test]
fn camera_only_changes_reuse_the_binding() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.is_running()
        && c.session().detector == DetectorStatus::Ready));

    c.select_camera("cam1").unwrap();
    assert!(pump_until(&mut c, |c| c.state() == &running_on("cam1")));

    c.update_options(|o| o.resolution = Resolution::HD).unwrap();
    assert!(pump_until(&mut c, |c| c.is_running()));

    assert_eq!(landmarks.creates(), 1);
    assert_eq!(landmarks.closes(), 0);
    match camera.events().iter().rev().find(|e| matches!(e, CameraEvent::Open { .. })) {
        Some(CameraEvent::Open { device, resolution }) => {
            assert_eq!(device, "cam1");
            assert_eq!(*resolution, Resolution::HD);
        }
        other => panic!("unexpected last open {other:?}"),
    }
}

#[test]
fn reselecting_running_camera_is_a_no_op() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.is_running()));
    c.select_camera("cam0").unwrap();
    c.pump_timeout(Duration::from_millis(50));

    assert!(c.is_running());
    assert_eq!(camera.opens(), 1);
    assert_eq!(camera.stops(), 0);
}

#[test]
fn unknown_camera_is_rejected() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    let err = c.select_camera("missing").unwrap_err();
    assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
}

#[test]
fn failed_start_stops_without_crashing_and_can_recover() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    camera.fail_device("cam0", CaptureError::PermissionDenied("blocked".into()));
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| matches!(
        c.state(),
        PipelineState::Stopped { .. }
    )));

    let session = c.session();
    assert!(!session.running);
    assert_eq!(session.camera_text(), "Camera: inactive");
    assert_eq!(
        session.last_error,
        Some(CaptureError::PermissionDenied("blocked".into()))
    );
    assert_eq!(c.frames_rendered(), 0);
    assert_eq!(camera.opens(), 0);

    c.select_camera("cam1").unwrap();
    assert!(pump_until(&mut c, |c| c.state() == &running_on("cam1")));
    assert_eq!(c.session().last_error, None);
}

#[test]
fn unavailable_detector_still_renders_raw_video() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::unavailable();
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.frames_rendered() > 2
        && matches!(c.session().detector, DetectorStatus::Unavailable(_))));

    assert!(c.is_running());
    assert!(c.gestures().is_empty());
    assert_eq!(c.current_gesture().kind, GestureKind::None);
    assert_eq!(canvas_color(&c), Some(device_color("cam0")));
    assert!(c.session().detector_text().starts_with("Detector unavailable"));
}

#[test]
fn superseded_start_is_discarded_and_released() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    camera.delay_open("cam0", Duration::from_millis(300));
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(matches!(c.state(), PipelineState::Starting { .. }));
    c.select_camera("cam1").unwrap();
    assert!(matches!(c.state(), PipelineState::Restarting { .. }));

    assert!(pump_until(&mut c, |c| c.is_running()
        && canvas_color(c) == Some(device_color("cam1"))));
    assert_eq!(c.state(), &running_on("cam1"));

    let events = camera.events();
    let stale_stop = position(&events, |e| *e == CameraEvent::Stop("cam0".into()));
    let open_new = position(
        &events,
        |e| matches!(e, CameraEvent::Open { device, .. } if device == "cam1"),
    );
    assert!(stale_stop < open_new);
    assert_eq!(camera.opens(), camera.stops() + 1);
}

#[test]
fn empty_enumeration_does_not_start() {
    init_logging();
    let camera = FakeCamera::new(&[]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    c.pump_timeout(Duration::from_millis(100));

    assert_eq!(c.state(), &PipelineState::Idle);
    assert_eq!(c.session().selected_device_id, None);
    assert!(camera.events().is_empty());
}

#[test]
fn out_of_range_options_are_rejected_without_restart() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| c.is_running()));

    let err = c.update_options(|o| o.max_hands = 6).unwrap_err();
    assert_eq!(err, ConfigError::MaxHands(6));
    assert_eq!(c.options().max_hands, 1);
    assert!(c.is_running());
    assert_eq!(camera.opens(), 1);
}

#[test]
fn shutdown_releases_stream_and_binding() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand()]);
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| !c.gestures().is_empty()));

    c.shutdown();
    assert_eq!(c.state(), &PipelineState::Idle);
    assert!(!c.session().running);
    assert_eq!(camera.opens(), camera.stops());
    assert_eq!(landmarks.creates(), landmarks.closes());

    // A second shutdown (and the drop) is harmless.
    c.shutdown();
    drop(c);
    assert_eq!(camera.stops(), 1);
}

#[test]
fn dropping_controller_mid_start_releases_the_late_stream() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    camera.delay_open("cam0", Duration::from_millis(100));
    let landmarks = FakeLandmarker::with_hands(Vec::new());
    let mut c = controller(&camera, &landmarks);

    c.start();
    drop(c);

    assert_eq!(camera.opens(), 1);
    assert_eq!(camera.stops(), 1);
}

#[test]
fn two_hands_are_classified_per_slot() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand(), open_hand()]);
    let options = DetectionOptions {
        max_hands: 2,
        ..DetectionOptions::default()
    };
    let mut c = controller_with(&camera, &landmarks, options);

    c.start();
    assert!(pump_until(&mut c, |c| c.gestures().len() == 2));

    let gestures = c.gestures().to_vec();
    assert_eq!(c.hands().len(), 2);
    assert_eq!(gestures[0].kind, GestureKind::Pinch);
    assert_eq!(gestures[1].kind, GestureKind::OpenHand);
    assert_abs_diff_eq!(gestures[1].pinch_distance, 0.2, epsilon = 1e-4);
    assert_eq!(c.current_gesture(), gestures[1]);
}

#[test]
fn rebinding_the_detector_does_not_block_the_caller() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_delays(
        vec![pinch_hand()],
        Duration::from_millis(800),
        Duration::ZERO,
    );
    let mut c = controller(&camera, &landmarks);

    c.start();
    let begun = Instant::now();
    c.update_options(|o| o.max_hands = 2).unwrap();
    assert!(begun.elapsed() < Duration::from_millis(300));

    assert!(pump_until(&mut c, |c| c.is_running()
        && c.session().detector == DetectorStatus::Ready));

    let first = DetectionOptions::default().inference();
    let second = c.options().inference();
    assert_eq!(second.max_hands, 2);
    // The old model is closed before the new one loads.
    assert_eq!(
        landmarks.events(),
        vec![
            LandmarkEvent::Create(first),
            LandmarkEvent::Close,
            LandmarkEvent::Create(second),
        ]
    );
}

#[test]
fn results_from_a_closed_binding_never_surface() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    let landmarks = FakeLandmarker::with_delays(
        vec![pinch_hand()],
        Duration::ZERO,
        Duration::from_millis(150),
    );
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| !c.hands().is_empty()));
    assert_eq!(c.hands()[0].confidence, 0.7);

    c.update_options(|o| o.min_detection_confidence = 0.5).unwrap();
    assert!(c.hands().is_empty());
    assert!(c.gestures().is_empty());

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut fresh_results = 0;
    while Instant::now() < deadline {
        c.pump_timeout(Duration::from_millis(10));
        for hand in c.hands() {
            assert_eq!(hand.confidence, 0.5, "hand from the closed binding was shown");
        }
        if !c.hands().is_empty() {
            fresh_results += 1;
        }
    }
    assert!(fresh_results > 0);
    assert_eq!(landmarks.creates(), 2);
    assert_eq!(landmarks.closes(), 1);
}

#[test]
fn inference_change_during_start_restarts_once_with_new_binding() {
    init_logging();
    let camera = FakeCamera::new(&["cam0"]);
    camera.delay_open("cam0", Duration::from_millis(300));
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand()]);
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(matches!(c.state(), PipelineState::Starting { .. }));
    c.update_options(|o| o.max_hands = 2).unwrap();
    assert!(matches!(c.state(), PipelineState::Restarting { .. }));

    assert!(pump_until(&mut c, |c| c.is_running()
        && c.session().detector == DetectorStatus::Ready
        && !c.gestures().is_empty()));
    assert_eq!(c.state(), &running_on("cam0"));

    // The superseded start's stream was released before the retry opened.
    assert_eq!(camera.opens(), 2);
    assert_eq!(camera.stops(), 1);
    let events = camera.events();
    let stop = position(&events, |e| matches!(e, CameraEvent::Stop(_)));
    let reopen = events
        .iter()
        .rposition(|e| matches!(e, CameraEvent::Open { .. }))
        .unwrap();
    assert!(stop < reopen);

    assert_eq!(landmarks.creates(), 2);
    assert_eq!(landmarks.closes(), 1);
    match landmarks.events().last() {
        Some(LandmarkEvent::Create(options)) => assert_eq!(options.max_hands, 2),
        other => panic!("expected the rebuilt binding last, got {other:?}"),
    }
}

#[test]
fn unplugged_camera_stops_the_pipeline() {
    init_logging();
    let camera = FakeCamera::new(&["cam0", "cam1"]);
    let landmarks = FakeLandmarker::with_hands(vec![pinch_hand()]);
    let mut c = controller(&camera, &landmarks);

    c.start();
    assert!(pump_until(&mut c, |c| !c.gestures().is_empty()));

    camera.unplug("cam0");
    assert!(pump_until(&mut c, |c| matches!(
        c.state(),
        PipelineState::Stopped { .. }
    )));

    let session = c.session();
    assert!(!session.running);
    assert_eq!(session.camera_text(), "Camera: inactive");
    assert!(matches!(
        session.last_error,
        Some(CaptureError::DeviceUnavailable(_))
    ));
    assert!(c.gestures().is_empty());
    assert_eq!(camera.stops(), 1);

    c.select_camera("cam1").unwrap();
    assert!(pump_until(&mut c, |c| c.state() == &running_on("cam1")));
}
