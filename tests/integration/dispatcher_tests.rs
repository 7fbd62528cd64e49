//! Command dispatcher flows on a live worker thread: FIFO ordering,
//! watering timing, queue backpressure, and OTA delegation end to end.

use std::sync::Arc;
use std::time::Duration;

use soilwarden::app::ports::Notifier;
use soilwarden::command::{
    command_queue, CommandKind, CommandSender, CommandStats, Dispatcher, DispatcherConfig,
    DispatcherHandle, EnqueueError, COMMAND_QUEUE_CAPACITY,
};
use soilwarden::ota::{
    progress_channel, EngineDeps, UpdateConfig, UpdateEngine, UpdateState,
};

use crate::mock_ports::{
    wait_until, ActuatorCall, FixedReading, MockActuator, MockClock, MockNotifier, MockStorage,
    MockSystem, ScriptedFetch,
};

const CHUNK: usize = 512;

struct Rig {
    sender: CommandSender,
    handle: DispatcherHandle,
    stats: Arc<CommandStats>,
    notifier: Arc<MockNotifier>,
    actuator: MockActuator,
    engine: Arc<UpdateEngine>,
}

fn rig(fetch: ScriptedFetch, watering: Duration) -> Rig {
    let notifier = Arc::new(MockNotifier::default());
    let clock = Arc::new(MockClock::default());
    let (progress_tx, _progress_rx) = progress_channel();
    let engine = Arc::new(UpdateEngine::new(
        EngineDeps {
            storage: Arc::new(MockStorage::with_running("1.0.0")),
            fetch: Arc::new(fetch),
            notifier: Arc::clone(&notifier) as Arc<dyn Notifier>,
            clock: Arc::clone(&clock) as Arc<dyn soilwarden::app::ports::Clock>,
            system: Arc::new(MockSystem::default()),
        },
        UpdateConfig {
            chunk_bytes: CHUNK,
            reboot_grace: Duration::from_millis(10),
            status_topic: "test/ota".into(),
        },
        progress_tx,
    ));

    let actuator = MockActuator::default();
    let (tx, rx) = command_queue();
    let sender = CommandSender::new(tx, Arc::clone(&clock) as Arc<dyn soilwarden::app::ports::Clock>);
    let dispatcher = Dispatcher::new(
        rx,
        Arc::clone(&engine),
        Box::new(actuator.clone()),
        Arc::new(FixedReading(None)),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        DispatcherConfig {
            watering_duration: watering,
            poll_interval: Duration::from_millis(20),
            response_topic: "test/response".into(),
            ota_timeout: Duration::from_secs(5),
            ota_auto_reboot: false,
        },
    );
    let stats = dispatcher.stats();
    let handle = dispatcher.spawn();
    Rig {
        sender,
        handle,
        stats,
        notifier,
        actuator,
        engine,
    }
}

fn image(version: &str) -> Vec<u8> {
    use soilwarden::ota::image::{
        APP_DESC_OFFSET, DESCRIPTOR_SPAN, VERSION_FIELD_LEN, VERSION_FIELD_OFFSET,
    };
    let total = DESCRIPTOR_SPAN + CHUNK;
    let mut image = vec![0xA5u8; total];
    let start = APP_DESC_OFFSET + VERSION_FIELD_OFFSET;
    for b in &mut image[start..start + VERSION_FIELD_LEN] {
        *b = 0;
    }
    image[start..start + version.len()].copy_from_slice(version.as_bytes());
    image
}

#[test]
fn commands_execute_in_fifo_order() {
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), Duration::from_millis(20));

    rig.sender.enqueue(CommandKind::Water, "").unwrap();
    rig.sender.enqueue(CommandKind::GetStatus, "").unwrap();
    rig.sender.enqueue(CommandKind::OtaStatus, "").unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().processed == 3
    }));

    let texts = rig.notifier.on_topic("test/response");
    assert_eq!(texts.len(), 4, "water emits two notices, the queries one each");
    assert!(texts[0].contains("watering started"));
    assert!(texts[1].contains("watering finished"));
    assert!(texts[2].contains("system: online"));
    assert!(texts[3].contains("state: idle"));

    rig.handle.stop();
}

#[test]
fn water_blocks_the_worker_for_the_configured_interval() {
    let watering = Duration::from_millis(200);
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), watering);

    rig.sender.enqueue(CommandKind::Water, "").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().waterings == 1
    }));

    let interval = rig.actuator.pump_interval().expect("pump toggled");
    assert!(
        interval >= watering,
        "pump closed after {interval:?}, before the configured {watering:?}"
    );
    assert!(interval < watering + Duration::from_millis(300));
    assert_eq!(
        rig.actuator.history().first(),
        Some(&ActuatorCall::PumpOn)
    );

    rig.handle.stop();
}

#[test]
fn eleventh_enqueue_fails_busy_while_the_worker_is_stalled() {
    let rig = rig(
        ScriptedFetch::serving(image("2.0.0"), CHUNK),
        Duration::from_millis(500),
    );

    // Stall the worker inside a watering cycle.
    rig.sender.enqueue(CommandKind::Water, "").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().pump_active
    }));

    for _ in 0..COMMAND_QUEUE_CAPACITY {
        rig.sender.enqueue(CommandKind::GetStatus, "").unwrap();
    }
    assert_eq!(
        rig.sender.enqueue(CommandKind::GetStatus, ""),
        Err(EnqueueError::Full)
    );

    rig.handle.stop();
}

#[test]
fn unknown_command_increments_the_error_counter() {
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), Duration::from_millis(20));

    rig.sender.enqueue(CommandKind::Unknown, "garbage").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().errors == 1
    }));
    assert_eq!(rig.stats.snapshot().processed, 0);

    rig.handle.stop();
}

#[test]
fn ota_update_command_drives_the_engine_to_success() {
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), Duration::from_millis(20));

    rig.sender
        .enqueue(CommandKind::OtaUpdate, "http://firmware.local/app.bin")
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.engine.state() == UpdateState::Success
    }));

    let texts = rig.notifier.on_topic("test/response");
    assert!(texts.iter().any(|m| m.contains("firmware update started")));

    rig.handle.stop();
}

#[test]
fn ota_update_with_empty_payload_counts_as_error() {
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), Duration::from_millis(20));

    rig.sender.enqueue(CommandKind::OtaUpdate, "").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().errors == 1
    }));
    assert_eq!(rig.engine.state(), UpdateState::Idle);
    assert_eq!(rig.engine.statistics().attempted, 0);
    let texts = rig.notifier.on_topic("test/response");
    assert!(texts.iter().any(|m| m.contains("URL missing")));

    rig.handle.stop();
}

#[test]
fn ota_update_after_a_failed_flight_acknowledges_and_retries() {
    let rig = rig(
        ScriptedFetch::serving(image("2.0.0"), CHUNK).fail_opens(1),
        Duration::from_millis(20),
    );

    // First flight fails (connect error) and parks the engine in Error.
    rig.sender
        .enqueue(CommandKind::OtaUpdate, "http://firmware.local/app.bin")
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.engine.state() == UpdateState::Error
    }));

    // The next OTA_UPDATE clears the terminal state and succeeds.
    rig.sender
        .enqueue(CommandKind::OtaUpdate, "http://firmware.local/app.bin")
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.engine.state() == UpdateState::Success
    }));
    let stats = rig.engine.statistics();
    assert_eq!((stats.attempted, stats.succeeded, stats.failed), (2, 1, 1));

    rig.handle.stop();
}

#[test]
fn ota_cancel_reaches_a_running_download() {
    let rig = rig(
        ScriptedFetch::serving(image("2.0.0"), CHUNK).read_delay(Duration::from_millis(50)),
        Duration::from_millis(20),
    );

    rig.sender
        .enqueue(CommandKind::OtaUpdate, "http://firmware.local/app.bin")
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.engine.state() == UpdateState::Downloading
    }));

    rig.sender.enqueue(CommandKind::OtaCancel, "").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.engine.state() == UpdateState::Error
    }));
    let texts = rig.notifier.on_topic("test/response");
    assert!(texts.iter().any(|m| m.contains("cancellation requested")));

    rig.handle.stop();
}

#[test]
fn stop_joins_the_worker() {
    let rig = rig(ScriptedFetch::serving(image("2.0.0"), CHUNK), Duration::from_millis(20));
    rig.sender.enqueue(CommandKind::GetStatus, "").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        rig.stats.snapshot().processed == 1
    }));
    rig.handle.stop();
}
