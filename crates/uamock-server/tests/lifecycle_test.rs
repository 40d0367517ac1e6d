//! Lifecycle Controller tests

use std::time::Duration;

use uamock_core::{
    InitializationError, Profile, RegistryError, Tick, Value,
    rules::{self, STATUS_CYCLE},
};
use uamock_server::{
    Fault, Server, ServerConfig, ServerError, ServerHandle, ServerState, StatusCode, SystemEnv,
};

fn server(config: ServerConfig) -> Server<SystemEnv> {
    Server::new(SystemEnv::new(), config)
}

async fn wait_for_tick(handle: &ServerHandle, tick: u64) {
    while handle.tick() < Tick(tick) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn start_enters_running() {
    let server = server(ServerConfig::default());
    assert_eq!(server.state(), ServerState::Stopped);

    let handle = server.start().await.unwrap();

    assert_eq!(server.state(), ServerState::Running);
    assert_eq!(handle.state(), ServerState::Running);
    assert_eq!(handle.endpoint(), "opc.tcp://localhost:4840/opcua/");
    assert_eq!(handle.namespace_index(), 2);
    assert!(server.handle().await.is_ok());

    server.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn state_changes_are_published() {
    let server = server(ServerConfig::default());
    let mut states = server.subscribe();

    server.start().await.unwrap();
    states.wait_for(|s| *s == ServerState::Running).await.unwrap();

    server.shutdown().await.unwrap();
    states.wait_for(|s| *s == ServerState::Stopped).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_invalid_state() {
    let server = server(ServerConfig::default());
    server.start().await.unwrap();

    let result = server.start().await;
    assert!(matches!(
        result,
        Err(ServerError::InvalidState { expected: ServerState::Stopped, actual: ServerState::Running })
    ));

    server.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn initialization_failure_is_fatal_and_leaves_stopped() {
    let config = ServerConfig {
        extra_variables: vec![("Status".to_string(), Value::from("Shadow"))],
        ..ServerConfig::default()
    };
    let server = server(config);

    let err = server.start().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ServerError::Initialization(InitializationError::Registry(
            RegistryError::DuplicateName { .. }
        ))
    ));
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(matches!(server.handle().await, Err(ServerError::NotRunning(ServerState::Stopped))));
}

#[tokio::test(start_paused = true)]
async fn invalid_config_never_initializes() {
    let config = ServerConfig { update_interval: Duration::ZERO, ..ServerConfig::default() };
    let server = server(config);
    let states = server.subscribe();

    let err = server.start().await.unwrap_err();

    assert!(matches!(err, ServerError::Config(_)));
    assert!(!states.has_changed().unwrap());
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_idempotent() {
    let server = server(ServerConfig::default());
    let handle = server.start().await.unwrap();
    wait_for_tick(&handle, 2).await;

    let report = server.shutdown().await.unwrap();
    assert!(report.final_tick >= Tick(2));
    assert!(!report.simulator_aborted);
    assert!(report.drained);
    assert_eq!(server.state(), ServerState::Stopped);

    assert!(server.shutdown().await.is_none());
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_is_noop() {
    let server = server(ServerConfig::default());
    assert!(server.shutdown().await.is_none());
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn requests_after_shutdown_are_halted() {
    let server = server(ServerConfig::default());
    let handle = server.start().await.unwrap();
    server.shutdown().await.unwrap();

    let err = handle.read("ns=2;s=Counter").unwrap_err();
    assert!(matches!(err, ServerError::NotRunning(ServerState::Stopped)));
    assert_eq!(Fault::from(err).status, StatusCode::BadServerHalted);

    let err = handle.call("AddNumbers", vec![Value::Int32(1), Value::Int32(2)]).await.unwrap_err();
    assert_eq!(Fault::from(err).status, StatusCode::BadServerHalted);
}

#[tokio::test(start_paused = true)]
async fn shutdown_never_leaves_a_partial_cycle() {
    let server = server(ServerConfig::default());
    let handle = server.start().await.unwrap();
    wait_for_tick(&handle, 3).await;

    // Stop while the simulator is mid-interval
    tokio::time::sleep(Duration::from_millis(700)).await;
    let report = server.shutdown().await.unwrap();
    let tick = report.final_tick;

    // Retired handles refuse reads; the tree still shows the final values
    let tree = handle.render_tree();
    let counter_line = format!("Counter [Variable] ns=2;s=Counter : Int32 rw = {}", rules::counter(tick));
    let status_line =
        format!("Status [Variable] ns=2;s=Status : String rw = {:?}", rules::status(tick));
    let temperature_line = format!(
        "Temperature [Variable] ns=2;s=Temperature : Float64 rw = {}",
        rules::temperature(tick)
    );
    assert!(tree.contains(&counter_line), "{tree}");
    assert!(tree.contains(&status_line), "{tree}");
    assert!(tree.contains(&temperature_line), "{tree}");
}

#[tokio::test(start_paused = true)]
async fn counter_tracks_cycles() {
    let server = server(ServerConfig::default());
    let handle = server.start().await.unwrap();

    for n in 1..=5 {
        wait_for_tick(&handle, n).await;
        let expected = i32::try_from(handle.tick().value()).unwrap();
        assert_eq!(handle.read("ns=2;s=Counter").unwrap(), Value::Int32(expected));
        let status = handle.read("ns=2;s=Status").unwrap();
        assert!(STATUS_CYCLE.contains(&status.as_str().unwrap()));
    }

    server.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_resets_tick_and_retires_old_handles() {
    let server = server(ServerConfig::default());
    let first = server.start().await.unwrap();
    wait_for_tick(&first, 4).await;
    server.shutdown().await.unwrap();

    let second = server.start().await.unwrap();
    assert!(second.tick() < Tick(2));
    assert_eq!(first.state(), ServerState::Stopped);
    assert_eq!(second.state(), ServerState::Running);
    assert!(first.read("ns=2;s=Counter").is_err());
    assert!(second.read("ns=2;s=Counter").is_ok());

    server.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_reboot() {
    let server = server(ServerConfig::default());
    let handle = server.start().await.unwrap();
    wait_for_tick(&handle, 1).await;

    let caller = handle.clone();
    let call = tokio::spawn(async move { caller.call("Reboot", Vec::new()).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    let report = server.shutdown().await.unwrap();

    assert!(report.drained);
    assert!(started.elapsed() >= Duration::from_millis(800));
    assert_eq!(call.await.unwrap().unwrap(), Vec::<Value>::new());
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_call_whose_caller_gave_up() {
    let config = ServerConfig { reboot_delay: Duration::from_secs(3), ..ServerConfig::default() };
    let server = server(config);
    let handle = server.start().await.unwrap();
    wait_for_tick(&handle, 1).await;

    // The caller stops waiting; the handler keeps running
    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), handle.call("Reboot", Vec::new())).await;
    assert!(abandoned.is_err());

    let started = tokio::time::Instant::now();
    let report = server.shutdown().await.unwrap();

    assert!(report.drained);
    assert!(started.elapsed() >= Duration::from_millis(2800));
    let tree = handle.render_tree();
    assert!(tree.contains(r#"Status [Variable] ns=2;s=Status : String rw = "Running""#), "{tree}");
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_bounded_when_calls_outlive_timeout() {
    let config = ServerConfig {
        reboot_delay: Duration::from_secs(30),
        shutdown_timeout: Duration::from_secs(1),
        ..ServerConfig::default()
    };
    let server = server(config);
    let handle = server.start().await.unwrap();

    let caller = handle.clone();
    let call = tokio::spawn(async move { caller.call("Reboot", Vec::new()).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    let report = server.shutdown().await.unwrap();

    assert!(!report.drained);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(server.state(), ServerState::Stopped);

    // The call itself still completes
    assert!(call.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn run_until_stops_on_signal() {
    let server = server(ServerConfig { profile: Profile::Minimal, ..ServerConfig::default() });
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = tx.send(());
    });

    let report = server
        .run_until(async {
            let _ = rx.await;
        })
        .await
        .unwrap()
        .unwrap();

    stopper.await.unwrap();
    assert!(report.final_tick >= Tick(3));
    assert_eq!(server.state(), ServerState::Stopped);
}
