//! Simulation tests for the uamock server
//!
//! Every scenario runs the real server inside turmoil, so cadence, Reboot
//! delays and wall-clock-derived values all advance in virtual time.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use proptest::prelude::*;
use uamock_core::{Profile, Tick, Value, rules};
use uamock_harness::{Observation, scenario::Scenario};
use uamock_server::{ServerConfig, StatusCode};

fn int(observation: &Observation, name: &str) -> i32 {
    match observation.value(name) {
        Some(Value::Int32(v)) => *v,
        other => panic!("{name} is not an Int32: {other:?}"),
    }
}

fn text<'a>(observation: &'a Observation, name: &str) -> &'a str {
    observation.value(name).and_then(Value::as_str).unwrap_or_else(|| panic!("{name} missing"))
}

#[test]
fn prop_all_simulations_deterministic() {
    proptest!(ProptestConfig::with_cases(8), |(
        window_secs in 1u64..20,
        reboot_at_ms in 0u64..20_000,
        seed in any::<u64>(),
    )| {
        let window = Duration::from_secs(window_secs);
        let reboot_at = Duration::from_millis(reboot_at_ms);

        let mut worlds = Vec::new();

        for _ in 0..2 {
            let captured = Arc::new(Mutex::new(None));
            let captured_clone = Arc::clone(&captured);

            let result = Scenario::new()
                .with_duration(window)
                .with_seed(seed)
                .call_at(reboot_at, "Reboot", Vec::new())
                .call_at(reboot_at, "AddNumbers", vec![Value::Int32(20), Value::Int32(22)])
                .oracle(Box::new(move |world| {
                    *captured_clone.lock().expect("mutex poisoned") = Some(world.clone());
                    Ok(())
                }))
                .run();

            prop_assert!(result.is_ok(), "Scenario should succeed: {:?}", result.err());
            let world = captured
                .lock()
                .expect("mutex poisoned")
                .clone()
                .expect("Oracle should have captured the world");
            worlds.push(world);
        }

        // PROPERTY: Determinism - same inputs produce same observations
        prop_assert_eq!(
            &worlds[0],
            &worlds[1],
            "Same scenario with window={:?}, reboot_at={:?} must observe identical worlds",
            window,
            reboot_at
        );
    });
}

#[test]
fn counter_matches_cycles_run() {
    // Cycles at t = 0, 2, 4, 6, 8; samples at t = 1, 3, 5, 7
    let world = Scenario::new().with_duration(Duration::from_secs(9)).run().expect("scenario");

    let observations = world.observations();
    assert_eq!(observations.len(), 4);

    for (i, observation) in observations.iter().enumerate() {
        let tick = Tick(i as u64 + 1);
        assert_eq!(observation.tick, tick);
        assert_eq!(int(observation, "Counter"), rules::counter(tick));
        assert_eq!(text(observation, "Status"), rules::status(tick));
        assert_eq!(observation.value("Temperature"), Some(&Value::Float64(rules::temperature(tick))));
        assert_eq!(observation.value("Pressure"), Some(&Value::Float64(rules::pressure(tick))));
        assert_eq!(observation.value("Boolean"), Some(&Value::Boolean(rules::boolean_phase(tick))));
    }

    assert_eq!(world.report().final_tick, Tick(5));
    assert!(world.report().drained);
    assert!(!world.report().simulator_aborted);
}

#[test]
fn clock_variables_follow_virtual_time() {
    let world = Scenario::new().with_duration(Duration::from_secs(5)).run().expect("scenario");

    // Sample at t = 3 sees the cycle that ran at t = 2
    let observation = &world.observations()[1];
    assert_eq!(text(observation, "DynamicString"), "Message #2 - 10:30:02");
    assert!(text(observation, "Timestamp").starts_with("2024-01-15T10:30:02"));
}

#[test]
fn reboot_is_visible_between_cycles() {
    let world = Scenario::new()
        .with_duration(Duration::from_secs(8))
        .call_at(Duration::from_millis(4500), "Reboot", Vec::new())
        .run()
        .expect("scenario");

    let observations = world.observations();
    // t = 5: between the Reboot write and the next cycle
    assert_eq!(text(&observations[2], "Status"), "Rebooting");
    // t = 7: the cycle at t = 6 has overwritten it
    assert_eq!(text(&observations[3], "Status"), rules::status(Tick(4)));

    let outcome = &world.calls()[0];
    assert_eq!(outcome.result, Ok(Vec::new()));
    assert_eq!(outcome.issued_at, Duration::from_millis(4500));
    assert!(outcome.completed_at >= Duration::from_millis(5500));
}

#[test]
fn calls_after_shutdown_are_halted() {
    let world = Scenario::new()
        .with_duration(Duration::from_secs(3))
        .call_at(Duration::from_secs(1), "AddNumbers", vec![Value::Int32(5), Value::Int32(10)])
        .call_at(Duration::from_secs(4), "AddNumbers", vec![Value::Int32(5), Value::Int32(10)])
        .run()
        .expect("scenario");

    assert_eq!(world.calls()[0].result, Ok(vec![Value::Int32(15)]));
    let fault = world.calls()[1].result.clone().expect_err("server was stopped");
    assert_eq!(fault.status, StatusCode::BadServerHalted);
}

#[test]
fn minimal_profile_keeps_counter_static() {
    let world = Scenario::new()
        .with_profile(Profile::Minimal)
        .with_duration(Duration::from_secs(7))
        .run()
        .expect("scenario");

    for observation in world.observations() {
        assert_eq!(int(observation, "Counter"), 0);
        assert_eq!(observation.values.len(), 1);
    }
    assert_eq!(world.observations().len(), 3);
}

#[test]
fn oracle_rejection_is_reported() {
    let result = Scenario::new()
        .with_duration(Duration::from_secs(3))
        .oracle(Box::new(|world| {
            let counter = world.last_observation().and_then(|o| o.value("Counter")).cloned();
            if counter == Some(Value::Int32(99)) {
                Ok(())
            } else {
                Err(format!("Counter was {counter:?}"))
            }
        }))
        .run();

    assert!(matches!(result, Err(uamock_harness::ScenarioError::Oracle(_))));
}

#[test]
fn shutdown_is_bounded_in_simulation() {
    let config = ServerConfig {
        reboot_delay: Duration::from_secs(30),
        shutdown_timeout: Duration::from_secs(2),
        ..ServerConfig::default()
    };

    let world = Scenario::new()
        .with_config(config)
        .with_duration(Duration::from_secs(4))
        .call_at(Duration::from_secs(1), "Reboot", Vec::new())
        .run()
        .expect("scenario");

    assert!(!world.report().drained);
    // The call still finishes after the server stopped
    assert_eq!(world.calls()[0].result, Ok(Vec::new()));
    assert!(world.final_tree().contains("Status [Variable]"));
}
