//! Tests for the state coordinator.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pst_lmc_types::ConfigRecord;
use rstest::{fixture, rstest};

use super::{Command, HookError, State, StateCoordinator, StateError, TransitionTable};

#[fixture]
fn coordinator() -> Arc<StateCoordinator> {
    Arc::new(StateCoordinator::new(Arc::new(TransitionTable::standard())))
}

/// Plays the control thread: consumes one command and applies its result.
fn consume_one(coordinator: &Arc<StateCoordinator>) -> thread::JoinHandle<Option<Command>> {
    let coordinator = Arc::clone(coordinator);
    thread::spawn(move || {
        let command = coordinator.take_command()?;
        let from = coordinator.state();
        coordinator.complete(from, command.resulting_state());
        Some(command)
    })
}

#[rstest]
fn rejected_submissions_leave_state_and_mailbox_untouched(coordinator: Arc<StateCoordinator>) {
    let table = TransitionTable::standard();
    for state in State::ALL {
        coordinator.set_state(state);
        for command in Command::ALL {
            if table.permits(state, command).expect("entry present") {
                continue;
            }
            let result = coordinator.submit_command(command);
            assert!(
                matches!(result, Err(StateError::TransitionRejected { .. })),
                "{command} from {state} should be rejected"
            );
            assert_eq!(coordinator.state(), state);
            assert_eq!(coordinator.pending_command(), None);
        }
    }
}

#[rstest]
fn permitted_commands_reach_their_resulting_state(coordinator: Arc<StateCoordinator>) {
    let table = TransitionTable::standard();
    for state in State::ALL {
        for command in Command::ALL {
            if !table.permits(state, command).expect("entry present") {
                continue;
            }
            coordinator.set_state(state);
            let seen = coordinator.error_count();
            let worker = consume_one(&coordinator);
            coordinator.submit_command(command).expect("permitted command");
            if command == Command::Reset {
                coordinator
                    .wait_for_recovery(State::Idle, seen)
                    .expect("recover to Idle");
            } else {
                coordinator
                    .wait_for_state(command.resulting_state())
                    .expect("reach resulting state");
            }
            assert_eq!(worker.join().expect("join worker"), Some(command));
        }
    }
}

#[rstest]
fn second_submission_before_consumption_is_refused(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::Idle);
    coordinator
        .submit_command_with(Command::ConfigureBeam, ConfigRecord::new())
        .expect("first submission");
    let error = coordinator
        .submit_command(Command::Terminate)
        .expect_err("mailbox occupied");
    assert!(matches!(
        error,
        StateError::CommandPending {
            pending: Command::ConfigureBeam,
            command: Command::Terminate
        }
    ));
}

#[rstest]
fn runtime_error_is_delivered_exactly_once(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::BeamConfigured);
    coordinator.set_runtime_error(HookError::new("scan configuration failed"));

    let first = coordinator
        .wait_for_state(State::ScanConfigured)
        .expect_err("first waiter sees the error");
    assert!(matches!(first, StateError::Runtime(ref error) if error.message() == "scan configuration failed"));

    let second = coordinator
        .wait_for_state(State::ScanConfigured)
        .expect_err("still in RuntimeError");
    assert!(matches!(
        second,
        StateError::RuntimeErrorState {
            required: State::ScanConfigured
        }
    ));
}

#[rstest]
fn runtime_error_wakes_a_blocked_waiter(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::ScanConfigured);
    let waiter = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.wait_for_state(State::Scanning))
    };
    thread::sleep(Duration::from_millis(20));
    coordinator.set_runtime_error(HookError::new("scan thread died"));
    let result = waiter.join().expect("join waiter");
    assert!(matches!(result, Err(StateError::Runtime(_))));
}

#[rstest]
fn message_survives_delivery_until_reset(coordinator: Arc<StateCoordinator>) {
    coordinator.set_runtime_error(HookError::new("attach failed"));
    let _ = coordinator.wait_for_state(State::Idle);
    assert_eq!(
        coordinator.last_error_message().as_deref(),
        Some("attach failed")
    );
    coordinator.set_state(State::Idle);
    assert_eq!(coordinator.last_error_message(), None);
}

#[rstest]
fn complete_does_not_overwrite_concurrent_error(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::ScanConfigured);
    coordinator.set_runtime_error(HookError::new("scan failed on start"));
    assert!(!coordinator.complete(State::ScanConfigured, State::Scanning));
    assert_eq!(coordinator.state(), State::RuntimeError);
    assert_eq!(coordinator.previous_state(), State::ScanConfigured);
}

#[rstest]
fn configuration_is_retained_while_implied_by_state(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::Idle);
    let beam = ConfigRecord::new().with("BEAM_ID", 3);
    coordinator
        .submit_command_with(Command::ConfigureBeam, beam.clone())
        .expect("submit beam");
    assert_eq!(coordinator.take_command(), Some(Command::ConfigureBeam));
    coordinator.set_state(State::BeamConfigured);
    assert_eq!(coordinator.beam_configuration(), Some(beam));

    coordinator.set_state(State::Idle);
    assert_eq!(coordinator.beam_configuration(), None);
}

#[rstest]
fn payload_on_plain_command_is_refused(coordinator: Arc<StateCoordinator>) {
    coordinator.set_state(State::Idle);
    let error = coordinator
        .submit_command_with(Command::Terminate, ConfigRecord::new())
        .expect_err("terminate takes no payload");
    assert!(matches!(error, StateError::UnexpectedConfiguration { .. }));
}

#[rstest]
fn closing_releases_the_control_thread(coordinator: Arc<StateCoordinator>) {
    let worker = consume_one(&coordinator);
    coordinator.close();
    assert_eq!(worker.join().expect("join worker"), None);
    assert!(matches!(
        coordinator.submit_command(Command::Initialise),
        Err(StateError::Stopped { .. })
    ));
}

#[rstest]
fn bounded_waits_report_timeouts(coordinator: Arc<StateCoordinator>) {
    assert!(!coordinator.wait_for_state_timeout(State::Idle, Duration::from_millis(20)));
    assert!(coordinator.wait_for_not_state_timeout(State::Idle, Duration::from_millis(20)));
    coordinator.set_state(State::Idle);
    assert!(coordinator.wait_for_state_timeout(State::Idle, Duration::ZERO));
}

#[rstest]
fn recovery_wait_ignores_the_error_being_recovered(coordinator: Arc<StateCoordinator>) {
    coordinator.set_runtime_error(HookError::new("boom"));
    let seen = coordinator.error_count();
    let waiter = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.wait_for_recovery(State::Idle, seen))
    };
    thread::sleep(Duration::from_millis(20));
    coordinator.set_state(State::Idle);
    waiter
        .join()
        .expect("join waiter")
        .expect("recovered to Idle");
}

#[rstest]
fn recovery_wait_returns_an_error_captured_during_recovery(coordinator: Arc<StateCoordinator>) {
    coordinator.set_runtime_error(HookError::new("scan failed"));
    let seen = coordinator.error_count();
    let waiter = {
        let coordinator = Arc::clone(&coordinator);
        thread::spawn(move || coordinator.wait_for_recovery(State::Idle, seen))
    };
    thread::sleep(Duration::from_millis(20));
    coordinator.set_runtime_error(HookError::new("reset failed"));

    let error = waiter
        .join()
        .expect("join waiter")
        .expect_err("recovery failed");
    assert!(
        matches!(&error, StateError::Runtime(hook) if hook.message() == "reset failed"),
        "{error:?}"
    );
    assert_eq!(coordinator.state(), State::RuntimeError);
}
