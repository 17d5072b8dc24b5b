mod common;
use common::*;

use std::time::Duration;

use stim_bridge::prelude::*;
use stim_bridge::sender::Sender;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn idle_engine_keeps_device_state_fresh() {
    common_setup();

    let device = MockDevice::with_inputs((true, false), (10, 20, 30));
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();

    assert!(wait_until(ms(2000), || {
        let state = sender.state();
        state.button1 && state.control3 == 30
    }));

    let state = sender.state();
    assert!(state.button1);
    assert!(!state.button2);
    assert_eq!(state.control1, 10);
    assert_eq!(state.control2, 20);
    assert_eq!(state.control3, 30);

    // the idle refresh polls both halves
    let written = device.written();
    assert!(written.iter().any(|line| line == "A"));
    assert!(written.iter().any(|line| line == "S"));

    sender.close();
}

#[test]
fn input_changes_are_picked_up() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();

    assert!(wait_until(ms(2000), || sender.state().analog_updated));
    assert_eq!(sender.state().control1, 0);

    device.set_controls(200, 0, 0);
    device.set_buttons(false, true);

    assert!(wait_until(ms(2000), || {
        let state = sender.state();
        state.control1 == 200 && state.button2
    }));

    sender.close();
}

#[test]
fn button_edges_fire_state_events() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let mut events = channels.state_events.subscribe();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();

    device.set_buttons(true, false);

    let event = wait_until(ms(2000), || {
        matches!(
            events.try_recv(),
            Ok(StateEvent::Buttons {
                button1: true,
                button2: false,
            })
        )
    });
    assert!(event, "no button event seen");

    sender.close();
}

#[test]
fn writes_reach_the_wire() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();
    let handle = sender.handle();

    handle
        .submit(WriteCommand::lob(0, 55, ms(200), false), true)
        .unwrap();
    handle
        .submit(WriteCommand::tadel(1, 70, 120, 2, ms(200), false), true)
        .unwrap();

    assert!(wait_until(ms(2000), || {
        let written = device.written();
        written.iter().any(|line| line == "L0P55")
            && written.iter().any(|line| line == "T1P70F120W2")
    }));

    sender.close();
}

#[test]
fn non_overridable_write_is_never_dropped() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();
    let handle = sender.handle();

    // a long timed pulse, then a burst of rapid overridable updates
    handle
        .submit(WriteCommand::lob(0, 200, ms(5000), true), true)
        .unwrap();
    for power in 1..=5 {
        handle
            .submit(WriteCommand::lob(0, power, ms(200), false), true)
            .unwrap();
    }

    assert!(wait_until(ms(2000), || device.written_count("L0P200") == 1));

    sender.close();
}

#[test]
fn close_zeroes_every_channel_ever_used() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device.clone()), channels).unwrap();
    let handle = sender.handle();

    handle
        .submit(WriteCommand::lob(0, 90, ms(200), false), true)
        .unwrap();
    handle
        .submit(WriteCommand::tadel(1, 80, 50, 0, ms(200), false), true)
        .unwrap();

    assert!(wait_until(ms(2000), || device.written().len() >= 2));

    // close drains the synthesized zero commands before the thread exits
    sender.close();

    let written = device.written();
    assert!(written.iter().any(|line| line == "L0"), "{:?}", written);
    assert!(written.iter().any(|line| line == "T1"), "{:?}", written);
}

#[test]
fn closed_engine_rejects_submissions() {
    common_setup();

    let device = MockDevice::new();
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device), channels).unwrap();
    sender.close();

    let result = sender
        .handle()
        .submit(WriteCommand::lob(0, 10, ms(200), false), true);
    assert!(result.is_err());
}

#[test]
fn responses_split_across_reads_are_reassembled() {
    common_setup();

    // tiny read buffers force the terminator to arrive in fragments; the
    // engine must keep accumulating without discarding partial data
    let device = MockDevice::with_inputs((false, true), (1, 2, 3));
    let channels = Channels::new();
    let sender = Sender::start(Box::new(device), channels).unwrap();

    assert!(wait_until(ms(2000), || {
        let state = sender.state();
        state.button2 && state.control3 == 3
    }));

    sender.close();
}
