mod common;
use common::*;

use std::time::{Duration, Instant};

use stim_bridge::prelude::*;
use stim_bridge::sender::Sender;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn engine() -> (MockDevice, Sender) {
    let device = MockDevice::new();
    let sender = Sender::start(Box::new(device.clone()), Channels::new()).unwrap();
    (device, sender)
}

#[tokio::test(flavor = "multi_thread")]
async fn lob_paces_the_requested_duration() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 0);

    let started = Instant::now();
    subject.lob(100, ms(300)).await.unwrap();
    assert!(started.elapsed() >= ms(300));

    assert!(wait_until_async(ms(2000), || device.written_count("L0P100") == 1).await);

    sender.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn ramp_issues_interpolated_steps() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 0);

    subject.lob_ramp(0, 100, ms(1000)).await.unwrap();

    // 5 steps of ~200ms each, linearly interpolated to the end value
    for line in ["L0P20", "L0P40", "L0P60", "L0P80", "L0P100"] {
        assert!(
            wait_until_async(ms(2000), || device.written_count(line) == 1).await,
            "missing {} in {:?}",
            line,
            device.written()
        );
    }

    sender.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn short_ramp_degenerates_to_end_value() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 0);

    subject.lob_ramp(10, 90, ms(200)).await.unwrap();

    assert!(wait_until_async(ms(2000), || device.written_count("L0P90") == 1).await);
    assert_eq!(device.written_count("L0P10"), 0);

    sender.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn tadel_ramp_interpolates_all_fields() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 1);

    subject
        .tadel_ramp(0, 100, 50, 150, 0, 4, ms(400))
        .await
        .unwrap();

    for line in ["T1P50F100W2", "T1P100F150W4"] {
        assert!(
            wait_until_async(ms(2000), || device.written_count(line) == 1).await,
            "missing {} in {:?}",
            line,
            device.written()
        );
    }

    sender.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn channel_close_zeroes_redundantly() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 0);

    subject.lob(60, ms(200)).await.unwrap();
    subject.close().await.unwrap();

    // three redundant zeroes in each command style
    assert!(wait_until_async(ms(2000), || {
        device.written_count("L0") == 3 && device.written_count("T0") == 3
    })
    .await);

    sender.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn long_commands_survive_later_updates() {
    common_setup();

    let (device, sender) = engine();
    let subject = ChannelSender::new(sender.handle(), 0);

    // the 500ms hold exceeds the send quantum, so it is queued
    // non-overridable and must reach the wire even though a rapid update
    // follows immediately
    let long_hold = subject.lob(210, ms(500));
    let rapid = subject.lob(20, ms(200));
    let (first, second) = tokio::join!(long_hold, rapid);
    first.unwrap();
    second.unwrap();

    assert!(wait_until_async(ms(2000), || device.written_count("L0P210") == 1).await);

    sender.close();
}
