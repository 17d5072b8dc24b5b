mod common;
use common::*;

use stim_bridge::prelude::*;

#[test]
fn wire_forms_are_stable() {
    common_setup();

    assert_eq!(
        Message::Buttons {
            button1: true,
            button2: false
        }
        .encode(),
        "BUTTONS:1,0"
    );
    assert_eq!(
        Message::Controls {
            control1: 10,
            control2: 20,
            control3: 30
        }
        .encode(),
        "CONTROLS:10,20,30"
    );
    assert_eq!(Message::Standalone { enabled: false }.encode(), "STANDALONE:0");
    assert_eq!(Message::Ping.encode(), "PING:");
}

#[test]
fn every_variant_round_trips() {
    common_setup();

    let messages = vec![
        Message::Hello {
            version: 2,
            name: Some("panel".to_string()),
        },
        Message::Ping,
        Message::Text {
            text: "free text, with: delimiters\nand lines".to_string(),
        },
        Message::Buttons {
            button1: false,
            button2: true,
        },
        Message::Controls {
            control1: 0,
            control2: 127,
            control3: 255,
        },
        Message::Processing {
            channel: 0,
            update: ParameterUpdate {
                mode: Some(Mode::Random1),
                power: Some(180),
                min_power: Some(20),
                running_probability: Some(0.8),
                ..Default::default()
            },
        },
        Message::LocalProcessing {
            channel: 1,
            update: ParameterUpdate::default(),
        },
        Message::Standalone { enabled: true },
    ];

    for message in messages {
        let line = message.encode();
        assert_eq!(
            Message::decode(&line).unwrap(),
            message,
            "failed round trip via {:?}",
            line
        );
    }
}

#[test]
fn decoding_foreign_lines_fails_without_panicking() {
    common_setup();

    for line in [
        "",
        "PROC",
        "PROC:",
        "JUNK:1,2,3",
        "BUTTONS:yes,no",
        "PROC:0,1,2",
        "HELLO:abc,",
        "TEXT:not base64!!",
    ] {
        assert!(Message::decode(line).is_err(), "accepted {:?}", line);
    }
}

#[test]
fn unset_numeric_fields_survive_the_round_trip() {
    common_setup();

    let message = Message::Processing {
        channel: 1,
        update: ParameterUpdate {
            power: Some(0),
            ..Default::default()
        },
    };

    // power 0 and power unset must stay distinguishable
    let line = message.encode();
    let decoded = Message::decode(&line).unwrap();
    match decoded {
        Message::Processing { update, .. } => {
            assert_eq!(update.power, Some(0));
            assert_eq!(update.min_power, None);
        }
        other => panic!("unexpected {:?}", other),
    }
}
