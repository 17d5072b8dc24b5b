use crate::prelude::*;

use nom::bytes::complete::{take_till, take_until};
use nom::character::complete::{char, one_of};
use nom::IResult;
use std::time::Duration;

/// Device-poll commands. `A` asks for the three analog controls, `S` for
/// the two buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadCommand {
    AnalogRead,
    DigitalRead,
}

impl ReadCommand {
    pub fn wire(&self) -> &'static str {
        match self {
            ReadCommand::AnalogRead => "A",
            ReadCommand::DigitalRead => "S",
        }
    }

    pub fn other(&self) -> ReadCommand {
        match self {
            ReadCommand::AnalogRead => ReadCommand::DigitalRead,
            ReadCommand::DigitalRead => ReadCommand::AnalogRead,
        }
    }

    /// Apply one framed response payload to `scratch`. Payloads that do not
    /// carry this command's marker character are ignored; a field that fails
    /// to parse is skipped so the prior value survives.
    pub fn process_response(&self, payload: &str, scratch: &mut DeviceState) {
        match self {
            ReadCommand::DigitalRead => {
                if let Ok((_, (button1, button2))) = digital_fragment(payload) {
                    scratch.button1 = button1;
                    scratch.button2 = button2;
                    scratch.digital_updated = true;
                }
            }
            ReadCommand::AnalogRead => {
                if let Ok((_, (first, second, third))) = analog_fragment(payload) {
                    if let Ok(value) = first.parse::<u8>() {
                        scratch.control1 = value;
                    }
                    if let Ok(value) = second.parse::<u8>() {
                        scratch.control2 = value;
                    }
                    if let Ok(value) = third.parse::<u8>() {
                        scratch.control3 = value;
                    }
                    scratch.analog_updated = true;
                }
            }
        }
    }
}

// `S` followed by one '0'/'1' per button, somewhere in free-form text.
fn digital_fragment(input: &str) -> IResult<&str, (bool, bool)> {
    let (input, _) = take_until("S")(input)?;
    let (input, _) = char('S')(input)?;
    let (input, button1) = one_of("01")(input)?;
    let (input, button2) = one_of("01")(input)?;
    Ok((input, (button1 == '1', button2 == '1')))
}

// `A` followed by three `;`-separated decimal fields. Fields are captured
// raw so a single corrupted value doesn't void the other two.
fn analog_fragment(input: &str) -> IResult<&str, (&str, &str, &str)> {
    let field = |i| take_till::<_, _, nom::error::Error<&str>>(|c| c == ';' || c == '\r')(i);

    let (input, _) = take_until("A")(input)?;
    let (input, _) = char('A')(input)?;
    let (input, first) = field(input)?;
    let (input, _) = char(';')(input)?;
    let (input, second) = field(input)?;
    let (input, _) = char(';')(input)?;
    let (input, third) = field(input)?;
    Ok((input, (first, second, third)))
}

/// Actuator commands queued for the protocol worker. Power, frequency and
/// wave are clamped to 0..=255 at construction, before they can reach the
/// wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteCommand {
    Lob {
        channel: u8,
        power: u8,
        duration: Duration,
        no_override: bool,
    },
    Tadel {
        channel: u8,
        power: u8,
        frequency: u8,
        wave: u8,
        duration: Duration,
        no_override: bool,
    },
    Wait {
        duration: Duration,
    },
}

impl WriteCommand {
    pub fn lob(channel: u8, power: i32, duration: Duration, no_override: bool) -> Self {
        WriteCommand::Lob {
            channel,
            power: Self::clamp_level(power),
            duration,
            no_override,
        }
    }

    pub fn tadel(
        channel: u8,
        power: i32,
        frequency: i32,
        wave: i32,
        duration: Duration,
        no_override: bool,
    ) -> Self {
        WriteCommand::Tadel {
            channel,
            power: Self::clamp_level(power),
            frequency: Self::clamp_level(frequency),
            wave: Self::clamp_level(wave),
            duration,
            no_override,
        }
    }

    pub fn wait(duration: Duration) -> Self {
        WriteCommand::Wait { duration }
    }

    pub fn clamp_level(value: i32) -> u8 {
        value.clamp(0, 255) as u8
    }

    /// Wire form, without the trailing `\r`. `Wait` produces no bytes; the
    /// worker honours its duration as an in-cycle pause instead.
    pub fn wire(&self) -> Option<String> {
        match *self {
            WriteCommand::Lob { channel, power, .. } => {
                if power == 0 {
                    Some(format!("L{}", channel))
                } else {
                    Some(format!("L{}P{}", channel, power))
                }
            }
            WriteCommand::Tadel {
                channel,
                power,
                frequency,
                wave,
                ..
            } => {
                if power == 0 && frequency == 0 && wave == 0 {
                    Some(format!("T{}", channel))
                } else {
                    Some(format!("T{}P{}F{}W{}", channel, power, frequency, wave))
                }
            }
            WriteCommand::Wait { .. } => None,
        }
    }

    pub fn duration(&self) -> Duration {
        match *self {
            WriteCommand::Lob { duration, .. }
            | WriteCommand::Tadel { duration, .. }
            | WriteCommand::Wait { duration } => duration,
        }
    }

    pub fn no_override(&self) -> bool {
        match *self {
            WriteCommand::Lob { no_override, .. } | WriteCommand::Tadel { no_override, .. } => {
                no_override
            }
            WriteCommand::Wait { .. } => true,
        }
    }

    pub fn channel(&self) -> Option<u8> {
        match *self {
            WriteCommand::Lob { channel, .. } | WriteCommand::Tadel { channel, .. } => {
                Some(channel)
            }
            WriteCommand::Wait { .. } => None,
        }
    }

    /// True iff this command may replace `other` in the queue: same variant,
    /// same channel, and neither instance opted out of coalescing.
    pub fn overrides(&self, other: &WriteCommand) -> bool {
        if self.no_override() || other.no_override() {
            return false;
        }

        match (self, other) {
            (WriteCommand::Lob { channel: a, .. }, WriteCommand::Lob { channel: b, .. }) => a == b,
            (WriteCommand::Tadel { channel: a, .. }, WriteCommand::Tadel { channel: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}
