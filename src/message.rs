use crate::prelude::*;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// One remote-link message. Encodes to a single `TYPE:field,field,...`
/// line; absent optional numerics encode as the empty substring, free text
/// is base64-encoded so it cannot collide with the delimiters.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Connection handshake.
    Hello { version: u32, name: Option<String> },
    /// Keep-alive, answered in kind.
    Ping,
    /// Free text.
    Text { text: String },
    /// Digital status push.
    Buttons { button1: bool, button2: bool },
    /// Analog status push.
    Controls {
        control1: u8,
        control2: u8,
        control3: u8,
    },
    /// Remote-driven parameter update for one channel.
    Processing {
        channel: u8,
        update: ParameterUpdate,
    },
    /// Mirror of the locally-driven parameters for one channel.
    LocalProcessing {
        channel: u8,
        update: ParameterUpdate,
    },
    /// Standalone-mode toggle.
    Standalone { enabled: bool },
}

impl Message {
    pub fn encode(&self) -> String {
        match self {
            Message::Hello { version, name } => {
                let name = name
                    .as_ref()
                    .map(|n| BASE64.encode(n))
                    .unwrap_or_default();
                format!("HELLO:{},{}", version, name)
            }
            Message::Ping => "PING:".to_string(),
            Message::Text { text } => format!("TEXT:{}", BASE64.encode(text)),
            Message::Buttons { button1, button2 } => {
                format!("BUTTONS:{},{}", bit(*button1), bit(*button2))
            }
            Message::Controls {
                control1,
                control2,
                control3,
            } => format!("CONTROLS:{},{},{}", control1, control2, control3),
            Message::Processing { channel, update } => {
                format!("PROC:{},{}", channel, encode_update(update))
            }
            Message::LocalProcessing { channel, update } => {
                format!("LOCAL:{},{}", channel, encode_update(update))
            }
            Message::Standalone { enabled } => format!("STANDALONE:{}", bit(*enabled)),
        }
    }

    /// Decode one line. A failure only voids this message; the caller keeps
    /// the channel open.
    pub fn decode(line: &str) -> Result<Message> {
        let (kind, payload) = line
            .split_once(':')
            .ok_or_else(|| anyhow!("missing type separator: {:?}", line))?;

        let message = match kind {
            "HELLO" => {
                let f = fields(payload, 2)?;
                Message::Hello {
                    version: required(f[0], "version")?,
                    name: text_field(f[1])?,
                }
            }
            "PING" => {
                if !payload.is_empty() {
                    bail!("unexpected PING payload: {:?}", payload);
                }
                Message::Ping
            }
            "TEXT" => {
                let f = fields(payload, 1)?;
                Message::Text {
                    text: text_field(f[0])?.unwrap_or_default(),
                }
            }
            "BUTTONS" => {
                let f = fields(payload, 2)?;
                Message::Buttons {
                    button1: flag(f[0])?,
                    button2: flag(f[1])?,
                }
            }
            "CONTROLS" => {
                let f = fields(payload, 3)?;
                Message::Controls {
                    control1: required(f[0], "control1")?,
                    control2: required(f[1], "control2")?,
                    control3: required(f[2], "control3")?,
                }
            }
            "PROC" => {
                let f = fields(payload, 11)?;
                Message::Processing {
                    channel: required(f[0], "channel")?,
                    update: decode_update(&f[1..])?,
                }
            }
            "LOCAL" => {
                let f = fields(payload, 11)?;
                Message::LocalProcessing {
                    channel: required(f[0], "channel")?,
                    update: decode_update(&f[1..])?,
                }
            }
            "STANDALONE" => {
                let f = fields(payload, 1)?;
                Message::Standalone { enabled: flag(f[0])? }
            }
            other => bail!("unknown message type: {:?}", other),
        };

        Ok(message)
    }
}

// field order: mode,power,min_power,frequency,wave,cycle_length,
// probability,avg_on,avg_off,power_change
fn encode_update(update: &ParameterUpdate) -> String {
    [
        optional(&update.mode.map(u8::from)),
        optional(&update.power),
        optional(&update.min_power),
        optional(&update.frequency),
        optional(&update.wave),
        optional(&update.cycle_length),
        optional(&update.running_probability),
        optional(&update.avg_on_duration_ms),
        optional(&update.avg_off_duration_ms),
        optional(&update.power_change_duration_ms),
    ]
    .join(",")
}

fn decode_update(f: &[&str]) -> Result<ParameterUpdate> {
    let mode = match parse_optional::<u8>(f[0], "mode")? {
        Some(value) => {
            Some(Mode::try_from(value).map_err(|_| anyhow!("invalid mode: {}", value))?)
        }
        None => None,
    };

    Ok(ParameterUpdate {
        mode,
        power: parse_optional(f[1], "power")?,
        min_power: parse_optional(f[2], "min_power")?,
        frequency: parse_optional(f[3], "frequency")?,
        wave: parse_optional(f[4], "wave")?,
        cycle_length: parse_optional(f[5], "cycle_length")?,
        running_probability: parse_optional(f[6], "running_probability")?,
        avg_on_duration_ms: parse_optional(f[7], "avg_on_duration")?,
        avg_off_duration_ms: parse_optional(f[8], "avg_off_duration")?,
        power_change_duration_ms: parse_optional(f[9], "power_change_duration")?,
    })
}

fn fields(payload: &str, expected: usize) -> Result<Vec<&str>> {
    let f: Vec<&str> = payload.split(',').collect();
    if f.len() != expected {
        bail!("expected {} fields, got {}", expected, f.len());
    }
    Ok(f)
}

fn bit(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn flag(field: &str) -> Result<bool> {
    match field {
        "1" => Ok(true),
        "0" => Ok(false),
        other => bail!("invalid flag: {:?}", other),
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}

// empty substring means "unset", never zero
fn parse_optional<T: FromStr>(field: &str, what: &str) -> Result<Option<T>> {
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse()
        .map(Some)
        .map_err(|_| anyhow!("invalid {}: {:?}", what, field))
}

fn required<T: FromStr>(field: &str, what: &str) -> Result<T> {
    parse_optional(field, what)?.ok_or_else(|| anyhow!("missing {}", what))
}

fn text_field(field: &str) -> Result<Option<String>> {
    if field.is_empty() {
        return Ok(None);
    }
    let bytes = BASE64
        .decode(field)
        .map_err(|err| anyhow!("invalid base64 text: {}", err))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|err| anyhow!("text is not utf-8: {}", err))
}
