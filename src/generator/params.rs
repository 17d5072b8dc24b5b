use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Operating mode shared by all generators. The numeric values are the wire
/// discriminants used by the remote parameter messages and the local mode
/// selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Mode {
    Off = 0,
    Fixed = 1,
    Wave = 2,
    Random1 = 3,
    Random2 = 4,
    Pulse = 5,
}

/// Live parameters of one generator. Owned by whichever generator is active
/// for the channel; replaced field-by-field on incoming updates.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSet {
    pub mode: Mode,
    pub power: u8,
    pub min_power: u8,
    pub frequency: u8,
    pub wave: u8,
    pub cycle_length: u32,
    pub running_probability: f64,
    pub avg_on_duration_ms: u64,
    pub avg_off_duration_ms: u64,
    pub power_change_duration_ms: u64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            power: 0,
            min_power: 0,
            frequency: 0,
            wave: 0,
            cycle_length: 0,
            running_probability: 0.5,
            avg_on_duration_ms: 1000,
            avg_off_duration_ms: 1000,
            power_change_duration_ms: 0,
        }
    }
}

/// Field-wise diff carried by a parameter-update message. `None` leaves the
/// current value unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterUpdate {
    pub mode: Option<Mode>,
    pub power: Option<u8>,
    pub min_power: Option<u8>,
    pub frequency: Option<u8>,
    pub wave: Option<u8>,
    pub cycle_length: Option<u32>,
    pub running_probability: Option<f64>,
    pub avg_on_duration_ms: Option<u64>,
    pub avg_off_duration_ms: Option<u64>,
    pub power_change_duration_ms: Option<u64>,
}

impl ParameterSet {
    pub fn apply(&mut self, update: &ParameterUpdate) {
        if let Some(mode) = update.mode {
            self.mode = mode;
        }
        if let Some(power) = update.power {
            self.power = power;
        }
        if let Some(min_power) = update.min_power {
            self.min_power = min_power;
        }
        if let Some(frequency) = update.frequency {
            self.frequency = frequency;
        }
        if let Some(wave) = update.wave {
            self.wave = wave;
        }
        if let Some(cycle_length) = update.cycle_length {
            self.cycle_length = cycle_length;
        }
        if let Some(probability) = update.running_probability {
            self.running_probability = probability;
        }
        if let Some(avg_on) = update.avg_on_duration_ms {
            self.avg_on_duration_ms = avg_on;
        }
        if let Some(avg_off) = update.avg_off_duration_ms {
            self.avg_off_duration_ms = avg_off;
        }
        if let Some(change) = update.power_change_duration_ms {
            self.power_change_duration_ms = change;
        }
    }
}
