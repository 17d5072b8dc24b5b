use rand::Rng;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Fixed average signal duration of the single-process random mode.
pub const RANDOM1_AVG_SIGNAL_MS: f64 = 2000.0;

// Exponential inter-arrival time via inverse-CDF sampling. 1-U keeps the
// argument in (0, 1] so ln never sees zero.
fn exp_draw(avg_ms: f64, rng: &mut impl Rng) -> Duration {
    let u: f64 = 1.0 - rng.gen::<f64>();
    Duration::from_secs_f64((-avg_ms * u.ln()).max(0.0) / 1000.0)
}

/// Raised-cosine sweep between `min_power` and `power`, quantized to
/// `2 * cycle_length` steps per cycle.
pub struct WaveState {
    cycle_point: f64,
}

impl Default for WaveState {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveState {
    pub fn new() -> Self {
        Self { cycle_point: 0.0 }
    }

    pub fn cycle_point(&self) -> f64 {
        self.cycle_point
    }

    pub fn output(&self, power: i32, min_power: i32) -> i32 {
        let depth = (power - min_power) as f64;
        let swing = (1.0 - (2.0 * PI * self.cycle_point).cos()) / 2.0;
        (min_power as f64 + swing * depth).round() as i32
    }

    /// Advance to the next quantized tick. A cycle length of zero pins the
    /// point at the midpoint, holding the output at peak.
    pub fn advance(&mut self, cycle_length: u32) {
        if cycle_length == 0 {
            self.cycle_point = 0.5;
            return;
        }

        let steps = (2 * cycle_length) as f64;
        let mut next = ((self.cycle_point * steps).round() + 1.0) / steps;
        if next >= 1.0 {
            next -= 1.0;
        }
        self.cycle_point = next;
    }
}

/// Single renewal process: one exponential dwell clock, high/low redrawn as
/// a Bernoulli trial on every expiry.
pub struct Random1State {
    next_change: Instant,
    is_high: bool,
    last_probability: f64,
}

impl Random1State {
    pub fn new(now: Instant) -> Self {
        Self {
            next_change: now,
            is_high: false,
            last_probability: f64::NAN,
        }
    }

    pub fn tick(&mut self, now: Instant, probability: f64, rng: &mut impl Rng) -> bool {
        // NaN sentinel also forces the very first draw
        if now > self.next_change || probability != self.last_probability {
            self.next_change = now + exp_draw(RANDOM1_AVG_SIGNAL_MS, rng);
            self.is_high = rng.gen::<f64>() < probability;
            self.last_probability = probability;
        }
        self.is_high
    }
}

/// Two independent renewal sub-processes, one per dwell state, each with
/// its own average duration.
pub struct Random2State {
    next_change: Instant,
    is_high: bool,
    last_avg_on_ms: f64,
    last_avg_off_ms: f64,
}

impl Random2State {
    pub fn new(now: Instant) -> Self {
        Self {
            next_change: now,
            is_high: false,
            last_avg_on_ms: f64::NAN,
            last_avg_off_ms: f64::NAN,
        }
    }

    pub fn tick(
        &mut self,
        now: Instant,
        avg_on_ms: f64,
        avg_off_ms: f64,
        rng: &mut impl Rng,
    ) -> bool {
        if now > self.next_change {
            // dwell expired: flip, then draw from the newly active average
            self.is_high = !self.is_high;
            let avg = if self.is_high { avg_on_ms } else { avg_off_ms };
            self.next_change = now + exp_draw(avg, rng);
        } else {
            // a changed average for the active state forces a redraw
            let active_changed = if self.is_high {
                avg_on_ms != self.last_avg_on_ms
            } else {
                avg_off_ms != self.last_avg_off_ms
            };
            if active_changed {
                let avg = if self.is_high { avg_on_ms } else { avg_off_ms };
                self.next_change = now + exp_draw(avg, rng);
            }
        }

        self.last_avg_on_ms = avg_on_ms;
        self.last_avg_off_ms = avg_off_ms;
        self.is_high
    }
}

/// Velocity-style power control: the input's distance from center sets the
/// stepping rate, its side sets the direction. Center (127) is a deadband.
pub struct PowerRamp {
    last_change: Instant,
}

impl PowerRamp {
    pub fn new(now: Instant) -> Self {
        Self { last_change: now }
    }

    pub fn tick(&mut self, now: Instant, control: u8, power: i32) -> i32 {
        let delta = control as i32 - 127;
        if delta == 0 {
            self.last_change = now;
            return power;
        }

        // ~150s per step at the deadband edge, ~1s at the extremes
        let ms_per_step = 150_000.0 / 1.04_f64.powi(delta.abs());
        let elapsed = now.duration_since(self.last_change).as_millis() as f64;
        if elapsed > ms_per_step {
            let steps = (elapsed / ms_per_step).floor() as i32;
            self.last_change = now;
            (power + delta.signum() * steps).clamp(0, 255)
        } else {
            power
        }
    }
}
