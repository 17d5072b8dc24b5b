use crate::prelude::*;

// Six mode bands across the 0..=255 selector travel.
const MODE_BAND: u8 = 43;

/// Derive a parameter set from the physical panel. Button 2 gates the
/// output; control 3 selects the mode; control 1 is the power (or the
/// velocity input in the ramped tadel modes); control 2 is the
/// mode-dependent shape control.
pub fn derive(state: &DeviceState) -> ParameterSet {
    let mut params = ParameterSet::default();
    if !state.button2 {
        return params; // gate open: everything stays Off
    }

    params.mode = mode_from_selector(state.control3);
    params.power = state.control1;
    params.frequency = state.control2;
    params.cycle_length = (state.control2 / 8) as u32;
    params.running_probability = state.control2 as f64 / 255.0;

    // the panel pot expresses random dwell averages on an exponential
    // scale, seconds = e^(0.016 * x)
    let avg_ms = ((0.016 * state.control2 as f64).exp() * 1000.0) as u64;
    params.avg_on_duration_ms = avg_ms;
    params.avg_off_duration_ms = avg_ms;

    params
}

fn mode_from_selector(control: u8) -> Mode {
    Mode::try_from((control / MODE_BAND).min(5)).unwrap_or(Mode::Off)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button2_gates_everything_off() {
        let state = DeviceState {
            button2: false,
            control1: 200,
            control3: 255,
            ..Default::default()
        };
        assert_eq!(derive(&state).mode, Mode::Off);
    }

    #[test]
    fn selector_bands_cover_all_modes() {
        assert_eq!(mode_from_selector(0), Mode::Off);
        assert_eq!(mode_from_selector(42), Mode::Off);
        assert_eq!(mode_from_selector(43), Mode::Fixed);
        assert_eq!(mode_from_selector(86), Mode::Wave);
        assert_eq!(mode_from_selector(129), Mode::Random1);
        assert_eq!(mode_from_selector(172), Mode::Random2);
        assert_eq!(mode_from_selector(215), Mode::Pulse);
        assert_eq!(mode_from_selector(255), Mode::Pulse);
    }

    #[test]
    fn dwell_average_follows_exponential_pot_law() {
        let state = DeviceState {
            button2: true,
            control2: 0,
            control3: 172, // Random2 band
            ..Default::default()
        };
        assert_eq!(derive(&state).avg_on_duration_ms, 1000); // e^0 seconds

        let state = DeviceState {
            control2: 100,
            ..state
        };
        let expected = ((0.016f64 * 100.0).exp() * 1000.0) as u64;
        assert_eq!(derive(&state).avg_on_duration_ms, expected);
    }
}
