use std::sync::{Arc, Mutex, RwLock};

/// Snapshot of the physical inputs on the device panel: two buttons and
/// three analog controls. The `*_updated` flags record which half of the
/// state was refreshed by the last response that produced this value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub button1: bool,
    pub button2: bool,
    pub control1: u8,
    pub control2: u8,
    pub control3: u8,
    pub digital_updated: bool,
    pub analog_updated: bool,
}

impl DeviceState {
    /// Merge `other` into self, only overwriting the halves whose updated
    /// flag is set on `other`.
    pub fn update_with(&mut self, other: &DeviceState) {
        if other.digital_updated {
            self.button1 = other.button1;
            self.button2 = other.button2;
            self.digital_updated = true;
        }
        if other.analog_updated {
            self.control1 = other.control1;
            self.control2 = other.control2;
            self.control3 = other.control3;
            self.analog_updated = true;
        }
    }

    /// Copy of this state with both updated flags cleared, used as the
    /// scratch target while parsing a cycle's responses. Starting from the
    /// current values means a field whose payload fails to parse retains
    /// its previous reading.
    pub fn working_copy(&self) -> DeviceState {
        DeviceState {
            digital_updated: false,
            analog_updated: false,
            ..*self
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateEvent {
    Buttons {
        button1: bool,
        button2: bool,
    },
    Controls {
        control1: u8,
        control2: u8,
        control3: u8,
    },
    Shutdown,
}

pub struct MergeOutcome {
    pub buttons_changed: bool,
    pub analog_changed: bool,
    pub state: DeviceState,
}

pub type ButtonListener = Box<dyn Fn(&DeviceState) + Send + Sync>;

/// Shared handle to the device state. Writers commit whole snapshots under
/// the lock; readers always see a fully merged state, never a half-updated
/// one.
#[derive(Clone, Default)]
pub struct SharedDeviceState {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    state: RwLock<DeviceState>,
    listeners: Mutex<Vec<ButtonListener>>,
}

impl SharedDeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DeviceState {
        *self.inner.state.read().unwrap()
    }

    /// Register a listener fired whenever a button *changes* value. A
    /// refresh that reads back the same value does not fire.
    pub fn on_button_change(&self, listener: ButtonListener) {
        self.inner.listeners.lock().unwrap().push(listener);
    }

    /// Merge a scratch state produced by one protocol cycle. Listeners run
    /// after the write lock is released.
    pub fn merge(&self, scratch: &DeviceState) -> MergeOutcome {
        let (previous, current) = {
            let mut state = self.inner.state.write().unwrap();
            let previous = *state;
            state.digital_updated = false;
            state.analog_updated = false;
            state.update_with(scratch);
            (previous, *state)
        };

        let outcome = MergeOutcome {
            buttons_changed: scratch.digital_updated
                && (previous.button1 != current.button1 || previous.button2 != current.button2),
            analog_changed: scratch.analog_updated
                && (previous.control1 != current.control1
                    || previous.control2 != current.control2
                    || previous.control3 != current.control3),
            state: current,
        };

        if outcome.buttons_changed {
            for listener in self.inner.listeners.lock().unwrap().iter() {
                listener(&current);
            }
        }

        outcome
    }
}
