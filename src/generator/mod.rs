use crate::prelude::*;

pub mod local;
pub mod modes;
pub mod params;

use crate::sender::channel::SEND_QUANTUM;
use modes::{PowerRamp, Random1State, Random2State, WaveState};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(100);

/// Where a generator reads its live parameters from.
pub enum Source {
    /// Shared set updated by remote parameter messages.
    Remote(Arc<RwLock<ParameterSet>>),
    /// Derived from the physical panel on every tick.
    Local(SharedDeviceState),
}

impl Source {
    fn current(&self) -> ParameterSet {
        match self {
            Source::Remote(params) => params.read().unwrap().clone(),
            Source::Local(state) => local::derive(&state.snapshot()),
        }
    }
}

/// Running generator task. Stopping is cooperative: the flag is observed at
/// the top of the loop, bounded by one tick of latency.
pub struct Handle {
    stop: Arc<AtomicBool>,
    params: Option<Arc<RwLock<ParameterSet>>>,
    _task: tokio::task::JoinHandle<()>,
}

impl Handle {
    pub fn apply(&self, update: &ParameterUpdate) {
        if let Some(params) = &self.params {
            params.write().unwrap().apply(update);
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        if let Some(params) = &self.params {
            params.write().unwrap().mode = mode;
        }
    }

    pub fn params(&self) -> Option<ParameterSet> {
        self.params
            .as_ref()
            .map(|params| params.read().unwrap().clone())
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub fn spawn_remote(sender: ChannelSender, kind: ChannelKind) -> Handle {
    let params = Arc::new(RwLock::new(ParameterSet::default()));
    spawn(sender, kind, Source::Remote(params.clone()), Some(params))
}

pub fn spawn_local(sender: ChannelSender, kind: ChannelKind, state: SharedDeviceState) -> Handle {
    spawn(sender, kind, Source::Local(state), None)
}

fn spawn(
    sender: ChannelSender,
    kind: ChannelKind,
    source: Source,
    params: Option<Arc<RwLock<ParameterSet>>>,
) -> Handle {
    let stop = Arc::new(AtomicBool::new(false));
    let task = tokio::spawn(run(sender, kind, source, stop.clone()));

    Handle {
        stop,
        params,
        _task: task,
    }
}

async fn run(sender: ChannelSender, kind: ChannelKind, source: Source, stop: Arc<AtomicBool>) {
    info!("generator starting on channel {} ({:?})", sender.channel(), kind);

    let mut rng = StdRng::from_entropy();
    let started = Instant::now();
    let mut wave = WaveState::new();
    let mut random1 = Random1State::new(started);
    let mut random2 = Random2State::new(started);
    let mut ramp = PowerRamp::new(started);
    let mut ramped_power: i32 = 0;
    let mut last_fixed: Option<i32> = None;
    let mut active = false;

    while !stop.load(Ordering::Relaxed) {
        let params = source.current();
        let now = Instant::now();

        // In the velocity-controlled modes the tadel power converges toward
        // the target implied by the control instead of being set directly.
        let power = match (kind, params.mode) {
            (ChannelKind::Tadel, Mode::Wave | Mode::Random1) => {
                ramped_power = ramp.tick(now, params.power, ramped_power);
                ramped_power
            }
            _ => params.power as i32,
        };

        if params.mode != Mode::Fixed {
            last_fixed = None;
        }

        let level = match params.mode {
            // Pulse is externally triggered; only its parameters are
            // plumbed through, the loop idles.
            Mode::Off | Mode::Pulse => None,
            Mode::Fixed => Some(power),
            Mode::Wave => {
                let level = wave.output(power, params.min_power as i32);
                wave.advance(params.cycle_length);
                Some(level)
            }
            Mode::Random1 => {
                let high = random1.tick(now, params.running_probability, &mut rng);
                Some(if high { power } else { low_level(kind, &params) })
            }
            Mode::Random2 => {
                let high = random2.tick(
                    now,
                    params.avg_on_duration_ms as f64,
                    params.avg_off_duration_ms as f64,
                    &mut rng,
                );
                Some(if high { power } else { 0 })
            }
        };

        let result = match level {
            None => {
                if active {
                    active = false;
                    push(&sender, kind, 0, &params).await
                } else {
                    tokio::time::sleep(IDLE_POLL).await;
                    Ok(())
                }
            }
            Some(level) => {
                active = true;
                if params.mode == Mode::Fixed {
                    let result =
                        push_fixed(&sender, kind, level, &params, last_fixed).await;
                    last_fixed = Some(level);
                    result
                } else {
                    push(&sender, kind, level, &params).await
                }
            }
        };

        if let Err(err) = result {
            warn!("generator on channel {}: {}", sender.channel(), err);
            break;
        }
    }

    // always leave the output at zero
    let _ = push(&sender, kind, 0, &ParameterSet::default()).await;
    info!("generator on channel {} stopped", sender.channel());
}

// Fixed mode honours the power-change duration: a new level is reached by a
// linear ramp from the previous one rather than a step.
async fn push_fixed(
    sender: &ChannelSender,
    kind: ChannelKind,
    level: i32,
    params: &ParameterSet,
    last: Option<i32>,
) -> Result<()> {
    match last {
        Some(previous) if previous != level && params.power_change_duration_ms > 0 => {
            let duration = Duration::from_millis(params.power_change_duration_ms);
            match kind {
                ChannelKind::Lob => sender.lob_ramp(previous, level, duration).await,
                ChannelKind::Tadel => {
                    let frequency = params.frequency as i32;
                    let wave = params.wave as i32;
                    sender
                        .tadel_ramp(previous, level, frequency, frequency, wave, wave, duration)
                        .await
                }
            }
        }
        _ => push(sender, kind, level, params).await,
    }
}

async fn push(
    sender: &ChannelSender,
    kind: ChannelKind,
    level: i32,
    params: &ParameterSet,
) -> Result<()> {
    match kind {
        ChannelKind::Lob => sender.lob(level, SEND_QUANTUM).await,
        ChannelKind::Tadel => {
            sender
                .tadel(
                    level,
                    params.frequency as i32,
                    params.wave as i32,
                    SEND_QUANTUM,
                )
                .await
        }
    }
}

fn low_level(kind: ChannelKind, params: &ParameterSet) -> i32 {
    match kind {
        ChannelKind::Lob => params.min_power as i32,
        ChannelKind::Tadel => 0,
    }
}
