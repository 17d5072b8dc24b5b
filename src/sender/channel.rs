use crate::prelude::*;

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Atomic send quantum. Commands bounded by this are allowed to coalesce;
/// anything longer is queued as non-overridable so it cannot be replaced by
/// a later rapid update.
pub const SEND_QUANTUM: Duration = Duration::from_millis(200);

/// Per-channel facade translating duration-bounded intents into queued
/// write commands. Calls pace wall-clock time, returning only once the
/// requested duration has elapsed.
#[derive(Clone)]
pub struct ChannelSender {
    handle: SenderHandle,
    channel: u8,
}

impl ChannelSender {
    pub fn new(handle: SenderHandle, channel: u8) -> Self {
        Self { handle, channel }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Hold `power` for `duration`.
    pub async fn lob(&self, power: i32, duration: Duration) -> Result<()> {
        let started = Instant::now();
        let no_override = duration > SEND_QUANTUM;
        self.handle.submit(
            WriteCommand::lob(self.channel, power, duration, no_override),
            true,
        )?;
        Self::pace(started, duration).await;
        Ok(())
    }

    /// Hold `power`/`frequency`/`wave` for `duration`.
    pub async fn tadel(
        &self,
        power: i32,
        frequency: i32,
        wave: i32,
        duration: Duration,
    ) -> Result<()> {
        let started = Instant::now();
        let no_override = duration > SEND_QUANTUM;
        self.handle.submit(
            WriteCommand::tadel(self.channel, power, frequency, wave, duration, no_override),
            true,
        )?;
        Self::pace(started, duration).await;
        Ok(())
    }

    /// Ramp power linearly over `duration` in steps of the send quantum. A
    /// ramp short enough for a single step degenerates to holding the end
    /// value.
    pub async fn lob_ramp(
        &self,
        start_power: i32,
        end_power: i32,
        duration: Duration,
    ) -> Result<()> {
        let steps = Self::ramp_steps(duration);
        if steps <= 1 {
            return self.lob(end_power, duration).await;
        }

        let step_duration = duration / steps as u32;
        for step in 1..=steps {
            let power = Self::interpolate(start_power, end_power, step, steps);
            self.lob(power, step_duration).await?;
        }
        Ok(())
    }

    /// Ramp all three tadel fields linearly over `duration`.
    #[allow(clippy::too_many_arguments)]
    pub async fn tadel_ramp(
        &self,
        start_power: i32,
        end_power: i32,
        start_frequency: i32,
        end_frequency: i32,
        start_wave: i32,
        end_wave: i32,
        duration: Duration,
    ) -> Result<()> {
        let steps = Self::ramp_steps(duration);
        if steps <= 1 {
            return self.tadel(end_power, end_frequency, end_wave, duration).await;
        }

        let step_duration = duration / steps as u32;
        for step in 1..=steps {
            let power = Self::interpolate(start_power, end_power, step, steps);
            let frequency = Self::interpolate(start_frequency, end_frequency, step, steps);
            let wave = Self::interpolate(start_wave, end_wave, step, steps);
            self.tadel(power, frequency, wave, step_duration).await?;
        }
        Ok(())
    }

    /// Force the channel to zero in both command styles, repeated three
    /// times so a dropped final command cannot leave an output live.
    pub async fn close(&self) -> Result<()> {
        for _ in 0..3 {
            self.handle.submit(
                WriteCommand::lob(self.channel, 0, SEND_QUANTUM, true),
                false,
            )?;
            self.handle.submit(
                WriteCommand::tadel(self.channel, 0, 0, 0, SEND_QUANTUM, true),
                false,
            )?;
        }
        Ok(())
    }

    fn ramp_steps(duration: Duration) -> i64 {
        (duration.as_millis() / SEND_QUANTUM.as_millis()) as i64
    }

    fn interpolate(start: i32, end: i32, step: i64, steps: i64) -> i32 {
        start + ((end - start) as i64 * step / steps) as i32
    }

    async fn pace(started: Instant, duration: Duration) {
        let elapsed = started.elapsed();
        if elapsed < duration {
            sleep(duration - elapsed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_step_count_follows_quantum() {
        assert_eq!(ChannelSender::ramp_steps(Duration::from_millis(1000)), 5);
        assert_eq!(ChannelSender::ramp_steps(Duration::from_millis(399)), 1);
        assert_eq!(ChannelSender::ramp_steps(Duration::from_millis(100)), 0);
    }

    #[test]
    fn interpolation_hits_both_ends() {
        assert_eq!(ChannelSender::interpolate(0, 100, 1, 5), 20);
        assert_eq!(ChannelSender::interpolate(0, 100, 5, 5), 100);
        assert_eq!(ChannelSender::interpolate(100, 0, 5, 5), 0);
        assert_eq!(ChannelSender::interpolate(50, 50, 3, 5), 50);
    }
}
