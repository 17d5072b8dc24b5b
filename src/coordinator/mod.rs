use crate::prelude::*;

use crate::generator;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Generators {
    remote: HashMap<u8, generator::Handle>,
    local: HashMap<u8, generator::Handle>,
}

/// Routes decoded remote messages to the generators and mirrors device
/// state changes back over the remote link.
#[derive(Clone)]
pub struct Coordinator {
    config: Config,
    channels: Channels,
    sender: SenderHandle,
    generators: Arc<Mutex<Generators>>,
    standalone: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: Config, channels: Channels, sender: SenderHandle) -> Self {
        Self {
            config,
            channels,
            sender,
            generators: Arc::new(Mutex::new(Generators::default())),
            standalone: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        futures::try_join!(self.remote_receiver(), self.state_receiver())?;

        Ok(())
    }

    pub fn stop(&self) {
        {
            let generators = self.generators.lock().unwrap();
            for handle in generators.remote.values().chain(generators.local.values()) {
                handle.stop();
            }
        }

        let _ = self.channels.from_remote.send(remote::ChannelData::Shutdown);
        let _ = self.channels.state_events.send(StateEvent::Shutdown);
        let _ = self.channels.to_remote.send(remote::ChannelData::Shutdown);
    }

    // remote -> generators
    async fn remote_receiver(&self) -> Result<()> {
        let mut receiver = self.channels.from_remote.subscribe();

        loop {
            match receiver.recv().await? {
                remote::ChannelData::Message(message) => {
                    if let Err(err) = self.process_message(message) {
                        warn!("failed to process remote message: {}", err);
                    }
                }
                remote::ChannelData::Connected => self.push_status(),
                remote::ChannelData::Disconnect => self.quiesce_remote(),
                remote::ChannelData::Shutdown => break,
            }
        }

        Ok(())
    }

    fn process_message(&self, message: Message) -> Result<()> {
        match message {
            Message::Hello { version, name } => {
                info!(
                    "remote peer hello, protocol {} ({})",
                    version,
                    name.unwrap_or_default()
                );
            }
            Message::Ping => self.push(Message::Ping)?,
            Message::Text { text } => info!("remote: {}", text),
            Message::Standalone { enabled } => self.set_standalone(enabled),
            Message::Processing { channel, update } => self.update_processing(channel, &update)?,
            Message::LocalProcessing { channel, .. } => {
                // outbound mirror only; a peer cannot edit the panel
                debug!("ignoring LOCAL update for channel {}", channel);
            }
            Message::Buttons { .. } | Message::Controls { .. } => {
                debug!("ignoring status push from peer");
            }
        }

        Ok(())
    }

    fn update_processing(&self, channel: u8, update: &ParameterUpdate) -> Result<()> {
        let configured = self
            .config
            .channel_with_id(channel)
            .ok_or_else(|| anyhow!("no configured channel {}", channel))?;

        let mut generators = self.generators.lock().unwrap();
        let handle = generators.remote.entry(channel).or_insert_with(|| {
            generator::spawn_remote(
                ChannelSender::new(self.sender.clone(), channel),
                configured.kind(),
            )
        });
        handle.apply(update);

        Ok(())
    }

    pub fn set_standalone(&self, enabled: bool) {
        if self.standalone.swap(enabled, Ordering::SeqCst) == enabled {
            return;
        }
        info!("standalone mode {}", if enabled { "on" } else { "off" });

        let mut generators = self.generators.lock().unwrap();
        if enabled {
            for channel in self.config.channels() {
                generators.local.entry(channel.id()).or_insert_with(|| {
                    generator::spawn_local(
                        ChannelSender::new(self.sender.clone(), channel.id()),
                        channel.kind(),
                        self.sender.device_state(),
                    )
                });
            }
        } else {
            for (_, handle) in generators.local.drain() {
                handle.stop();
            }
        }
    }

    // a vanished peer must not keep driving the outputs
    fn quiesce_remote(&self) {
        let generators = self.generators.lock().unwrap();
        for handle in generators.remote.values() {
            handle.set_mode(Mode::Off);
        }
    }

    // device -> remote
    async fn state_receiver(&self) -> Result<()> {
        let mut receiver = self.channels.state_events.subscribe();
        let mut last_button1 = self.sender.state().button1;

        loop {
            match receiver.recv().await? {
                StateEvent::Buttons { button1, button2 } => {
                    let _ = self.push(Message::Buttons { button1, button2 });

                    // button 1 press toggles standalone mode
                    if button1 && !last_button1 {
                        let enabled = !self.standalone.load(Ordering::SeqCst);
                        self.set_standalone(enabled);
                        let _ = self.push(Message::Standalone { enabled });
                    }
                    last_button1 = button1;
                }
                StateEvent::Controls {
                    control1,
                    control2,
                    control3,
                } => {
                    let _ = self.push(Message::Controls {
                        control1,
                        control2,
                        control3,
                    });
                    if self.standalone.load(Ordering::SeqCst) {
                        self.push_local_mirrors();
                    }
                }
                StateEvent::Shutdown => break,
            }
        }

        Ok(())
    }

    fn push_status(&self) {
        let state = self.sender.state();
        let _ = self.push(Message::Buttons {
            button1: state.button1,
            button2: state.button2,
        });
        let _ = self.push(Message::Controls {
            control1: state.control1,
            control2: state.control2,
            control3: state.control3,
        });
    }

    // mirror the panel-derived parameters so a connected peer can follow
    // local edits
    fn push_local_mirrors(&self) {
        let params = generator::local::derive(&self.sender.state());
        let update = ParameterUpdate {
            mode: Some(params.mode),
            power: Some(params.power),
            min_power: Some(params.min_power),
            frequency: Some(params.frequency),
            wave: Some(params.wave),
            cycle_length: Some(params.cycle_length),
            running_probability: Some(params.running_probability),
            avg_on_duration_ms: Some(params.avg_on_duration_ms),
            avg_off_duration_ms: Some(params.avg_off_duration_ms),
            power_change_duration_ms: Some(params.power_change_duration_ms),
        };

        for channel in self.config.channels() {
            let _ = self.push(Message::LocalProcessing {
                channel: channel.id(),
                update: update.clone(),
            });
        }
    }

    fn push(&self, message: Message) -> Result<()> {
        if self
            .channels
            .to_remote
            .send(remote::ChannelData::Message(message))
            .is_err()
        {
            bail!("send(to_remote) failed - channel closed?");
        }

        Ok(())
    }
}
