pub use std::str::FromStr;

pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use tokio::sync::broadcast;

pub use crate::channels::Channels;
pub use crate::command::{ReadCommand, WriteCommand};
pub use crate::config::{ChannelKind, Config};
pub use crate::device_state::{DeviceState, SharedDeviceState, StateEvent};
pub use crate::generator::params::{Mode, ParameterSet, ParameterUpdate};
pub use crate::message::Message;
pub use crate::options::Options;
pub use crate::sender::channel::ChannelSender;
pub use crate::sender::{Sender, SenderHandle};

pub use crate::{
    channels, command, config, coordinator, device_state, generator, message, remote, sender,
};
