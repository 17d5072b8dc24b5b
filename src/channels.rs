use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_remote: broadcast::Sender<remote::ChannelData>,
    pub to_remote: broadcast::Sender<remote::ChannelData>,
    pub state_events: broadcast::Sender<StateEvent>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_remote: Self::channel(),
            to_remote: Self::channel(),
            state_events: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
