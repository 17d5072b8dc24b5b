use crate::prelude::*;

use serde::Deserialize;
use std::fs;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub device: Device,

    #[serde(default = "Config::default_remote")]
    pub remote: Remote,

    #[serde(default = "Config::default_channels")]
    pub channels: Vec<Channel>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    /// Start with the locally-driven generators already running.
    #[serde(default)]
    pub standalone: bool,
}

// Device {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    pub port: String,

    #[serde(default = "Config::default_baud")]
    pub baud: u32,

    pub read_timeout_ms: Option<u64>,
}

impl Device {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms.unwrap_or(50)
    }
} // }}}

// Remote {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Remote {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default = "Config::default_remote_bind")]
    pub bind: String,

    #[serde(default = "Config::default_remote_port")]
    pub port: u16,
}

impl Remote {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn bind(&self) -> &str {
        &self.bind
    }

    pub fn port(&self) -> u16 {
        self.port
    }
} // }}}

// Channel {{{
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Lob,
    Tadel,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: u8,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }
} // }}}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn remote(&self) -> &Remote {
        &self.remote
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_with_id(&self, id: u8) -> Option<Channel> {
        self.channels.iter().copied().find(|c| c.id == id)
    }

    pub fn loglevel(&self) -> String {
        self.loglevel.clone()
    }

    pub fn standalone(&self) -> bool {
        self.standalone
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_baud() -> u32 {
        9600
    }

    fn default_remote() -> Remote {
        Remote {
            enabled: true,
            bind: Self::default_remote_bind(),
            port: Self::default_remote_port(),
        }
    }

    fn default_remote_bind() -> String {
        "0.0.0.0".to_string()
    }

    fn default_remote_port() -> u16 {
        9035
    }

    fn default_channels() -> Vec<Channel> {
        vec![
            Channel {
                id: 0,
                kind: ChannelKind::Lob,
            },
            Channel {
                id: 1,
                kind: ChannelKind::Tadel,
            },
        ]
    }
}
