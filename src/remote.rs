use crate::prelude::*;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, LinesCodec};

pub const PROTOCOL_VERSION: u32 = 2;

const MAX_LINE_LENGTH: usize = 8192;

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelData {
    Message(Message),
    Connected,
    Disconnect,
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;
pub type Receiver = broadcast::Receiver<ChannelData>;

/// The remote control link: one line-framed byte-stream peer at a time.
/// Decoded messages go out on `from_remote`; anything on `to_remote` is
/// encoded and written to the connected peer.
#[derive(Clone)]
pub struct Remote {
    config: Config,
    channels: Channels,
}

impl Remote {
    pub fn new(config: Config, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let remote = self.config.remote();

        if !remote.enabled() {
            info!("remote link disabled, skipping");
            return Ok(());
        }

        let listener = TcpListener::bind((remote.bind(), remote.port()))
            .await
            .map_err(|err| {
                anyhow!(
                    "failed to bind remote listener {}:{}: {}",
                    remote.bind(),
                    remote.port(),
                    err
                )
            })?;
        info!("remote link listening on {}:{}", remote.bind(), remote.port());

        let mut control = self.channels.to_remote.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = accepted?;
                    info!("remote peer {} connected", addr);
                    let _ = self.channels.from_remote.send(ChannelData::Connected);

                    if let Err(err) = self.handle_peer(stream).await {
                        warn!("remote peer {}: {}", addr, err);
                    }

                    info!("remote peer {} disconnected", addr);
                    let _ = self.channels.from_remote.send(ChannelData::Disconnect);
                }
                message = control.recv() => {
                    match message {
                        Ok(ChannelData::Shutdown) => break,
                        // outgoing traffic with no peer connected is dropped
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(_) => break,
                    }
                }
            }
        }

        info!("remote link exiting");
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.to_remote.send(ChannelData::Shutdown);
    }

    async fn handle_peer(&self, stream: TcpStream) -> Result<()> {
        let (reader, writer) = stream.into_split();

        // either half ending tears the connection down
        tokio::select! {
            result = self.peer_reader(reader) => result,
            result = self.peer_writer(writer) => result,
        }
    }

    // remote -> coordinator
    async fn peer_reader(&self, reader: OwnedReadHalf) -> Result<()> {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

        while let Some(line) = lines.next().await {
            let line = line?;
            match Message::decode(&line) {
                Ok(message) => {
                    debug!("RX: {:?}", message);
                    if self
                        .channels
                        .from_remote
                        .send(ChannelData::Message(message))
                        .is_err()
                    {
                        bail!("send(from_remote) failed - channel closed?");
                    }
                }
                // a bad line only voids that message, the link stays open
                Err(err) => warn!("dropping malformed message: {}", err),
            }
        }

        Ok(())
    }

    // coordinator -> remote
    async fn peer_writer(&self, mut writer: OwnedWriteHalf) -> Result<()> {
        let mut receiver = self.channels.to_remote.subscribe();

        let hello = Message::Hello {
            version: PROTOCOL_VERSION,
            name: None,
        };
        Self::write_line(&mut writer, &hello).await?;

        loop {
            match receiver.recv().await {
                Ok(ChannelData::Message(message)) => {
                    debug!("TX: {:?}", message);
                    Self::write_line(&mut writer, &message).await?;
                }
                Ok(ChannelData::Shutdown) => {
                    info!("remote writer received shutdown signal");
                    break;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("remote writer lagging, {} messages dropped", skipped);
                }
                Err(_) => break,
            }
        }

        Ok(())
    }

    async fn write_line(writer: &mut OwnedWriteHalf, message: &Message) -> Result<()> {
        let mut line = message.encode();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        Ok(())
    }
}
