use crate::prelude::*;

pub mod channel;
pub mod queue;

use queue::CommandQueue;
use std::collections::BTreeSet;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Blocking byte transport to the device. Production uses a serial port;
/// tests substitute a scripted implementation.
pub trait Transport: Read + Write + Send {}
impl<T: Read + Write + Send> Transport for T {}

const IO_RETRY_DELAY: Duration = Duration::from_millis(50);
const READ_IDLE_DELAY: Duration = Duration::from_millis(5);

// Cap on consecutive empty reads once the engine is closing, so a dead
// device cannot wedge the drain.
const CLOSED_READ_IDLE_LIMIT: u32 = 50;

#[derive(Default)]
pub struct CycleStats {
    cycles: u64,
    commands_sent: u64,
    responses_ok: u64,
    responses_failed: u64,
    io_retries: u64,
}

impl CycleStats {
    pub fn print_summary(&self) {
        info!("Protocol statistics:");
        info!("  Cycles completed: {}", self.cycles);
        info!("  Commands sent: {}", self.commands_sent);
        info!("  Responses: {} ok, {} failed", self.responses_ok, self.responses_failed);
        info!("  I/O retries: {}", self.io_retries);
    }
}

#[derive(Default)]
struct Used {
    lob: BTreeSet<u8>,
    tadel: BTreeSet<u8>,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<CommandQueue>,
    closed: AtomicBool,
    used: Mutex<Used>,
    stats: Mutex<CycleStats>,
}

/// Cloneable submission handle, passed to the channel facades and the
/// coordinator instead of any global engine instance.
#[derive(Clone)]
pub struct SenderHandle {
    shared: Arc<Shared>,
    state: SharedDeviceState,
}

impl SenderHandle {
    pub fn submit(&self, command: WriteCommand, do_override: bool) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            bail!("engine is closed");
        }

        match command {
            WriteCommand::Lob { channel, .. } => {
                self.shared.used.lock().unwrap().lob.insert(channel);
            }
            WriteCommand::Tadel { channel, .. } => {
                self.shared.used.lock().unwrap().tadel.insert(channel);
            }
            WriteCommand::Wait { .. } => {}
        }

        self.shared.queue.lock().unwrap().push(command, do_override);
        Ok(())
    }

    pub fn state(&self) -> DeviceState {
        self.state.snapshot()
    }

    pub fn device_state(&self) -> SharedDeviceState {
        self.state.clone()
    }

    pub fn pending(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }
}

/// The protocol engine. Owns the transport and a single worker thread that
/// drains the write queue, keeps the device state fresh with interleaved
/// reads, and parses the framed responses.
pub struct Sender {
    handle: SenderHandle,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Sender {
    /// Open the configured serial port and start the worker. Failure to
    /// open the port is fatal: no engine instance is produced.
    pub fn connect(config: &Config, channels: Channels) -> Result<Self> {
        let device = config.device();
        let port = serialport::new(device.port(), device.baud())
            .timeout(Duration::from_millis(device.read_timeout_ms()))
            .open()
            .map_err(|err| anyhow!("failed to open serial port {}: {}", device.port(), err))?;

        info!("serial port {} open at {} baud", device.port(), device.baud());
        Self::start(Box::new(port), channels)
    }

    /// Start the engine on an already-open transport.
    pub fn start(transport: Box<dyn Transport>, channels: Channels) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let state = SharedDeviceState::new();

        // bridge button edges onto the async side
        let events = channels.state_events.clone();
        state.on_button_change(Box::new(move |snapshot| {
            let _ = events.send(StateEvent::Buttons {
                button1: snapshot.button1,
                button2: snapshot.button2,
            });
        }));

        let worker = {
            let shared = shared.clone();
            let state = state.clone();
            thread::Builder::new()
                .name("stim-protocol".to_string())
                .spawn(move || run(transport, shared, state, channels))
                .map_err(|err| anyhow!("failed to spawn protocol worker: {}", err))?
        };

        Ok(Self {
            handle: SenderHandle { shared, state },
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn handle(&self) -> SenderHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> DeviceState {
        self.handle.state()
    }

    pub fn device_state(&self) -> SharedDeviceState {
        self.handle.device_state()
    }

    /// Zero every channel ever written, refuse further submissions, let the
    /// worker drain exactly those final commands, then release the
    /// transport.
    pub fn close(&self) {
        let shared = &self.handle.shared;

        if !shared.closed.swap(true, Ordering::SeqCst) {
            // queued directly, after the closed flag is up, so no external
            // submission can slip in behind the zeroes
            let used = shared.used.lock().unwrap();
            let mut queue = shared.queue.lock().unwrap();
            for &channel in &used.lob {
                queue.push(WriteCommand::lob(channel, 0, channel::SEND_QUANTUM, true), false);
            }
            for &channel in &used.tadel {
                queue.push(
                    WriteCommand::tadel(channel, 0, 0, 0, channel::SEND_QUANTUM, true),
                    false,
                );
            }
        }

        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                error!("protocol worker panicked");
            }
            self.handle.shared.stats.lock().unwrap().print_summary();
        }
    }
}

// One drain cycle sends at most two commands: either a popped write paired
// with one read (alternating A/S so neither starves), or a full A+S refresh
// when the queue is idle.
fn run(
    mut transport: Box<dyn Transport>,
    shared: Arc<Shared>,
    state: SharedDeviceState,
    channels: Channels,
) {
    info!("protocol worker starting");

    let mut flip = ReadCommand::AnalogRead;
    let mut leftover = String::new();

    loop {
        let write = shared.queue.lock().unwrap().pop();
        let closed = shared.closed.load(Ordering::SeqCst);
        if write.is_none() && closed {
            break;
        }

        if let Some(WriteCommand::Wait { duration }) = write {
            thread::sleep(duration);
        }

        let reads: Vec<ReadCommand> = match write {
            None => vec![ReadCommand::AnalogRead, ReadCommand::DigitalRead],
            Some(_) => {
                let read = flip;
                flip = flip.other();
                vec![read]
            }
        };

        let mut lines: Vec<String> = Vec::new();
        if let Some(command) = write {
            if let Some(text) = command.wire() {
                lines.push(text);
            }
        }
        lines.extend(reads.iter().map(|read| read.wire().to_string()));

        if let Err(err) = send_all(transport.as_mut(), &lines) {
            warn!("transport write failed: {} - retrying cycle", err);
            shared.stats.lock().unwrap().io_retries += 1;
            if let Some(command) = write {
                if !matches!(command, WriteCommand::Wait { .. }) {
                    shared.queue.lock().unwrap().push_front(command);
                }
            }
            thread::sleep(IO_RETRY_DELAY);
            continue;
        }
        shared.stats.lock().unwrap().commands_sent += lines.len() as u64;

        let mut scratch = state.snapshot().working_copy();
        if read_responses(
            transport.as_mut(),
            &shared,
            &reads,
            &mut scratch,
            &mut leftover,
            lines.len(),
        ) {
            let outcome = state.merge(&scratch);
            if outcome.analog_changed {
                let _ = channels.state_events.send(StateEvent::Controls {
                    control1: outcome.state.control1,
                    control2: outcome.state.control2,
                    control3: outcome.state.control3,
                });
            }
            shared.stats.lock().unwrap().cycles += 1;
        }
    }

    info!("protocol worker exiting");
}

fn send_all(transport: &mut dyn Transport, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        transport.write_all(line.as_bytes())?;
        transport.write_all(b"\r")?;
    }
    transport.flush()
}

// Accumulate transport input until one terminator per sent command has been
// matched, feeding each payload to every read command in the cycle. Partial
// input is never discarded; it stays in `leftover` for the next match.
fn read_responses(
    transport: &mut dyn Transport,
    shared: &Shared,
    reads: &[ReadCommand],
    scratch: &mut DeviceState,
    leftover: &mut String,
    expected: usize,
) -> bool {
    let mut matched = 0;
    let mut idle_reads = 0u32;

    while matched < expected {
        if let Some((payload, ok, rest)) = split_response(leftover) {
            *leftover = rest;

            let mut stats = shared.stats.lock().unwrap();
            if ok {
                stats.responses_ok += 1;
            } else {
                stats.responses_failed += 1;
                warn!("device reported FAILED: {:?}", payload.trim());
            }
            drop(stats);

            for read in reads {
                read.process_response(&payload, scratch);
            }
            matched += 1;
            idle_reads = 0;
            continue;
        }

        let mut buf = [0u8; 256];
        let idle = match transport.read(&mut buf) {
            Ok(0) => true,
            Ok(n) => {
                leftover.push_str(&String::from_utf8_lossy(&buf[..n]));
                idle_reads = 0;
                false
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                true
            }
            Err(err) => {
                warn!("transport read failed: {}", err);
                shared.stats.lock().unwrap().io_retries += 1;
                return false;
            }
        };

        if idle {
            if shared.closed.load(Ordering::SeqCst) {
                idle_reads += 1;
                if idle_reads > CLOSED_READ_IDLE_LIMIT {
                    warn!("no response while closing - abandoning cycle");
                    return false;
                }
            }
            thread::sleep(READ_IDLE_DELAY);
        }
    }

    true
}

// Everything before the earliest OK/FAILED is the payload for one
// outstanding response; the remainder is kept for the next match. Fragile
// if a payload ever contained either literal, but the firmware only emits
// them as terminators.
fn split_response(buffer: &str) -> Option<(String, bool, String)> {
    let ok = buffer.find("OK");
    let failed = buffer.find("FAILED");

    let (index, is_ok, len) = match (ok, failed) {
        (Some(o), Some(f)) if f < o => (f, false, "FAILED".len()),
        (Some(o), _) => (o, true, "OK".len()),
        (None, Some(f)) => (f, false, "FAILED".len()),
        (None, None) => return None,
    };

    Some((
        buffer[..index].to_string(),
        is_ok,
        buffer[index + len..].to_string(),
    ))
}
