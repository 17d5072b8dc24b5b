#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stim_bridge::prelude::*;

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();
impl Factory {
    pub fn config() -> Config {
        serde_yaml::from_str(
            "device:\n  port: /dev/null\nchannels:\n  - id: 0\n    kind: lob\n  - id: 1\n    kind: tadel\n",
        )
        .unwrap()
    }
}

/// Scripted stand-in for the serial transport: answers each `\r`-terminated
/// command the way the firmware would, and records everything written.
#[derive(Clone)]
pub struct MockDevice {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    partial: String,
    written: Vec<String>,
    rx: VecDeque<u8>,
    buttons: (bool, bool),
    controls: (u8, u8, u8),
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                partial: String::new(),
                written: Vec::new(),
                rx: VecDeque::new(),
                buttons: (false, false),
                controls: (0, 0, 0),
            })),
        }
    }

    pub fn with_inputs(buttons: (bool, bool), controls: (u8, u8, u8)) -> Self {
        let device = Self::new();
        {
            let mut inner = device.inner.lock().unwrap();
            inner.buttons = buttons;
            inner.controls = controls;
        }
        device
    }

    pub fn set_buttons(&self, button1: bool, button2: bool) {
        self.inner.lock().unwrap().buttons = (button1, button2);
    }

    pub fn set_controls(&self, control1: u8, control2: u8, control3: u8) {
        self.inner.lock().unwrap().controls = (control1, control2, control3);
    }

    pub fn written(&self) -> Vec<String> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn written_count(&self, line: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .written
            .iter()
            .filter(|w| w.as_str() == line)
            .count()
    }
}

impl Inner {
    fn respond(&mut self, line: &str) {
        let bit = |b: bool| if b { '1' } else { '0' };

        let response = match line {
            "S" => format!("S{}{}\rOK", bit(self.buttons.0), bit(self.buttons.1)),
            "A" => format!(
                "A{};{};{}\rOK",
                self.controls.0, self.controls.1, self.controls.2
            ),
            _ => "OK".to_string(),
        };
        self.rx.extend(response.bytes());
    }
}

impl Write for MockDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        inner.partial.push_str(&String::from_utf8_lossy(buf));

        while let Some(index) = inner.partial.find('\r') {
            let line: String = inner.partial.drain(..=index).take(index).collect();
            inner.written.push(line.clone());
            inner.respond(&line);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // a serial byte is never instantaneous
        std::thread::sleep(Duration::from_millis(1));

        let mut inner = self.inner.lock().unwrap();
        if inner.rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }

        let mut count = 0;
        while count < buf.len() {
            match inner.rx.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

pub async fn wait_until_async(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
