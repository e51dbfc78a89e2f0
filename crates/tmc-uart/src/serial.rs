//! 串口后端
//!
//! 基于 `serialport`。后台读线程持有克隆的端口句柄，
//! 把连续到达的字节累积成块，遇到字节间隔（读超时）时整块投递。

use crate::{ReceiveCallback, UartError, UartTransport};
use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tmc_protocol::format_bytes;
use tracing::{debug, info, trace, warn};

/// 串口配置
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// 端口路径；`None` 时使用枚举到的第一个端口
    pub port: Option<String>,
    pub baud_rate: u32,
    pub stop_bits: StopBits,
    /// 字节间隔：超过该时间没有新字节即视为一块结束
    pub frame_gap: Duration,
    /// 单线接口会回读自己发出的请求，开启后从接收块中去掉该回显
    pub strip_echo: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            stop_bits: StopBits::One,
            frame_gap: Duration::from_millis(2),
            strip_echo: false,
        }
    }
}

impl SerialConfig {
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_strip_echo(mut self, strip_echo: bool) -> Self {
        self.strip_echo = strip_echo;
        self
    }
}

/// 枚举到的串口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// 枚举系统串口
pub fn available_ports() -> Result<Vec<PortInfo>, UartError> {
    let ports = serialport::available_ports().map_err(|e| UartError::Backend(e.to_string()))?;
    Ok(ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe(&port.port_type),
            name: port.port_name,
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            match usb.manufacturer.as_deref() {
                Some(manufacturer) => format!("{} ({})", product, manufacturer),
                None => product.to_string(),
            }
        }
        SerialPortType::PciPort => "PCI serial".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
        SerialPortType::Unknown => "serial".to_string(),
    }
}

type SharedCallback = Arc<Mutex<Option<Arc<dyn ReceiveCallback>>>>;

/// 串口传输
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    port_name: Option<String>,
    callback: SharedCallback,
    last_sent: Arc<Mutex<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            port_name: None,
            callback: Arc::new(Mutex::new(None)),
            last_sent: Arc::new(Mutex::new(Vec::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn resolve_port(&self) -> Result<String, UartError> {
        if let Some(port) = &self.config.port {
            return Ok(port.clone());
        }

        let ports = available_ports()?;
        if ports.is_empty() {
            return Err(UartError::NoPorts);
        }
        for (i, port) in ports.iter().enumerate() {
            debug!("   [{}] {}: {}", i, port.name, port.description);
        }
        Ok(ports[0].name.clone())
    }

    fn reader_loop(
        mut port: Box<dyn SerialPort>,
        shutdown: Arc<AtomicBool>,
        callback: SharedCallback,
        last_sent: Arc<Mutex<Vec<u8>>>,
        strip_echo: bool,
    ) {
        let mut chunk: Vec<u8> = Vec::with_capacity(16);
        let mut buf = [0u8; 64];

        while !shutdown.load(Ordering::Relaxed) {
            match port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => chunk.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    if chunk.is_empty() {
                        continue;
                    }
                    let mut data = std::mem::take(&mut chunk);
                    if strip_echo {
                        let echo = last_sent.lock();
                        if !echo.is_empty() && data.starts_with(&echo) {
                            data.drain(..echo.len());
                        }
                    }
                    if data.is_empty() {
                        continue;
                    }

                    trace!("Received bytes: [{}]", format_bytes(&data));
                    let target = callback.lock().clone();
                    if let Some(cb) = target {
                        cb.deliver(data);
                    }
                }
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }

        debug!("Serial reader thread exiting");
    }
}

impl UartTransport for SerialTransport {
    fn open(&mut self) -> Result<(), UartError> {
        if self.port.is_some() {
            return Ok(());
        }

        let name = self.resolve_port()?;
        let port = serialport::new(&name, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(self.config.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(self.config.frame_gap)
            .open()
            .map_err(|e| UartError::OpenFailed {
                port: name.clone(),
                message: e.to_string(),
            })?;

        let reader_port = port.try_clone().map_err(|e| UartError::OpenFailed {
            port: name.clone(),
            message: e.to_string(),
        })?;

        self.shutdown.store(false, Ordering::Relaxed);
        let shutdown = Arc::clone(&self.shutdown);
        let callback = Arc::clone(&self.callback);
        let last_sent = Arc::clone(&self.last_sent);
        let strip_echo = self.config.strip_echo;
        let reader = thread::Builder::new()
            .name("tmc-uart-rx".to_string())
            .spawn(move || {
                Self::reader_loop(reader_port, shutdown, callback, last_sent, strip_echo);
            })
            .map_err(|e| UartError::Backend(format!("failed to spawn reader thread: {}", e)))?;

        info!("Opened {} at {} baud", name, self.config.baud_rate);
        self.reader = Some(reader);
        self.port = Some(port);
        self.port_name = Some(name);
        Ok(())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), UartError> {
        let port = self.port.as_mut().ok_or(UartError::NotOpen)?;
        if self.config.strip_echo {
            *self.last_sent.lock() = bytes.to_vec();
        }
        port.write_all(bytes)?;
        port.flush()?;
        trace!("Sent bytes: [{}]", format_bytes(bytes));
        Ok(())
    }

    fn close(&mut self) -> bool {
        self.shutdown.store(true, Ordering::Relaxed);
        let reader_ok = match self.reader.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        };
        let was_open = self.port.take().is_some();
        if was_open {
            info!("Closed {}", self.port_name());
        }
        was_open && reader_ok
    }

    fn subscribe(&mut self, callback: Arc<dyn ReceiveCallback>) {
        *self.callback.lock() = Some(callback);
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_name(&self) -> String {
        self.port_name
            .clone()
            .or_else(|| self.config.port.clone())
            .unwrap_or_else(|| String::from("<auto>"))
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            self.close();
        }
    }
}
