//! Host client against target stages and the monitor over an in-process link
#![cfg(feature = "std")]

use std::sync::mpsc::{channel, Receiver, SendError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};

use uart_monitor::client::{Client, Options, SerialPort};
use uart_monitor::{
    BaudInfo, Cpu, Error, Handoff, Jump, Memory, Monitor, MonitorConfig, Power, Stage,
    StageConfig, Transport, Uart, Units, Variant,
};

#[derive(Copy, Clone, PartialEq, Debug)]
enum PipeError {
    Closed,
}

/// One end of a byte pipe
struct Pipe {
    tx: Sender<u8>,
    rx: Receiver<u8>,
}

fn link() -> (Pipe, Pipe) {
    let (host_tx, target_rx) = channel();
    let (target_tx, host_rx) = channel();
    (
        Pipe { tx: host_tx, rx: host_rx },
        Pipe { tx: target_tx, rx: target_rx },
    )
}

impl Read<u8> for Pipe {
    type Error = PipeError;

    fn read(&mut self) -> nb::Result<u8, PipeError> {
        match self.rx.try_recv() {
            Ok(b) => Ok(b),
            Err(TryRecvError::Empty) => Err(nb::Error::WouldBlock),
            Err(TryRecvError::Disconnected) => Err(nb::Error::Other(PipeError::Closed)),
        }
    }
}

impl Write<u8> for Pipe {
    type Error = PipeError;

    fn write(&mut self, word: u8) -> nb::Result<(), PipeError> {
        self.tx
            .send(word)
            .map_err(|_: SendError<u8>| nb::Error::Other(PipeError::Closed))
    }

    fn flush(&mut self) -> nb::Result<(), PipeError> {
        Ok(())
    }
}

impl Uart<PipeError> for Pipe {
    fn configure(&mut self, _baud: &BaudInfo) -> Result<(), PipeError> {
        Ok(())
    }
}

impl SerialPort<PipeError> for Pipe {
    fn set_rts(&mut self, _level: bool) -> Result<(), PipeError> {
        Ok(())
    }

    fn set_dtr(&mut self, _level: bool) -> Result<(), PipeError> {
        Ok(())
    }

    fn set_baud_rate(&mut self, _baud: u32) -> Result<(), PipeError> {
        Ok(())
    }
}

/// Flat little-endian RAM starting at address zero
struct Ram(Vec<u8>);

impl Memory for Ram {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.0[addr as usize]
    }

    fn read_u16(&mut self, addr: u32) -> u16 {
        let a = addr as usize;
        u16::from_le_bytes([self.0[a], self.0[a + 1]])
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        let a = addr as usize;
        u32::from_le_bytes([self.0[a], self.0[a + 1], self.0[a + 2], self.0[a + 3]])
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.0[addr as usize] = value;
    }

    fn write_u16(&mut self, addr: u32, value: u16) {
        let a = addr as usize;
        self.0[a..a + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        let a = addr as usize;
        self.0[a..a + 4].copy_from_slice(&value.to_le_bytes());
    }
}

struct NoCpu;

impl Cpu for NoCpu {
    fn dcache_disable(&mut self) {}
    fn icache_disable(&mut self) {}
    fn mmu_disable(&mut self) {}
}

struct NoPower;

impl Power for NoPower {
    fn power_on(&mut self) {}
}

struct StdDelay;

impl DelayMs<u32> for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

type PipeTransport = Transport<Pipe, PipeError>;

/// Serve commands until the monitor is asked to jump or the link closes
fn serve(transport: PipeTransport, ram: Ram) -> Option<Jump> {
    let mut monitor = Monitor::new(
        transport,
        ram,
        Handoff::new(NoCpu, Units::default()),
        MonitorConfig::default(),
    );

    monitor.announce().ok()?;

    loop {
        match monitor.service() {
            Ok(Some(jump)) => return Some(jump),
            Ok(None) => (),
            Err(_) => return None,
        }
    }
}

fn target(pipe: Pipe) -> thread::JoinHandle<Option<Jump>> {
    thread::spawn(move || serve(PipeTransport::new(pipe), Ram(vec![0; 0x10000])))
}

fn stage(pipe: Pipe, variant: Variant) -> Stage<Pipe, Ram, NoPower, PipeError> {
    let config = StageConfig { variant, ..StageConfig::default() };
    Stage::new(PipeTransport::new(pipe), Ram(vec![0; 0x10000]), NoPower, config)
}

fn client(host: Pipe) -> Client<Pipe, StdDelay, PipeError> {
    Client::new(host, StdDelay, Options { no_reset: true, ..Options::default() })
}

#[test]
fn monitor_session() {
    let (host, device) = link();
    let handle = target(device);

    let mut c = client(host);
    c.await_monitor().unwrap();

    // Single word poke and peek
    c.write_u32(0x0100, 0xCAFE_F00D).unwrap();
    assert_eq!(c.read_u32(0x0100).unwrap(), 0xCAFE_F00D);
    assert_eq!(c.read_u16(0x0102).unwrap(), 0xCAFE);
    assert_eq!(c.read_u8(0x0100).unwrap(), 0x0D);

    // Checksummed block transfer
    let block: Vec<u8> = (0..1000u32).map(|i| (i * 7) as u8).collect();
    c.mem_write(0x2000, &block, |_| ()).unwrap();

    let mut back = vec![0u8; block.len()];
    let mut progress = 0;
    c.mem_read(0x2000, &mut back, |n| progress = n).unwrap();
    assert_eq!(back, block);
    assert_eq!(progress, block.len());

    // Rate negotiation
    c.set_baudrate(115_200).unwrap();
    assert_eq!(c.set_baudrate(12_345), Err(Error::Nack));
    assert_eq!(c.read_u32(0x0100).unwrap(), 0xCAFE_F00D);

    c.run_kernel(0x8000, 2028).unwrap();

    assert_eq!(
        handle.join().unwrap(),
        Some(Jump::Kernel { entry: 0x8000, machine: 2028 })
    );
}

#[test]
fn link_loss_stops_monitor() {
    let (host, device) = link();
    let handle = target(device);

    let mut c = client(host);
    c.await_monitor().unwrap();
    drop(c);

    assert_eq!(handle.join().unwrap(), None);
}

#[test]
fn startup_stage_session() {
    let (host, device) = link();
    let image: Vec<u8> = (0..37u8).collect();
    let len = image.len();

    let handle = thread::spawn(move || {
        let mut s = stage(device, Variant::Startup);
        s.run().ok()?;
        Some((s.transport().baud(), s.memory().0[0x200..0x200 + len].to_vec()))
    });

    let mut c = client(host);
    c.startup(&image, 115_200).unwrap();

    let (baud, loaded) = handle.join().unwrap().unwrap();
    assert_eq!(baud, Some(115_200));
    assert_eq!(loaded, image);
}

#[test]
fn loader_stage_boots_monitor() {
    let (host, device) = link();

    let handle = thread::spawn(move || {
        let mut s = stage(device, Variant::Loader);
        s.run().ok()?;

        let mut jump = None;
        s.enter_next(|t, ram| jump = serve(t, ram));
        jump
    });

    let image: Vec<u8> = (0..64u8).map(|b| b ^ 0xA5).collect();

    let mut c = client(host);
    c.boot(&image, 921_600).unwrap();

    // The loaded image is visible through the monitor
    let mut back = vec![0u8; image.len()];
    c.mem_read(0x200, &mut back, |_| ()).unwrap();
    assert_eq!(back, image);

    c.run(0x200).unwrap();
    assert_eq!(handle.join().unwrap(), Some(Jump::Plain { entry: 0x200 }));
}
