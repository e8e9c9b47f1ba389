#[macro_use]
extern crate log;

extern crate structopt;
use structopt::StructOpt;

extern crate simplelog;
use simplelog::{Config, LevelFilter, SimpleLogger};

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};

use uart_monitor::client::{Client, Options};

#[derive(Clone, Debug, StructOpt)]
pub struct Args {
    /// Serial port to connect to
    #[structopt(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Serial port baud rate the target is currently running at
    #[structopt(long, default_value = "19200")]
    baud: u32,

    #[structopt(flatten)]
    options: Options,

    /// Log level for console output
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,

    #[structopt(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, StructOpt)]
pub enum Operation {
    /// Reset the target and load a monitor image through the stage loader
    Boot {
        /// Monitor image to load
        #[structopt(long, parse(from_os_str))]
        image: PathBuf,

        /// Link rate to switch to before loading
        #[structopt(long, default_value = "115200")]
        rate: u32,
    },

    /// Change the monitor link rate
    Baud { rate: u32 },

    /// Read a value from target memory
    Read {
        /// Access width in bits (8, 16 or 32)
        #[structopt(long, default_value = "32")]
        width: u8,

        #[structopt(parse(try_from_str = parse_u32))]
        address: u32,
    },

    /// Write a value to target memory
    Write {
        /// Access width in bits (8, 16 or 32)
        #[structopt(long, default_value = "32")]
        width: u8,

        #[structopt(parse(try_from_str = parse_u32))]
        address: u32,

        #[structopt(parse(try_from_str = parse_u32))]
        value: u32,
    },

    /// Read a block of target memory
    Dump {
        #[structopt(parse(try_from_str = parse_u32))]
        address: u32,

        /// Length in bytes, accepts units (eg. 4KB)
        #[structopt(parse(try_from_str = parse_size))]
        length: u32,

        /// Write the block to a file instead of the console
        #[structopt(long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Write a file to target memory
    Load {
        #[structopt(parse(try_from_str = parse_u32))]
        address: u32,

        #[structopt(parse(from_os_str))]
        file: PathBuf,

        /// Call this address once loaded
        #[structopt(long, parse(try_from_str = parse_u32))]
        run: Option<u32>,
    },

    /// Call code at an address
    Run {
        #[structopt(parse(try_from_str = parse_u32))]
        address: u32,
    },

    /// Load and boot a kernel image
    Kernel {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        #[structopt(long, default_value = "0x8000", parse(try_from_str = parse_u32))]
        load_address: u32,

        /// Entry point, defaults to the load address
        #[structopt(long, parse(try_from_str = parse_u32))]
        exec_address: Option<u32>,

        /// Machine type passed to the kernel
        #[structopt(long, default_value = "2028")]
        machine: u32,

        /// Link rate to switch to before booting
        #[structopt(long)]
        rate: Option<u32>,
    },
}

fn parse_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(h) => u32::from_str_radix(h, 16),
        None => s.parse(),
    }
}

fn parse_size(s: &str) -> Result<u32, String> {
    if let Ok(v) = parse_u32(s) {
        return Ok(v);
    }
    let v = bytefmt::parse(s).map_err(|e| e.to_string())?;
    if v > u32::MAX as u64 {
        return Err(format!("size {} out of range", s));
    }
    Ok(v as u32)
}

fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .progress_chars("=> "),
    );
    bar
}

fn main() {
    // Parse out arguments
    let o = Args::from_args();

    // Configure logger
    let _ = SimpleLogger::init(o.log_level, Config::default());

    if let Err(e) = execute(o) {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn execute(o: Args) -> anyhow::Result<()> {
    info!("Connecting to serial port");

    let mut c = Client::linux(&o.port, o.baud, o.options.clone())
        .map_err(|e| anyhow!("Error connecting to serial port: {:?}", e))?;

    match o.operation {
        Operation::Boot { image, rate } => {
            let image = fs::read(&image).with_context(|| format!("reading {:?}", image))?;

            info!("Booting monitor ({})", bytefmt::format(image.len() as u64));

            c.boot(&image, rate)
                .map_err(|e| anyhow!("Error booting target: {:?}", e))?;

            info!("Monitor running at {} baud", rate);
        }
        Operation::Baud { rate } => {
            c.attach();
            c.set_baudrate(rate)
                .map_err(|e| anyhow!("Error changing baud rate: {:?}", e))?;
        }
        Operation::Read { width, address } => {
            c.attach();
            let v = match width {
                8 => c.read_u8(address).map(|v| format!("0x{:02x}", v)),
                16 => c.read_u16(address).map(|v| format!("0x{:04x}", v)),
                32 => c.read_u32(address).map(|v| format!("0x{:08x}", v)),
                w => return Err(anyhow!("Invalid width: {}", w)),
            }
            .map_err(|e| anyhow!("Error reading memory: {:?}", e))?;

            println!("0x{:08x}: {}", address, v);
        }
        Operation::Write { width, address, value } => {
            c.attach();
            let r = match width {
                8 if value <= 0xFF => c.write_u8(address, value as u8),
                16 if value <= 0xFFFF => c.write_u16(address, value as u16),
                32 => c.write_u32(address, value),
                8 | 16 => return Err(anyhow!("Value 0x{:x} does not fit {} bits", value, width)),
                w => return Err(anyhow!("Invalid width: {}", w)),
            };
            r.map_err(|e| anyhow!("Error writing memory: {:?}", e))?;
        }
        Operation::Dump { address, length, output } => {
            c.attach();

            let mut data = vec![0u8; length as usize];
            let bar = progress_bar(data.len());
            c.mem_read(address, &mut data, |n| bar.set_position(n as u64))
                .map_err(|e| anyhow!("Error reading memory: {:?}", e))?;
            bar.finish();

            match output {
                Some(path) => fs::write(&path, &data).with_context(|| format!("writing {:?}", path))?,
                None => {
                    for (i, line) in data.chunks(16).enumerate() {
                        println!("{:08x}: {}", address as usize + i * 16, hex::encode(line));
                    }
                }
            }
        }
        Operation::Load { address, file, run } => {
            c.attach();

            let data = fs::read(&file).with_context(|| format!("reading {:?}", file))?;
            info!("Loading {} at 0x{:08x}", bytefmt::format(data.len() as u64), address);

            let bar = progress_bar(data.len());
            c.mem_write(address, &data, |n| bar.set_position(n as u64))
                .map_err(|e| anyhow!("Error writing memory: {:?}", e))?;
            bar.finish();

            if let Some(entry) = run {
                info!("Running from 0x{:08x}", entry);
                c.run(entry).map_err(|e| anyhow!("Error running: {:?}", e))?;
            }
        }
        Operation::Run { address } => {
            c.attach();
            c.run(address).map_err(|e| anyhow!("Error running: {:?}", e))?;
        }
        Operation::Kernel { file, load_address, exec_address, machine, rate } => {
            c.attach();

            let data = fs::read(&file).with_context(|| format!("reading {:?}", file))?;
            info!("Loading kernel ({}) at 0x{:08x}", bytefmt::format(data.len() as u64), load_address);

            let bar = progress_bar(data.len());
            c.mem_write(load_address, &data, |n| bar.set_position(n as u64))
                .map_err(|e| anyhow!("Error writing kernel: {:?}", e))?;
            bar.finish();

            if let Some(rate) = rate {
                c.set_baudrate(rate)
                    .map_err(|e| anyhow!("Error changing baud rate: {:?}", e))?;
            }

            let entry = exec_address.unwrap_or(load_address);
            info!("Booting kernel at 0x{:08x}, machine type {}", entry, machine);
            c.run_kernel(entry, machine)
                .map_err(|e| anyhow!("Error booting kernel: {:?}", e))?;
        }
    }

    Ok(())
}
