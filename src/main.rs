//! ADXL345 reader - blocking reads from a simulated watermark-driven sensor
//!
//! Attaches a simulated ADXL345, feeds its hardware FIFO with a vibration
//! waveform, selects an axis and performs blocking reads the way a program
//! reading the device file would.
//!
//! Usage:
//!   adxl345-reader --axis Z --bytes 2 --reads 10

use adxl345_acquisition::{
    create_bar, format_reading, raw_to_g, AcquisitionConfig, AcquisitionError, Axis, CancelToken,
    Device, Dispatcher, EventLine, InstanceIdAllocator, OutputRate, OverflowPolicy, Sample,
    SimulatedAdxl345, TimeKeeper, MAX_READ_BYTES,
};
use clap::{Parser, ValueEnum};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OverflowArg {
    /// Drop new samples when the queue is full
    Reject,
    /// Drop the oldest queued sample
    Overwrite,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(arg: OverflowArg) -> Self {
        match arg {
            OverflowArg::Reject => OverflowPolicy::Reject,
            OverflowArg::Overwrite => OverflowPolicy::OverwriteOldest,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "adxl345-reader")]
#[command(about = "Read one axis of an ADXL345 through the blocking read path", long_about = None)]
struct Args {
    /// Axis to read: X, Y or Z
    #[arg(short, long, default_value = "X")]
    axis: Axis,

    /// Bytes requested per read (values above 2 are truncated)
    #[arg(short, long, default_value = "2")]
    bytes: usize,

    /// Number of reads to perform
    #[arg(short = 'n', long, default_value = "1")]
    reads: u64,

    /// Simulated sensor sample rate in Hz (1-3200)
    #[arg(short, long, default_value = "100")]
    rate: u32,

    /// Software queue capacity in samples
    #[arg(long, default_value = "64")]
    capacity: usize,

    /// Full-queue policy
    #[arg(long, value_enum, default_value = "reject")]
    overflow: OverflowArg,

    /// Hardware FIFO watermark (1-31)
    #[arg(long, default_value = "20")]
    watermark: u8,

    /// Pause after each handled event, in milliseconds
    #[arg(long, default_value = "0")]
    holdoff_ms: u64,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.rate == 0 || args.rate > 3200 {
        eprintln!("Error: rate must be 1-3200 Hz");
        std::process::exit(1);
    }

    if args.bytes > MAX_READ_BYTES {
        println!(
            "[Warning] Maximum number of bytes from {}-axis is {} !!",
            args.axis, MAX_READ_BYTES
        );
    }

    let config = AcquisitionConfig::default()
        .with_queue_capacity(args.capacity)
        .with_overflow(args.overflow.into())
        .with_output_rate(OutputRate::at_least(args.rate))
        .with_watermark(args.watermark)
        .with_event_holdoff(Duration::from_millis(args.holdoff_ms));

    println!("ADXL345 Reader");
    println!("==============");
    println!("Axis: {}", args.axis);
    println!("Bytes per read: {}", args.bytes);
    println!("Reads: {}", args.reads);
    println!("Sensor rate: {} Hz (watermark {})", args.rate, args.watermark);
    println!();

    // Attach the sensor
    let ids = InstanceIdAllocator::new();
    let sensor = Arc::new(SimulatedAdxl345::new());
    let device = match Device::attach(sensor.clone(), &ids, &config) {
        Ok(device) => device,
        Err(AcquisitionError::InvalidParameter(msg)) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error attaching sensor: {}", e);
            return Err(Box::new(e));
        }
    };
    println!("Attached {}", device.name());

    let dispatcher = Dispatcher::spawn(device.name(), device.clone(), config.event_holdoff)?;

    // Ctrl+C cancels the pending read
    let running = Arc::new(AtomicBool::new(true));
    let cancel = CancelToken::new();
    {
        let running = running.clone();
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            println!("\nReceived Ctrl+C, stopping...");
            running.store(false, Ordering::SeqCst);
            cancel.cancel();
        })?;
    }

    let generator = spawn_generator(sensor.clone(), dispatcher.line(), args.rate, running.clone())?;

    device.control(args.axis.code())?;

    let timer = TimeKeeper::new();
    let mut buf = vec![0u8; args.bytes];
    let mut completed = 0u64;
    let mut result = Ok(());

    while completed < args.reads {
        match device.read_cancellable(&mut buf, &cancel) {
            Ok(count) => {
                completed += 1;
                let line = format_reading(args.axis, &buf, count);
                if count == MAX_READ_BYTES {
                    let g = raw_to_g(i16::from_le_bytes([buf[0], buf[1]]));
                    println!("{}  [{}] {:+.3}g", line, create_bar(g, 2.0, 30), g);
                } else {
                    println!("{}", line);
                }
            }
            Err(AcquisitionError::Interrupted) => {
                println!("Read interrupted");
                break;
            }
            Err(e) => {
                eprintln!("Error reading from device: {}", e);
                result = Err(e);
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    if generator.join().is_err() {
        eprintln!("Sample generator panicked");
    }
    dispatcher.shutdown();

    let stats = device.stats();
    device.detach()?;

    println!();
    println!(
        "Reads completed: {} ({:.1} reads/s)",
        completed,
        timer.rate_hz(completed)
    );
    println!(
        "Events: {} | Queued: {} | Dropped: {} | Bus faults: {}",
        stats.events, stats.samples_queued, stats.samples_dropped, stats.transport_faults
    );
    info!(device = %device.name(), ?stats, "reader finished");

    result.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}

/// Feed the simulated sensor at `rate_hz`, raising the event line at the watermark
fn spawn_generator(
    sensor: Arc<SimulatedAdxl345>,
    line: EventLine,
    rate_hz: u32,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sensor".to_string())
        .spawn(move || {
            let interval = Duration::from_micros(1_000_000 / rate_hz as u64);
            let mut next_sample_time = Instant::now();
            let mut tick = 0u64;

            while running.load(Ordering::SeqCst) {
                let sample = vibration_sample(tick, rate_hz);
                if sensor.push_sample(sample) {
                    debug!("hardware FIFO overrun");
                }
                if sensor.watermark_reached() && !line.raise() {
                    break;
                }
                tick += 1;

                next_sample_time += interval;
                let now = Instant::now();
                if next_sample_time > now {
                    thread::sleep(next_sample_time - now);
                }
            }
        })
}

/// 5 Hz vibration on X and Y over 1g of gravity on Z (raw LSB, 3.9 mg/LSB)
fn vibration_sample(tick: u64, rate_hz: u32) -> Sample {
    let t = tick as f32 / rate_hz as f32;
    let phase = TAU * 5.0 * t;
    Sample::new(
        (51.0 * phase.sin()) as i16,
        (26.0 * phase.cos()) as i16,
        256 + (8.0 * (3.0 * phase).sin()) as i16,
    )
}
