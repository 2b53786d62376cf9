//! Interrupt-driven acquisition core for the ADXL345 accelerometer
//!
//! The sensor buffers measurements in its own FIFO and raises a watermark
//! event when enough have accumulated. The event handler drains that FIFO
//! over a byte-oriented register bus, decodes the burst into samples and
//! queues them; readers block until a sample is available and receive the
//! value of the currently selected axis.
//!
//! # Quick Start
//!
//! ## Attach and Read
//! ```no_run
//! use adxl345_acquisition::{AcquisitionConfig, Device, InstanceIdAllocator, SimulatedAdxl345};
//! use std::sync::Arc;
//!
//! let ids = InstanceIdAllocator::new();
//! let sensor = Arc::new(SimulatedAdxl345::new());
//! let device = Device::attach(sensor, &ids, &AcquisitionConfig::default())?;
//!
//! // Select the Z axis (X=0, Y=1, Z=2) and read one value
//! device.control(2)?;
//! let mut buf = [0u8; 2];
//! let n = device.read(&mut buf)?;
//! println!("{} byte(s): {:04X}", n, i16::from_le_bytes(buf));
//! # Ok::<(), adxl345_acquisition::AcquisitionError>(())
//! ```
//!
//! ## Dispatching Watermark Events
//! ```no_run
//! use adxl345_acquisition::{
//!     AcquisitionConfig, Device, Dispatcher, InstanceIdAllocator, Sample, SimulatedAdxl345,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let ids = InstanceIdAllocator::new();
//! let sensor = Arc::new(SimulatedAdxl345::new());
//! let device = Device::attach(sensor.clone(), &ids, &AcquisitionConfig::default())?;
//! let dispatcher = Dispatcher::spawn(device.name(), device.clone(), Duration::ZERO)?;
//!
//! // The hardware side: latch samples, raise the line at the watermark
//! for n in 0..20 {
//!     sensor.push_sample(Sample::new(n, 0, 256));
//! }
//! if sensor.watermark_reached() {
//!     dispatcher.raise();
//! }
//!
//! let mut buf = [0u8; 2];
//! device.read(&mut buf)?;
//! dispatcher.shutdown();
//! device.detach()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod common;
pub mod config;
pub mod control;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod queue;
pub mod registers;
pub mod sample;
pub mod sim;
pub mod transport;

// Re-export public API
pub use common::{create_bar, format_reading, TimeKeeper};
pub use config::{AcquisitionConfig, OutputRate, OverflowPolicy};
pub use control::{select_axis, AxisSelector};
pub use device::{Device, DeviceStats, DrainReport, MAX_READ_BYTES};
pub use dispatch::{Dispatcher, EventHandler, EventLine};
pub use error::{AcquisitionError, Result, TransportError};
pub use ids::{device_name, InstanceIdAllocator};
pub use queue::{CancelToken, PushSummary, SampleQueue};
pub use sample::{decode_burst, raw_to_g, Axis, Sample};
pub use sim::{SimFault, SimulatedAdxl345};
pub use transport::{RegisterAccess, Transport};
