//! One attached ADXL345: FIFO draining, blocking reads and axis control
//!
//! The watermark event handler is the only producer. It reads FIFO_STATUS to
//! learn how many samples the sensor holds, pulls them in one burst, decodes
//! them and publishes them to the [`SampleQueue`]. Readers block on the queue
//! and each take exactly one sample, reporting the currently selected axis.
//!
//! The handler never takes the axis lock and never waits for readers; readers
//! never hold the axis lock while they wait.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::AcquisitionConfig;
use crate::control::{select_axis, AxisSelector};
use crate::dispatch::EventHandler;
use crate::error::{AcquisitionError, Result};
use crate::ids::{device_name, InstanceIdAllocator};
use crate::queue::{CancelToken, SampleQueue};
use crate::registers::*;
use crate::sample::{decode_burst, Axis};
use crate::transport::{RegisterAccess, Transport};

/// Largest read that returns data; longer reads are truncated to this
pub const MAX_READ_BYTES: usize = 2;

/// Outcome of draining the hardware FIFO once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// Samples the sensor reported ready
    pub reported: usize,
    /// Samples added to the queue
    pub queued: usize,
    /// Samples lost to queue overflow
    pub dropped: usize,
}

/// Diagnostic counters for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStats {
    /// Watermark events handled
    pub events: u64,
    /// Samples published to the queue
    pub samples_queued: u64,
    /// Samples dropped because the queue was full
    pub samples_dropped: u64,
    /// Drains aborted by a bus failure
    pub transport_faults: u64,
    /// Bursts discarded as malformed
    pub protocol_faults: u64,
}

#[derive(Default)]
struct Counters {
    events: AtomicU64,
    samples_queued: AtomicU64,
    samples_dropped: AtomicU64,
    transport_faults: AtomicU64,
    protocol_faults: AtomicU64,
}

/// An attached accelerometer
pub struct Device {
    id: u32,
    name: String,
    transport: Arc<dyn Transport>,
    queue: SampleQueue,
    axis: AxisSelector,
    counters: Counters,
    removed: AtomicBool,
}

impl Device {
    /// Configure the sensor and create its per-device state
    ///
    /// The sensor is put in measurement mode with the watermark interrupt
    /// enabled and its FIFO in stream mode. On any failure nothing is kept:
    /// the queue arena is released, no instance id is consumed, and the
    /// sensor is returned to standby on a best-effort basis.
    pub fn attach(
        transport: Arc<dyn Transport>,
        ids: &InstanceIdAllocator,
        config: &AcquisitionConfig,
    ) -> Result<Arc<Device>> {
        config.validate()?;

        let queue = SampleQueue::new(config.queue_capacity, config.overflow)?;

        if let Err(e) = configure_sensor(transport.as_ref(), config) {
            error!(error = %e, "failed to configure ADXL345");
            if let Err(standby) = transport.write_register(REG_POWER_CTL, POWER_STANDBY) {
                debug!(error = %standby, "standby after failed attach also failed");
            }
            return Err(e.into());
        }

        let id = ids.allocate();
        let device = Device {
            id,
            name: device_name(id),
            transport,
            queue,
            axis: AxisSelector::default(),
            counters: Counters::default(),
            removed: AtomicBool::new(false),
        };

        info!(
            device = %device.name,
            capacity = config.queue_capacity,
            rate_hz = config.output_rate.hz(),
            watermark = config.watermark,
            "device attached"
        );
        Ok(Arc::new(device))
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Unique name the device is exposed under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Samples waiting to be read
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            events: self.counters.events.load(Ordering::Relaxed),
            samples_queued: self.counters.samples_queued.load(Ordering::Relaxed),
            samples_dropped: self.counters.samples_dropped.load(Ordering::Relaxed),
            transport_faults: self.counters.transport_faults.load(Ordering::Relaxed),
            protocol_faults: self.counters.protocol_faults.load(Ordering::Relaxed),
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis.get_axis()
    }

    pub fn set_axis(&self, axis: Axis) {
        self.axis.set_axis(axis);
    }

    /// Control entry point: select the axis by command code (X=0, Y=1, Z=2)
    pub fn control(&self, command: u32) -> Result<()> {
        select_axis(&self.axis, command).map(|_| ())
    }

    /// Read one sample's value for the selected axis
    ///
    /// Blocks until a sample is available. Copies at most two bytes
    /// (little-endian) into `buf` and returns how many were copied; a
    /// one-byte buffer receives the low byte. A zero-length buffer still
    /// consumes a sample.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_sample(buf, None)
    }

    /// Like [`read`](Self::read), but gives up with `Interrupted` when
    /// `cancel` fires before data arrives
    pub fn read_cancellable(&self, buf: &mut [u8], cancel: &CancelToken) -> Result<usize> {
        self.read_sample(buf, Some(cancel))
    }

    fn read_sample(&self, buf: &mut [u8], cancel: Option<&CancelToken>) -> Result<usize> {
        if self.is_removed() {
            return Err(AcquisitionError::DeviceRemoved);
        }

        let axis = self.axis.get_axis();
        let sample = self.queue.pop_wait(cancel)?;

        let bytes = sample.axis(axis).to_le_bytes();
        let count = buf.len().min(MAX_READ_BYTES);
        buf[..count].copy_from_slice(&bytes[..count]);
        Ok(count)
    }

    /// Drain the sensor's FIFO into the sample queue
    ///
    /// This is the body of the watermark handler. Transport failures abort
    /// this drain only; samples already queued are untouched.
    pub fn drain_fifo(&self) -> Result<DrainReport> {
        let result = self.drain_once();
        match &result {
            Ok(report) => {
                self.counters
                    .samples_queued
                    .fetch_add(report.queued as u64, Ordering::Relaxed);
                self.counters
                    .samples_dropped
                    .fetch_add(report.dropped as u64, Ordering::Relaxed);
            }
            Err(AcquisitionError::Transport(_)) => {
                self.counters.transport_faults.fetch_add(1, Ordering::Relaxed);
            }
            Err(AcquisitionError::Protocol { .. }) => {
                self.counters.protocol_faults.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }
        result
    }

    /// One status read and one burst
    ///
    /// The entry count is taken from the low five bits of FIFO_STATUS. A full
    /// FIFO reports 32, which sets bit 5 and clears those bits; in that case
    /// 31 entries are drained so the FIFO keeps moving, and the remainder is
    /// picked up by the next event.
    fn drain_once(&self) -> Result<DrainReport> {
        if self.is_removed() {
            return Err(AcquisitionError::DeviceRemoved);
        }

        let status = self.transport.read_register(REG_FIFO_STATUS)?;
        let reported = if status & FIFO_STATUS_FULL != 0 {
            FIFO_STATUS_ENTRIES_MASK as usize
        } else {
            (status & FIFO_STATUS_ENTRIES_MASK) as usize
        };
        if reported == 0 {
            return Ok(DrainReport::default());
        }

        self.transport.write_all(&DATA_REGISTERS)?;
        let mut burst = vec![0u8; reported * SAMPLE_BYTES];
        self.transport.read_exact(&mut burst)?;

        let samples = decode_burst(&burst)?;
        let summary = self.queue.push_batch(samples);

        Ok(DrainReport {
            reported,
            queued: summary.accepted,
            dropped: summary.dropped,
        })
    }

    /// Tear the device down
    ///
    /// Blocked and future reads fail with `DeviceRemoved` and the queue stops
    /// accepting samples. The sensor is then put in standby; if that write
    /// fails the error is returned but the teardown stands. Calling this
    /// again is a no-op.
    pub fn detach(&self) -> Result<()> {
        if self.removed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.queue.close();
        let standby = self.transport.write_register(REG_POWER_CTL, POWER_STANDBY);

        match standby {
            Ok(()) => {
                info!(device = %self.name, "device detached");
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.name, error = %e, "failed to switch to standby");
                Err(e.into())
            }
        }
    }
}

impl EventHandler for Device {
    fn handle_event(&self) {
        self.counters.events.fetch_add(1, Ordering::Relaxed);

        match self.drain_fifo() {
            Ok(report) => {
                debug!(
                    device = %self.name,
                    reported = report.reported,
                    queued = report.queued,
                    "drained FIFO"
                );
                if report.dropped > 0 {
                    warn!(
                        device = %self.name,
                        dropped = report.dropped,
                        total_dropped = self.queue.dropped(),
                        "sample queue full, samples dropped"
                    );
                }
            }
            Err(AcquisitionError::DeviceRemoved) => {
                debug!(device = %self.name, "event after removal ignored");
            }
            Err(e) => {
                error!(device = %self.name, error = %e, "FIFO drain failed");
            }
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("axis", &self.axis())
            .field("queued", &self.queued())
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// Probe-time register sequence
fn configure_sensor(
    transport: &dyn Transport,
    config: &AcquisitionConfig,
) -> std::result::Result<(), crate::error::TransportError> {
    transport.write_register(REG_BW_RATE, config.output_rate.register_value())?;
    transport.write_register(REG_INT_ENABLE, INT_ALL_DISABLED)?;
    transport.write_register(REG_DATA_FORMAT, DATA_FORMAT_DEFAULT)?;
    transport.write_register(REG_FIFO_CTL, FIFO_MODE_BYPASS)?;
    transport.write_register(REG_POWER_CTL, POWER_MEASURE)?;

    // Watermark interrupt, FIFO in stream mode
    transport.write_register(REG_INT_ENABLE, INT_WATERMARK)?;
    transport.write_register(REG_FIFO_CTL, FIFO_MODE_STREAM | config.watermark)?;
    Ok(())
}
