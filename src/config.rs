//! Per-device acquisition settings

use std::time::Duration;

use crate::error::{AcquisitionError, Result};
use crate::registers::HW_FIFO_DEPTH;

/// What a full sample queue does with a new sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Keep what is queued and drop the new sample
    #[default]
    Reject,
    /// Discard the oldest queued sample to make room
    OverwriteOldest,
}

/// ADXL345 output data rates (BW_RATE codes, normal power)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputRate {
    Hz25,
    Hz50,
    #[default]
    Hz100,
    Hz200,
    Hz400,
    Hz800,
    Hz1600,
    Hz3200,
}

impl OutputRate {
    const ALL: [OutputRate; 8] = [
        OutputRate::Hz25,
        OutputRate::Hz50,
        OutputRate::Hz100,
        OutputRate::Hz200,
        OutputRate::Hz400,
        OutputRate::Hz800,
        OutputRate::Hz1600,
        OutputRate::Hz3200,
    ];

    /// Slowest rate that is at least `hz` (3200 Hz if none is)
    pub fn at_least(hz: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|rate| rate.hz() >= hz)
            .unwrap_or(OutputRate::Hz3200)
    }

    /// Value written to BW_RATE
    pub fn register_value(self) -> u8 {
        match self {
            OutputRate::Hz25 => 0x08,
            OutputRate::Hz50 => 0x09,
            OutputRate::Hz100 => 0x0A,
            OutputRate::Hz200 => 0x0B,
            OutputRate::Hz400 => 0x0C,
            OutputRate::Hz800 => 0x0D,
            OutputRate::Hz1600 => 0x0E,
            OutputRate::Hz3200 => 0x0F,
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            OutputRate::Hz25 => 25,
            OutputRate::Hz50 => 50,
            OutputRate::Hz100 => 100,
            OutputRate::Hz200 => 200,
            OutputRate::Hz400 => 400,
            OutputRate::Hz800 => 800,
            OutputRate::Hz1600 => 1600,
            OutputRate::Hz3200 => 3200,
        }
    }
}

/// Settings applied when a device is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Slots in the software sample queue
    pub queue_capacity: usize,
    /// Full-queue behavior
    pub overflow: OverflowPolicy,
    /// Sensor output data rate
    pub output_rate: OutputRate,
    /// Hardware FIFO entries that raise the watermark interrupt (1-31)
    pub watermark: u8,
    /// Pause after each handled event before the next is dispatched
    pub event_holdoff: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            overflow: OverflowPolicy::Reject,
            output_rate: OutputRate::Hz100,
            watermark: 20,
            event_holdoff: Duration::ZERO,
        }
    }
}

impl AcquisitionConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_output_rate(mut self, rate: OutputRate) -> Self {
        self.output_rate = rate;
        self
    }

    pub fn with_watermark(mut self, watermark: u8) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn with_event_holdoff(mut self, holdoff: Duration) -> Self {
        self.event_holdoff = holdoff;
        self
    }

    /// Check the settings before anything is written to the sensor
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(AcquisitionError::InvalidParameter(
                "Queue capacity must be at least 1".to_string(),
            ));
        }

        if self.watermark == 0 || self.watermark as usize >= HW_FIFO_DEPTH {
            return Err(AcquisitionError::InvalidParameter(format!(
                "Watermark must be 1-{}, got {}",
                HW_FIFO_DEPTH - 1,
                self.watermark
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_driver() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.overflow, OverflowPolicy::Reject);
        assert_eq!(config.output_rate.register_value(), 0x0A);
        assert_eq!(config.watermark, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_capacity = AcquisitionConfig::default().with_queue_capacity(0);
        assert!(matches!(
            zero_capacity.validate(),
            Err(AcquisitionError::InvalidParameter(_))
        ));

        for watermark in [0, 32, 200] {
            let config = AcquisitionConfig::default().with_watermark(watermark);
            assert!(config.validate().is_err(), "watermark {}", watermark);
        }
        assert!(AcquisitionConfig::default().with_watermark(31).validate().is_ok());
    }

    #[test]
    fn test_output_rate_codes_ascend() {
        for pair in OutputRate::ALL.windows(2) {
            assert_eq!(pair[0].register_value() + 1, pair[1].register_value());
            assert_eq!(pair[0].hz() * 2, pair[1].hz());
        }
    }

    #[test]
    fn test_output_rate_at_least() {
        assert_eq!(OutputRate::at_least(1), OutputRate::Hz25);
        assert_eq!(OutputRate::at_least(100), OutputRate::Hz100);
        assert_eq!(OutputRate::at_least(101), OutputRate::Hz200);
        assert_eq!(OutputRate::at_least(10_000), OutputRate::Hz3200);
    }
}
