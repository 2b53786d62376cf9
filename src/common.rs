//! Console helpers shared by the reader program

use std::time::Instant;

use crate::sample::Axis;

/// Tracks elapsed time since creation
pub struct TimeKeeper {
    start: Instant,
}

impl TimeKeeper {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Average rate of `count` events since creation
    pub fn rate_hz(&self, count: u64) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

/// Horizontal bar for a signed value, centered on zero
///
/// `full_scale` is the magnitude that fills one half of the bar.
///
/// # Example
/// ```
/// use adxl345_acquisition::create_bar;
///
/// // +1.5g on a +/-2g scale, 40 characters wide
/// let bar = create_bar(1.5, 2.0, 40);
/// println!("[{}]", bar);
/// ```
pub fn create_bar(value: f32, full_scale: f32, width: usize) -> String {
    let normalized = (value / full_scale).clamp(-1.0, 1.0);
    let half = width / 2;
    let filled = ((normalized.abs() * half as f32) as usize).min(half);

    let (left, right) = if normalized < 0.0 {
        (
            format!("{}{}", " ".repeat(half - filled), "█".repeat(filled)),
            " ".repeat(half),
        )
    } else {
        (
            " ".repeat(half),
            format!("{}{}", "█".repeat(filled), " ".repeat(half - filled)),
        )
    };
    format!("{}|{}", left, right)
}

/// One line describing a completed read
///
/// Only the `count` bytes actually copied contribute to the value.
pub fn format_reading(axis: Axis, bytes: &[u8], count: usize) -> String {
    let mut raw = [0u8; 2];
    let count = count.min(raw.len()).min(bytes.len());
    raw[..count].copy_from_slice(&bytes[..count]);
    let value = i16::from_le_bytes(raw);
    format!(
        "{} byte(s) of sample read from {}-axis of the accelerometer is: {:04X}",
        count, axis, value as u16
    )
}
