//! Axis selection state and the control entry point

use parking_lot::Mutex;

use tracing::debug;

use crate::error::{AcquisitionError, Result};
use crate::sample::Axis;

/// Axis the next read extracts, guarded by its own lock
///
/// The lock is held only long enough to copy the value in or out, so readers
/// waiting for data never block a selection change.
#[derive(Debug, Default)]
pub struct AxisSelector {
    axis: Mutex<Axis>,
}

impl AxisSelector {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis: Mutex::new(axis),
        }
    }

    pub fn set_axis(&self, axis: Axis) {
        *self.axis.lock() = axis;
    }

    pub fn get_axis(&self) -> Axis {
        *self.axis.lock()
    }
}

/// Apply an axis-selection command (X=0, Y=1, Z=2)
///
/// Unrecognized codes fail with `UnsupportedCommand` and leave the current
/// selection untouched.
pub fn select_axis(selector: &AxisSelector, command: u32) -> Result<Axis> {
    let axis = Axis::from_code(command).ok_or(AcquisitionError::UnsupportedCommand(command))?;
    selector.set_axis(axis);
    debug!(%axis, "axis selected");
    Ok(axis)
}
