//! Simulated ADXL345 on a register bus
//!
//! Implements [`Transport`] against an in-memory register file and a 32-entry
//! hardware FIFO, so the acquisition core can run without a sensor attached.
//!
//! Bus behavior:
//! - a one-byte write sets the register pointer
//! - a two-byte write stores `value` into `reg`
//! - writing the six data addresses primes a data burst from DATAX0
//! - reading FIFO_STATUS reports the FIFO entry count
//! - reading from DATAX0 pops one FIFO entry per six bytes
//!
//! Faults injected with [`SimulatedAdxl345::inject_fault`] apply to the next
//! matching transfer only.

use std::collections::VecDeque;

use parking_lot::{Mutex, MutexGuard};

use crate::error::TransportError;
use crate::registers::*;
use crate::sample::Sample;
use crate::transport::Transport;

const REGISTER_COUNT: usize = 0x40;

/// One-shot failure for the next transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Next transfer (read or write) fails outright
    BusError,
    /// Next read returns one byte less than requested
    ShortRead,
    /// Next write accepts one byte less than requested
    ShortWrite,
}

struct SimState {
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    fifo: VecDeque<Sample>,
    overruns: u64,
    writes: Vec<Vec<u8>>,
    fault: Option<SimFault>,
}

impl SimState {
    fn take_fault(&mut self, wanted: SimFault) -> bool {
        if self.fault == Some(wanted) {
            self.fault = None;
            true
        } else {
            false
        }
    }
}

/// In-memory ADXL345
pub struct SimulatedAdxl345 {
    state: Mutex<SimState>,
}

impl Default for SimulatedAdxl345 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAdxl345 {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimState {
                registers: [0; REGISTER_COUNT],
                pointer: 0,
                fifo: VecDeque::with_capacity(HW_FIFO_DEPTH),
                overruns: 0,
                writes: Vec::new(),
                fault: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock()
    }

    /// Latch a new measurement into the hardware FIFO
    ///
    /// In stream mode a full FIFO discards its oldest entry; returns true when
    /// that happened.
    pub fn push_sample(&self, sample: Sample) -> bool {
        let mut state = self.lock();
        let overrun = state.fifo.len() == HW_FIFO_DEPTH;
        if overrun {
            state.fifo.pop_front();
            state.overruns += 1;
        }
        state.fifo.push_back(sample);
        overrun
    }

    /// Entries waiting in the hardware FIFO
    pub fn fifo_len(&self) -> usize {
        self.lock().fifo.len()
    }

    /// Entries lost to hardware FIFO overrun
    pub fn overruns(&self) -> u64 {
        self.lock().overruns
    }

    /// Current value of a register
    pub fn register(&self, reg: u8) -> u8 {
        self.lock().registers[reg as usize % REGISTER_COUNT]
    }

    pub fn is_measuring(&self) -> bool {
        self.register(REG_POWER_CTL) & POWER_MEASURE != 0
    }

    /// Watermark level programmed into FIFO_CTL
    pub fn watermark(&self) -> u8 {
        self.register(REG_FIFO_CTL) & FIFO_STATUS_ENTRIES_MASK
    }

    /// Whether the watermark interrupt line would be asserted
    pub fn watermark_reached(&self) -> bool {
        let state = self.lock();
        let enabled = state.registers[REG_INT_ENABLE as usize] & INT_WATERMARK != 0;
        let watermark =
            (state.registers[REG_FIFO_CTL as usize] & FIFO_STATUS_ENTRIES_MASK) as usize;
        enabled && watermark > 0 && state.fifo.len() >= watermark
    }

    /// Every write seen on the bus, oldest first
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Fail the next matching transfer
    pub fn inject_fault(&self, fault: SimFault) {
        self.lock().fault = Some(fault);
    }
}

impl Transport for SimulatedAdxl345 {
    fn write(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        if state.take_fault(SimFault::BusError) {
            return Err(TransportError::Bus("simulated bus error".to_string()));
        }
        if state.take_fault(SimFault::ShortWrite) {
            return Ok(bytes.len().saturating_sub(1));
        }

        state.writes.push(bytes.to_vec());
        match bytes {
            [] => return Ok(0),
            [reg] => state.pointer = *reg,
            [reg, value] => {
                state.registers[*reg as usize % REGISTER_COUNT] = *value;
                state.pointer = *reg;
            }
            burst if burst == DATA_REGISTERS => state.pointer = REG_DATAX0,
            [reg, ..] => state.pointer = *reg,
        }
        Ok(bytes.len())
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        if state.take_fault(SimFault::BusError) {
            return Err(TransportError::Bus("simulated bus error".to_string()));
        }
        let wanted = if state.take_fault(SimFault::ShortRead) {
            buf.len().saturating_sub(1)
        } else {
            buf.len()
        };

        let pointer = state.pointer;
        match pointer {
            REG_FIFO_STATUS => {
                let entries = state.fifo.len().min(HW_FIFO_DEPTH) as u8;
                buf[..wanted].fill(0);
                if let Some(first) = buf[..wanted].first_mut() {
                    *first = entries;
                }
                Ok(wanted)
            }
            REG_DATAX0 => {
                let mut filled = 0;
                while filled < wanted {
                    let Some(sample) = state.fifo.pop_front() else {
                        break;
                    };
                    let bytes = sample.to_bytes();
                    let n = bytes.len().min(wanted - filled);
                    buf[filled..filled + n].copy_from_slice(&bytes[..n]);
                    filled += n;
                }
                Ok(filled)
            }
            _ => {
                for (i, byte) in buf[..wanted].iter_mut().enumerate() {
                    *byte = state.registers[(pointer as usize + i) % REGISTER_COUNT];
                }
                Ok(wanted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RegisterAccess;

    #[test]
    fn test_register_round_trip() {
        let sim = SimulatedAdxl345::new();
        sim.write_register(REG_BW_RATE, 0x0A).unwrap();
        assert_eq!(sim.read_register(REG_BW_RATE).unwrap(), 0x0A);
        assert_eq!(sim.writes()[0], vec![REG_BW_RATE, 0x0A]);
    }

    #[test]
    fn test_fifo_status_and_burst() {
        let sim = SimulatedAdxl345::new();
        sim.push_sample(Sample::new(1, 2, 3));
        sim.push_sample(Sample::new(-1, -2, -3));
        assert_eq!(sim.read_register(REG_FIFO_STATUS).unwrap(), 2);

        sim.write_all(&DATA_REGISTERS).unwrap();
        let mut burst = [0u8; 12];
        sim.read_exact(&mut burst).unwrap();
        assert_eq!(&burst[..6], &Sample::new(1, 2, 3).to_bytes());
        assert_eq!(&burst[6..], &Sample::new(-1, -2, -3).to_bytes());
        assert_eq!(sim.fifo_len(), 0);
    }

    #[test]
    fn test_burst_past_fifo_is_short() {
        let sim = SimulatedAdxl345::new();
        sim.push_sample(Sample::new(1, 2, 3));
        sim.write_all(&DATA_REGISTERS).unwrap();
        let mut burst = [0u8; 12];
        assert_eq!(sim.read(&mut burst), Ok(6));
    }

    #[test]
    fn test_hardware_fifo_overrun_drops_oldest() {
        let sim = SimulatedAdxl345::new();
        for n in 0..=HW_FIFO_DEPTH as i16 {
            sim.push_sample(Sample::new(n, 0, 0));
        }
        assert_eq!(sim.fifo_len(), HW_FIFO_DEPTH);
        assert_eq!(sim.overruns(), 1);

        sim.write_all(&DATA_REGISTERS).unwrap();
        let mut burst = [0u8; 6];
        sim.read_exact(&mut burst).unwrap();
        assert_eq!(i16::from_le_bytes([burst[0], burst[1]]), 1);
    }

    #[test]
    fn test_watermark_requires_interrupt_enable() {
        let sim = SimulatedAdxl345::new();
        sim.write_register(REG_FIFO_CTL, FIFO_MODE_STREAM | 2).unwrap();
        sim.push_sample(Sample::default());
        sim.push_sample(Sample::default());
        assert_eq!(sim.watermark(), 2);
        assert!(!sim.watermark_reached());

        sim.write_register(REG_INT_ENABLE, INT_WATERMARK).unwrap();
        assert!(sim.watermark_reached());
    }

    #[test]
    fn test_faults_are_one_shot() {
        let sim = SimulatedAdxl345::new();
        sim.inject_fault(SimFault::ShortWrite);
        assert_eq!(sim.write(&[REG_POWER_CTL, POWER_MEASURE]), Ok(1));
        assert!(!sim.is_measuring());
        assert_eq!(sim.write(&[REG_POWER_CTL, POWER_MEASURE]), Ok(2));
        assert!(sim.is_measuring());

        sim.inject_fault(SimFault::BusError);
        assert!(matches!(sim.read(&mut [0u8; 1]), Err(TransportError::Bus(_))));
        assert!(sim.read(&mut [0u8; 1]).is_ok());

        sim.inject_fault(SimFault::ShortRead);
        assert_eq!(sim.read(&mut [0u8; 4]), Ok(3));
    }
}
