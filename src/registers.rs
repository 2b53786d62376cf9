//! ADXL345 register map (the subset the acquisition core touches)

// Configuration registers
pub const REG_BW_RATE: u8 = 0x2C;       // Output data rate
pub const REG_POWER_CTL: u8 = 0x2D;     // Measure/standby
pub const REG_INT_ENABLE: u8 = 0x2E;    // Interrupt enable
pub const REG_DATA_FORMAT: u8 = 0x31;   // Range and resolution
pub const REG_FIFO_CTL: u8 = 0x38;      // FIFO mode and watermark
pub const REG_FIFO_STATUS: u8 = 0x39;   // FIFO entry count

// Data registers, little-endian per axis
pub const REG_DATAX0: u8 = 0x32;
pub const REG_DATAX1: u8 = 0x33;
pub const REG_DATAY0: u8 = 0x34;
pub const REG_DATAY1: u8 = 0x35;
pub const REG_DATAZ0: u8 = 0x36;
pub const REG_DATAZ1: u8 = 0x37;

/// Address sequence written to prime a data burst
pub const DATA_REGISTERS: [u8; 6] = [
    REG_DATAX0, REG_DATAX1, REG_DATAY0, REG_DATAY1, REG_DATAZ0, REG_DATAZ1,
];

// Register values
pub const INT_ALL_DISABLED: u8 = 0x00;
pub const INT_WATERMARK: u8 = 0x02;
pub const DATA_FORMAT_DEFAULT: u8 = 0x00;   // +/-2g, 10-bit, right-justified
pub const FIFO_MODE_BYPASS: u8 = 0x00;
pub const FIFO_MODE_STREAM: u8 = 0x80;
pub const POWER_MEASURE: u8 = 0x08;
pub const POWER_STANDBY: u8 = 0x00;

/// Bits 0-5 of FIFO_STATUS hold the entry count; the driver keeps the low five
pub const FIFO_STATUS_ENTRIES_MASK: u8 = 0x1F;
pub const FIFO_STATUS_FULL: u8 = 0x20;         // Entry count reached 32

/// Depth of the on-chip FIFO
pub const HW_FIFO_DEPTH: usize = 32;

/// Bytes per sample in a data burst (X, Y, Z as little-endian i16)
pub const SAMPLE_BYTES: usize = 6;
