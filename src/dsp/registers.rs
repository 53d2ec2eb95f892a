//! DSP register address map.
//!
//! The 128-byte register bank is a wire-level contract: 16 global
//! registers spread over the 0x?C/0x?D/0x?F columns plus eight 16-byte
//! per-voice blocks in the 0x?0-0x?9 columns.
//!
//! | Address | Register | Description |
//! |---------|----------|-------------|
//! | V0+0x00 | VOLL     | Voice left volume (signed) |
//! | V0+0x01 | VOLR     | Voice right volume (signed) |
//! | V0+0x02 | PITCHL   | Pitch low byte |
//! | V0+0x03 | PITCHH   | Pitch high bits (14-bit total) |
//! | V0+0x04 | SRCN     | Sample source index |
//! | V0+0x05 | ADSR1    | Envelope control 1 |
//! | V0+0x06 | ADSR2    | Envelope control 2 |
//! | V0+0x07 | GAIN     | Gain envelope control |
//! | V0+0x08 | ENVX     | Current envelope level (read-only mirror) |
//! | V0+0x09 | OUTX     | Current output sample (read-only mirror) |
//! | 0x0C    | MVOLL    | Main volume left (signed) |
//! | 0x1C    | MVOLR    | Main volume right (signed) |
//! | 0x2C    | EVOLL    | Echo volume left (signed) |
//! | 0x3C    | EVOLR    | Echo volume right (signed) |
//! | 0x4C    | KON      | Key-on bitmask (edge-triggered, self-clearing) |
//! | 0x5C    | KOF      | Key-off bitmask (edge-triggered, self-clearing) |
//! | 0x6C    | FLG      | Reset / mute / echo-write-protect / noise clock |
//! | 0x7C    | ENDX     | End-flag bitmask (write clears, read never does) |
//! | 0x0D    | EFB      | Echo feedback (signed) |
//! | 0x2D    | PMON     | Pitch modulation enable bitmask |
//! | 0x3D    | NON      | Noise enable bitmask |
//! | 0x4D    | EON      | Echo enable bitmask |
//! | 0x5D    | DIR      | Sample directory page |
//! | 0x6D    | ESA      | Echo buffer start page |
//! | 0x7D    | EDL      | Echo delay, low 4 bits |
//! | V0+0x0F | C0-C7    | Echo FIR coefficients (signed) |

use bitflags::bitflags;

/// Number of DSP registers.
pub const REGISTER_COUNT: usize = 128;

/// Number of voices.
pub const VOICE_COUNT: usize = 8;

/// Main volume left.
pub const MVOLL: u8 = 0x0C;
/// Main volume right.
pub const MVOLR: u8 = 0x1C;
/// Echo volume left.
pub const EVOLL: u8 = 0x2C;
/// Echo volume right.
pub const EVOLR: u8 = 0x3C;
/// Key-on bitmask.
pub const KON: u8 = 0x4C;
/// Key-off bitmask.
pub const KOF: u8 = 0x5C;
/// Flags register (reset, mute, echo write-protect, noise clock).
pub const FLG: u8 = 0x6C;
/// BRR end-block bitmask.
pub const ENDX: u8 = 0x7C;
/// Echo feedback.
pub const EFB: u8 = 0x0D;
/// Pitch modulation enable bitmask.
pub const PMON: u8 = 0x2D;
/// Noise enable bitmask.
pub const NON: u8 = 0x3D;
/// Echo enable bitmask.
pub const EON: u8 = 0x4D;
/// Sample directory page.
pub const DIR: u8 = 0x5D;
/// Echo buffer start page.
pub const ESA: u8 = 0x6D;
/// Echo delay.
pub const EDL: u8 = 0x7D;

/// Per-voice register column offsets within a voice's 16-byte block.
pub mod voice_reg {
    /// Left volume (signed)
    pub const VOLL: u8 = 0x00;
    /// Right volume (signed)
    pub const VOLR: u8 = 0x01;
    /// Pitch low byte
    pub const PITCHL: u8 = 0x02;
    /// Pitch high bits
    pub const PITCHH: u8 = 0x03;
    /// Sample source index
    pub const SRCN: u8 = 0x04;
    /// Envelope control 1
    pub const ADSR1: u8 = 0x05;
    /// Envelope control 2
    pub const ADSR2: u8 = 0x06;
    /// Gain envelope control
    pub const GAIN: u8 = 0x07;
    /// Envelope level mirror (read-only)
    pub const ENVX: u8 = 0x08;
    /// Output sample mirror (read-only)
    pub const OUTX: u8 = 0x09;
    /// Echo FIR coefficient for this voice index
    pub const FIR: u8 = 0x0F;
}

/// Register address for voice `v`, column `reg`.
#[inline]
pub fn voice_addr(v: usize, reg: u8) -> u8 {
    ((v as u8) << 4) | reg
}

bitflags! {
    /// FLG register (0x6C) bits.
    ///
    /// Bits 0-4 hold the noise clock rate and are not individual flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DspFlags: u8 {
        /// Soft reset: silence every voice and mute output
        const RESET = 0x80;
        /// Mute all output
        const MUTE = 0x40;
        /// Echo write-protect: blocks echo buffer writes only;
        /// the echo read/FIR/output path still runs
        const ECHO_WRITE_DISABLE = 0x20;
    }
}

impl DspFlags {
    /// Noise clock rate field (bits 0-4) of a raw FLG value.
    #[inline]
    pub fn noise_rate(raw: u8) -> usize {
        (raw & 0x1F) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_addr_layout() {
        assert_eq!(voice_addr(0, voice_reg::VOLL), 0x00);
        assert_eq!(voice_addr(3, voice_reg::GAIN), 0x37);
        assert_eq!(voice_addr(7, voice_reg::OUTX), 0x79);
        assert_eq!(voice_addr(7, voice_reg::FIR), 0x7F);
    }

    #[test]
    fn test_flags_decode() {
        let flags = DspFlags::from_bits_truncate(0xE0);
        assert!(flags.contains(DspFlags::RESET));
        assert!(flags.contains(DspFlags::MUTE));
        assert!(flags.contains(DspFlags::ECHO_WRITE_DISABLE));
        assert_eq!(DspFlags::noise_rate(0xE5), 5);
    }
}
