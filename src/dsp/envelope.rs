//! Per-voice envelope generator.
//!
//! Each voice runs either the four-phase ADSR state machine or one of the
//! five GAIN modes, selected by ADSR1 bit 7. The envelope level is an
//! 11-bit value (0-0x7FF) stepped once per output frame; step pacing comes
//! from the shared 32-entry rate-period table, one divider per envelope.
//!
//! Key-off forces the Release phase from any state. GAIN phases are
//! re-derived from the register on every step, so register edits take
//! effect immediately without a re-key.

use super::tables::RATE_PERIODS;

/// Maximum (and attack-target) envelope level.
pub const ENVELOPE_MAX: u16 = 0x7FF;

/// Envelope state: the four ADSR phases plus the five GAIN variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopePhase {
    /// ADSR: level rises toward 0x7FF
    Attack,
    /// ADSR: exponential fall toward the sustain boundary
    Decay,
    /// ADSR: exponential fall at the sustain rate (rate 0 holds)
    Sustain,
    /// Key-off: linear fall by 8 per frame until silent
    #[default]
    Release,
    /// GAIN bit7=0: level follows the 7-bit GAIN value directly
    GainDirect,
    /// GAIN mode 00: linear decrease by 32
    GainLinearDec,
    /// GAIN mode 01: exponential decrease (decay-style shift)
    GainExpDec,
    /// GAIN mode 10: linear increase by 32
    GainLinearInc,
    /// GAIN mode 11: bent increase, +32 below 0x600 then +8
    GainBentInc,
}

/// Raw envelope control registers for one voice (ADSR1, ADSR2, GAIN).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeSettings {
    /// ADSR1: bit 7 enables ADSR, bits 6-4 decay rate, bits 3-0 attack rate
    pub adsr1: u8,
    /// ADSR2: bits 7-5 sustain level, bits 4-0 sustain rate
    pub adsr2: u8,
    /// GAIN: bit 7 selects slope modes (bits 6-5 mode, 4-0 rate) or direct level
    pub gain: u8,
}

impl EnvelopeSettings {
    /// ADSR mode selected (GAIN otherwise).
    #[inline]
    pub fn adsr_enabled(&self) -> bool {
        self.adsr1 & 0x80 != 0
    }

    /// Attack rate field, 0-15.
    #[inline]
    fn attack_rate(&self) -> usize {
        (self.adsr1 & 0x0F) as usize
    }

    /// Decay rate field, 0-7.
    #[inline]
    fn decay_rate(&self) -> usize {
        ((self.adsr1 >> 4) & 0x07) as usize
    }

    /// Sustain boundary: decay ends at `(SL + 1) * 256`.
    #[inline]
    fn sustain_boundary(&self) -> u16 {
        (((self.adsr2 >> 5) as u16) + 1) << 8
    }

    /// Sustain rate field, 0-31 (0 = hold).
    #[inline]
    fn sustain_rate(&self) -> usize {
        (self.adsr2 & 0x1F) as usize
    }

    /// The GAIN phase currently selected by the register.
    fn gain_phase(&self) -> EnvelopePhase {
        if self.gain & 0x80 == 0 {
            EnvelopePhase::GainDirect
        } else {
            match (self.gain >> 5) & 0x03 {
                0 => EnvelopePhase::GainLinearDec,
                1 => EnvelopePhase::GainExpDec,
                2 => EnvelopePhase::GainLinearInc,
                _ => EnvelopePhase::GainBentInc,
            }
        }
    }

    /// GAIN slope rate field, 0-31.
    #[inline]
    fn gain_rate(&self) -> usize {
        (self.gain & 0x1F) as usize
    }
}

/// One voice's envelope state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    /// Current level, 0-0x7FF
    pub level: u16,
    /// Current phase
    pub phase: EnvelopePhase,
    /// Frame divider for the rate-period table
    divider: u16,
}

impl Envelope {
    /// Start the envelope for a freshly keyed voice.
    pub fn key_on(&mut self, settings: EnvelopeSettings) {
        self.level = 0;
        self.divider = 0;
        self.phase = if settings.adsr_enabled() {
            EnvelopePhase::Attack
        } else {
            settings.gain_phase()
        };
    }

    /// Force Release from any phase.
    pub fn key_off(&mut self) {
        self.phase = EnvelopePhase::Release;
        self.divider = 0;
    }

    /// True once Release has drained the level to zero.
    #[inline]
    pub fn is_released_silent(&self) -> bool {
        self.phase == EnvelopePhase::Release && self.level == 0
    }

    /// Advance the rate divider; true when an event fires this frame.
    #[inline]
    fn fires(&mut self, rate: usize) -> bool {
        let period = RATE_PERIODS[rate];
        if period == 0 {
            return false;
        }
        self.divider += 1;
        if self.divider >= period {
            self.divider = 0;
            true
        } else {
            false
        }
    }

    /// The shared exponential decrement: `level -= ((level - 1) >> 8) + 1`.
    #[inline]
    fn exp_decrement(level: u16) -> u16 {
        level.saturating_sub(((level.wrapping_sub(1)) >> 8) + 1)
    }

    /// Advance one output frame.
    pub fn step(&mut self, settings: EnvelopeSettings) {
        match self.phase {
            EnvelopePhase::Release => {
                self.level = self.level.saturating_sub(8);
            }
            _ if !settings.adsr_enabled() => {
                // GAIN phases follow the register, not stored state
                self.phase = settings.gain_phase();
                match self.phase {
                    EnvelopePhase::GainDirect => {
                        self.level = ((settings.gain & 0x7F) as u16) << 4;
                    }
                    EnvelopePhase::GainLinearDec => {
                        if self.fires(settings.gain_rate()) {
                            self.level = self.level.saturating_sub(32);
                        }
                    }
                    EnvelopePhase::GainExpDec => {
                        if self.fires(settings.gain_rate()) {
                            self.level = Self::exp_decrement(self.level);
                        }
                    }
                    EnvelopePhase::GainLinearInc => {
                        if self.fires(settings.gain_rate()) {
                            self.level = (self.level + 32).min(ENVELOPE_MAX);
                        }
                    }
                    EnvelopePhase::GainBentInc => {
                        if self.fires(settings.gain_rate()) {
                            let step = if self.level < 0x600 { 32 } else { 8 };
                            self.level = (self.level + step).min(ENVELOPE_MAX);
                        }
                    }
                    _ => unreachable!("gain_phase yields GAIN variants only"),
                }
            }
            EnvelopePhase::Attack => {
                let rate = settings.attack_rate();
                if rate == 15 {
                    // Fastest attack bypasses the divider entirely
                    self.level = (self.level + 1024).min(ENVELOPE_MAX);
                } else if self.fires(rate * 2 + 1) {
                    self.level = (self.level + 32).min(ENVELOPE_MAX);
                }
                if self.level >= ENVELOPE_MAX {
                    self.level = ENVELOPE_MAX;
                    self.phase = EnvelopePhase::Decay;
                    self.divider = 0;
                }
            }
            EnvelopePhase::Decay => {
                if self.fires(settings.decay_rate() * 2 + 16) {
                    self.level = Self::exp_decrement(self.level);
                }
                if self.level <= settings.sustain_boundary() {
                    self.phase = EnvelopePhase::Sustain;
                    self.divider = 0;
                }
            }
            EnvelopePhase::Sustain => {
                if self.fires(settings.sustain_rate()) {
                    self.level = Self::exp_decrement(self.level);
                }
            }
            _ => {
                // ADSR enabled while a GAIN phase was stored: rejoin the
                // ADSR ladder at the current level
                self.phase = EnvelopePhase::Decay;
                self.divider = 0;
            }
        }
    }
}
