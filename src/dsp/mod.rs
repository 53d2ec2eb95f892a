//! S-DSP synthesis engine.
//!
//! Owns the 128-byte register bank and 8 voices; reads sample data and the
//! echo ring from ARAM (borrowed per call, never owned). Produces one
//! interleaved stereo pair per frame at the native 32 kHz rate.
//!
//! Per frame, in order:
//! 1. Advance the 15-bit noise LFSR when its rate divider fires.
//! 2. Render voices 0..7: BRR + Gaussian interpolation (or noise),
//!    envelope scale, signed stereo volume, accumulate into the mix and
//!    the echo input; pitch modulation chains each voice to its
//!    predecessor's output.
//! 3. Run the echo FIR over the ARAM ring and combine with feedback.
//! 4. Apply main/echo volumes, clamp, normalize to f32.
//!
//! Per-voice user mute/solo/volume are monitoring gates layered over the
//! register state: they scale mix contributions only and never touch
//! registers, envelopes or BRR cursors.

pub mod echo;
pub mod envelope;
pub mod registers;
pub mod tables;
pub mod voice;

use echo::EchoUnit;
use envelope::EnvelopeSettings;
use registers::{voice_addr, voice_reg, DspFlags};
pub use registers::{REGISTER_COUNT, VOICE_COUNT};
use voice::{Voice, PITCH_MAX};

/// ARAM size shared with the CPU side.
pub const ARAM_SIZE: usize = 0x10000;

/// Native DSP output rate in Hz.
pub const NATIVE_SAMPLE_RATE: u32 = 32_000;

/// Power-on value of the FLG register (reset + mute + echo write-protect).
const FLG_POWER_ON: u8 = 0xE0;

/// Noise LFSR power-on state.
const NOISE_SEED: u16 = 0x4000;

#[inline]
fn clamp16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Per-voice monitoring gate (mute/solo/volume), separate from registers.
#[derive(Debug, Clone, Copy)]
struct VoiceGate {
    muted: bool,
    solo: bool,
    volume: f32,
}

impl Default for VoiceGate {
    fn default() -> Self {
        VoiceGate { muted: false, solo: false, volume: 1.0 }
    }
}

/// S-DSP: register bank, 8 voices, noise generator and echo unit.
#[derive(Debug, Clone)]
pub struct Dsp {
    regs: [u8; REGISTER_COUNT],
    voices: [Voice; VOICE_COUNT],
    gates: [VoiceGate; VOICE_COUNT],
    noise_lfsr: u16,
    noise_divider: u16,
    echo: EchoUnit,
}

impl Default for Dsp {
    fn default() -> Self {
        Self::new()
    }
}

impl Dsp {
    /// Create a DSP in its power-on state.
    pub fn new() -> Self {
        let mut regs = [0u8; REGISTER_COUNT];
        regs[registers::FLG as usize] = FLG_POWER_ON;
        Dsp {
            regs,
            voices: Default::default(),
            gates: Default::default(),
            noise_lfsr: NOISE_SEED,
            noise_divider: 0,
            echo: EchoUnit::default(),
        }
    }

    /// Reset to power-on state (monitoring gates are preserved).
    pub fn reset(&mut self) {
        self.regs = [0u8; REGISTER_COUNT];
        self.regs[registers::FLG as usize] = FLG_POWER_ON;
        self.voices = Default::default();
        self.noise_lfsr = NOISE_SEED;
        self.noise_divider = 0;
        self.echo.reset();
    }

    /// Read a register (address masked to 0x00-0x7F).
    pub fn read_register(&self, addr: u8) -> u8 {
        self.regs[(addr & 0x7F) as usize]
    }

    /// Write a register, performing the side effects the address carries.
    ///
    /// KON/KOF are edge-triggered: the written bits key voices on/off
    /// immediately and the stored value self-clears. Any ENDX write
    /// clears the whole bitmask. A FLG write with bit 7 set silences all
    /// voices. ARAM is needed for key-on directory lookups.
    pub fn write_register(&mut self, addr: u8, value: u8, aram: &[u8]) {
        let addr = addr & 0x7F;
        match addr {
            registers::KON => {
                for v in 0..VOICE_COUNT {
                    if value & (1 << v) != 0 {
                        self.key_on(v, aram);
                    }
                }
            }
            registers::KOF => {
                for v in 0..VOICE_COUNT {
                    if value & (1 << v) != 0 {
                        self.voices[v].key_off();
                    }
                }
            }
            registers::ENDX => {
                self.regs[registers::ENDX as usize] = 0;
            }
            registers::FLG => {
                self.regs[registers::FLG as usize] = value;
                if DspFlags::from_bits_truncate(value).contains(DspFlags::RESET) {
                    for voice in &mut self.voices {
                        voice.silence();
                    }
                }
            }
            _ => {
                self.regs[addr as usize] = value;
            }
        }
    }

    /// Install a raw 128-byte register image (snapshot load).
    ///
    /// No write side effects fire: KON bits in a snapshot describe a
    /// moment that already happened, and ENDX is restored verbatim.
    pub fn load_registers(&mut self, image: &[u8; REGISTER_COUNT]) {
        self.regs = *image;
        self.voices = Default::default();
        self.noise_lfsr = NOISE_SEED;
        self.noise_divider = 0;
        self.echo.reset();
    }

    /// The current register bank (snapshot export).
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.regs
    }

    /// Mute or unmute a voice's mix contribution (0-7).
    pub fn set_voice_muted(&mut self, voice: usize, muted: bool) {
        self.gates[voice].muted = muted;
    }

    /// Whether a voice's mix contribution is muted.
    pub fn is_voice_muted(&self, voice: usize) -> bool {
        self.gates[voice].muted
    }

    /// Solo a voice: while any solo is active, only soloed voices sound.
    pub fn set_voice_solo(&mut self, voice: usize, solo: bool) {
        self.gates[voice].solo = solo;
    }

    /// Whether a voice is soloed.
    pub fn is_voice_solo(&self, voice: usize) -> bool {
        self.gates[voice].solo
    }

    /// Linear monitoring volume for one voice (1.0 = registers as-is).
    pub fn set_voice_volume(&mut self, voice: usize, volume: f32) {
        self.gates[voice].volume = volume.max(0.0);
    }

    /// Current monitoring volume for one voice.
    pub fn voice_volume(&self, voice: usize) -> f32 {
        self.gates[voice].volume
    }

    /// Current envelope level of a voice (0-0x7FF).
    pub fn voice_envelope_level(&self, voice: usize) -> u16 {
        self.voices[voice].envelope.level
    }

    /// Whether a voice is currently producing samples.
    pub fn is_voice_playing(&self, voice: usize) -> bool {
        self.voices[voice].playing
    }

    fn key_on(&mut self, v: usize, aram: &[u8]) {
        let directory = self.regs[registers::DIR as usize];
        let source = self.regs[voice_addr(v, voice_reg::SRCN) as usize];
        self.voices[v].key_on(aram, directory, source, self.envelope_settings(v));
        self.regs[registers::ENDX as usize] &= !(1 << v);
    }

    #[inline]
    fn envelope_settings(&self, v: usize) -> EnvelopeSettings {
        EnvelopeSettings {
            adsr1: self.regs[voice_addr(v, voice_reg::ADSR1) as usize],
            adsr2: self.regs[voice_addr(v, voice_reg::ADSR2) as usize],
            gain: self.regs[voice_addr(v, voice_reg::GAIN) as usize],
        }
    }

    /// 14-bit pitch step for a voice, pitch-modulated by its predecessor
    /// when the PMON bit is set.
    #[inline]
    fn pitch_step(&self, v: usize) -> u16 {
        let lo = self.regs[voice_addr(v, voice_reg::PITCHL) as usize] as u32;
        let hi = self.regs[voice_addr(v, voice_reg::PITCHH) as usize] as u32;
        let mut step = ((hi << 8) | lo) & PITCH_MAX as u32;
        if v > 0 && self.regs[registers::PMON as usize] & (1 << v) != 0 {
            let factor = self.voices[v - 1].last_output as i32 >> 5;
            let modulated = step as i32 + ((factor * step as i32) >> 10);
            step = modulated.clamp(0, PITCH_MAX as i32) as u32;
        }
        step as u16
    }

    /// True when the monitoring gates let this voice into the mix.
    #[inline]
    fn voice_audible(&self, v: usize) -> bool {
        if self.gates[v].muted {
            return false;
        }
        let any_solo = self.gates.iter().any(|g| g.solo);
        !any_solo || self.gates[v].solo
    }

    fn advance_noise(&mut self) {
        let rate = DspFlags::noise_rate(self.regs[registers::FLG as usize]);
        let period = tables::RATE_PERIODS[rate];
        if period == 0 {
            return;
        }
        self.noise_divider += 1;
        if self.noise_divider >= period {
            self.noise_divider = 0;
            let tap = (self.noise_lfsr ^ (self.noise_lfsr >> 1)) & 1;
            self.noise_lfsr = (self.noise_lfsr >> 1) | (tap << 14);
        }
    }

    /// Synthesize one stereo frame from the current register and ARAM state.
    pub fn generate_frame(&mut self, aram: &mut [u8; ARAM_SIZE]) -> (f32, f32) {
        self.advance_noise();

        let mut mix_l = 0i32;
        let mut mix_r = 0i32;
        let mut echo_in_l = 0i32;
        let mut echo_in_r = 0i32;

        let non = self.regs[registers::NON as usize];
        let eon = self.regs[registers::EON as usize];

        for v in 0..VOICE_COUNT {
            let settings = self.envelope_settings(v);
            let step = self.pitch_step(v);
            let noise = if non & (1 << v) != 0 {
                Some((self.noise_lfsr << 1) as i16)
            } else {
                None
            };

            let frame = self.voices[v].render(&aram[..], settings, noise, step);
            if frame.end_block {
                self.regs[registers::ENDX as usize] |= 1 << v;
            }
            self.regs[voice_addr(v, voice_reg::ENVX) as usize] =
                (self.voices[v].envelope.level >> 4) as u8;
            self.regs[voice_addr(v, voice_reg::OUTX) as usize] = (frame.sample >> 8) as u8;

            if frame.sample == 0 || !self.voice_audible(v) {
                continue;
            }
            let gated = (frame.sample as f32 * self.gates[v].volume) as i32;
            let vol_l = self.regs[voice_addr(v, voice_reg::VOLL) as usize] as i8 as i32;
            let vol_r = self.regs[voice_addr(v, voice_reg::VOLR) as usize] as i8 as i32;
            let out_l = (gated * vol_l) >> 7;
            let out_r = (gated * vol_r) >> 7;

            mix_l = clamp16(mix_l + out_l) as i32;
            mix_r = clamp16(mix_r + out_r) as i32;
            if eon & (1 << v) != 0 {
                echo_in_l = clamp16(echo_in_l + out_l) as i32;
                echo_in_r = clamp16(echo_in_r + out_r) as i32;
            }
        }

        let flg = self.regs[registers::FLG as usize];
        let flags = DspFlags::from_bits_truncate(flg);

        let edl = self.regs[registers::EDL as usize] & 0x0F;
        let region_len = if edl == 0 { 4 } else { edl as usize * 2048 };
        let base = self.regs[registers::ESA as usize] as usize * 0x100;
        let mut coeffs = [0i8; 8];
        for (f, coeff) in coeffs.iter_mut().enumerate() {
            *coeff = self.regs[voice_addr(f, voice_reg::FIR) as usize] as i8;
        }
        let feedback = self.regs[registers::EFB as usize] as i8;
        let (echo_l, echo_r) = self.echo.process(
            aram,
            base,
            region_len,
            coeffs,
            feedback,
            (echo_in_l, echo_in_r),
            !flags.contains(DspFlags::ECHO_WRITE_DISABLE),
        );

        if flags.intersects(DspFlags::MUTE | DspFlags::RESET) {
            return (0.0, 0.0);
        }

        let mvol_l = self.regs[registers::MVOLL as usize] as i8 as i32;
        let mvol_r = self.regs[registers::MVOLR as usize] as i8 as i32;
        let evol_l = self.regs[registers::EVOLL as usize] as i8 as i32;
        let evol_r = self.regs[registers::EVOLR as usize] as i8 as i32;

        let out_l = clamp16(((mix_l * mvol_l) >> 7) + ((echo_l * evol_l) >> 7));
        let out_r = clamp16(((mix_r * mvol_r) >> 7) + ((echo_r * evol_r) >> 7));
        (out_l as f32 / 32768.0, out_r as f32 / 32768.0)
    }

    /// Fill an interleaved stereo buffer (`buffer.len() / 2` frames).
    pub fn generate_samples_into(&mut self, aram: &mut [u8; ARAM_SIZE], buffer: &mut [f32]) {
        for chunk in buffer.chunks_exact_mut(2) {
            let (l, r) = self.generate_frame(aram);
            chunk[0] = l;
            chunk[1] = r;
        }
    }
}
