//! Playback engine: CPU + bus + resampler behind a player-style surface.
//!
//! The engine owns the whole coprocessor (CPU, ARAM, DSP, timers) and
//! drives it with the hardware timing contract: 32 CPU cycles per native
//! 32 kHz frame, CPU always ahead of the DSP within a frame. Native
//! output is linearly resampled to the host rate.
//!
//! `process` is the real-time entry point: allocation-free, lock-free,
//! and infallible - when nothing is loaded or playback is stopped it
//! zero-fills. Per-voice mute/solo/volume and the master volume are
//! monitoring gates over the mix; the underlying register state, and
//! therefore the loaded snapshot, stays untouched.

use crate::bus::ApuBus;
use crate::dsp::{registers, NATIVE_SAMPLE_RATE, REGISTER_COUNT, VOICE_COUNT};
use crate::error::{ApuError, Result};
use crate::snapshot::{Id666, SpcSnapshot};
use crate::spc700::Spc700;

/// Coprocessor clock in Hz.
pub const CPU_CLOCK_HZ: u32 = 1_024_000;

/// CPU cycles per native output frame.
pub const CYCLES_PER_SAMPLE: u32 = 32;

/// Frames synthesized per batch while seeking.
const SEEK_BATCH_FRAMES: u64 = 1024;

/// Playback state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Stopped at the beginning.
    #[default]
    Stopped,
    /// Actively rendering.
    Playing,
    /// Paused, position held.
    Paused,
}

/// SPC playback engine.
pub struct Engine {
    cpu: Spc700,
    bus: ApuBus,
    state: PlaybackState,
    sample_rate: u32,
    master_volume: f32,
    snapshot: Option<SpcSnapshot>,
    /// Fractional position between `prev_frame` and `curr_frame`
    resample_pos: f64,
    prev_frame: (f32, f32),
    curr_frame: (f32, f32),
    /// CPU cycles already executed beyond the frame grid
    cycle_credit: u64,
    native_frames: u64,
}

impl Engine {
    /// Create an engine rendering at the given host sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Engine {
            cpu: Spc700::new(),
            bus: ApuBus::new(),
            state: PlaybackState::Stopped,
            sample_rate: sample_rate.max(1),
            master_volume: 1.0,
            snapshot: None,
            resample_pos: 0.0,
            prev_frame: (0.0, 0.0),
            curr_frame: (0.0, 0.0),
            cycle_credit: 0,
            native_frames: 0,
        }
    }

    /// Load a snapshot from raw bytes.
    ///
    /// Validation happens before any state is touched: a failed load
    /// leaves the previous machine state fully intact.
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<()> {
        let snapshot = SpcSnapshot::parse(data)?;
        self.install(&snapshot);
        self.snapshot = Some(snapshot);
        self.state = PlaybackState::Stopped;
        Ok(())
    }

    fn install(&mut self, snapshot: &SpcSnapshot) {
        self.cpu.reset();
        self.cpu.load_state(
            snapshot.pc,
            snapshot.a,
            snapshot.x,
            snapshot.y,
            snapshot.psw,
            snapshot.sp,
        );
        self.bus.reset();
        self.bus.aram.copy_from_slice(snapshot.aram.as_slice());
        self.bus.ipl_rom = snapshot.ipl_rom;
        self.bus.dsp.load_registers(&snapshot.dsp_registers);
        self.bus.sync_io_from_aram();
        self.resample_pos = 0.0;
        self.prev_frame = (0.0, 0.0);
        self.curr_frame = (0.0, 0.0);
        self.cycle_credit = 0;
        self.native_frames = 0;
    }

    /// Start or resume playback.
    pub fn play(&mut self) {
        if self.snapshot.is_some() {
            self.state = PlaybackState::Playing;
        }
    }

    /// Pause, keeping the position.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Stop and rewind to the loaded snapshot.
    pub fn stop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.install(&snapshot);
            self.snapshot = Some(snapshot);
        }
        self.state = PlaybackState::Stopped;
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Host sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the host sample rate; resampler state restarts.
    ///
    /// Not meant for the audio callback - change rate while stopped.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.resample_pos = 0.0;
    }

    /// Advance the machine one native frame: 32 CPU cycles, then one DSP
    /// frame over the shared ARAM.
    fn render_native_frame(&mut self) -> (f32, f32) {
        if self.cycle_credit >= CYCLES_PER_SAMPLE as u64 {
            self.cycle_credit -= CYCLES_PER_SAMPLE as u64;
        } else {
            let target = CYCLES_PER_SAMPLE as u64 - self.cycle_credit;
            let ran = self.cpu.execute(&mut self.bus, target);
            self.bus.advance_timers(ran as u32);
            self.cycle_credit += ran;
            self.cycle_credit -= CYCLES_PER_SAMPLE as u64;
        }
        self.native_frames += 1;
        self.bus.run_dsp_frame()
    }

    /// Render interleaved stereo into `output` (frames = len / 2).
    ///
    /// Zero-fills unless playing. Allocation-free; runs to completion for
    /// the requested count.
    pub fn process(&mut self, output: &mut [f32]) {
        if self.state != PlaybackState::Playing {
            output.fill(0.0);
            return;
        }

        let step = NATIVE_SAMPLE_RATE as f64 / self.sample_rate as f64;
        for chunk in output.chunks_exact_mut(2) {
            self.resample_pos += step;
            while self.resample_pos >= 1.0 {
                self.resample_pos -= 1.0;
                self.prev_frame = self.curr_frame;
                self.curr_frame = self.render_native_frame();
            }
            let t = self.resample_pos as f32;
            let l = self.prev_frame.0 + (self.curr_frame.0 - self.prev_frame.0) * t;
            let r = self.prev_frame.1 + (self.curr_frame.1 - self.prev_frame.1) * t;
            chunk[0] = l * self.master_volume;
            chunk[1] = r * self.master_volume;
        }
    }

    /// Seek to an absolute time.
    ///
    /// Re-installs the loaded snapshot, then rolls the machine forward in
    /// fixed batches - state only ever advances, so this is O(position).
    pub fn seek(&mut self, seconds: f64) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        self.install(&snapshot);
        self.snapshot = Some(snapshot);

        let target = (seconds.max(0.0) * NATIVE_SAMPLE_RATE as f64) as u64;
        while self.native_frames < target {
            let batch = SEEK_BATCH_FRAMES.min(target - self.native_frames);
            for _ in 0..batch {
                self.render_native_frame();
            }
        }
    }

    /// Total CPU cycles executed since the last snapshot install.
    pub fn elapsed_cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Playback position in seconds (native frame count / 32 kHz).
    pub fn position_seconds(&self) -> f64 {
        self.native_frames as f64 / NATIVE_SAMPLE_RATE as f64
    }

    /// Master output volume (1.0 = unity).
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Set the master output volume.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.max(0.0);
    }

    fn check_voice(voice: usize) -> Result<()> {
        if voice < VOICE_COUNT {
            Ok(())
        } else {
            Err(ApuError::VoiceIndexOutOfRange { index: voice })
        }
    }

    /// Mute or unmute one voice's mix contribution.
    pub fn set_voice_muted(&mut self, voice: usize, muted: bool) -> Result<()> {
        Self::check_voice(voice)?;
        self.bus.dsp.set_voice_muted(voice, muted);
        Ok(())
    }

    /// Whether a voice is muted.
    pub fn is_voice_muted(&self, voice: usize) -> Result<bool> {
        Self::check_voice(voice)?;
        Ok(self.bus.dsp.is_voice_muted(voice))
    }

    /// Solo one voice (non-soloed voices drop out of the mix).
    pub fn set_voice_solo(&mut self, voice: usize, solo: bool) -> Result<()> {
        Self::check_voice(voice)?;
        self.bus.dsp.set_voice_solo(voice, solo);
        Ok(())
    }

    /// Whether a voice is soloed.
    pub fn is_voice_solo(&self, voice: usize) -> Result<bool> {
        Self::check_voice(voice)?;
        Ok(self.bus.dsp.is_voice_solo(voice))
    }

    /// Set a voice's linear monitoring volume (1.0 = registers as-is).
    pub fn set_voice_volume(&mut self, voice: usize, volume: f32) -> Result<()> {
        Self::check_voice(voice)?;
        self.bus.dsp.set_voice_volume(voice, volume);
        Ok(())
    }

    /// A voice's linear monitoring volume.
    pub fn voice_volume(&self, voice: usize) -> Result<f32> {
        Self::check_voice(voice)?;
        Ok(self.bus.dsp.voice_volume(voice))
    }

    /// Read one DSP register.
    pub fn read_dsp_register(&self, addr: usize) -> Result<u8> {
        if addr >= REGISTER_COUNT {
            return Err(ApuError::RegisterIndexOutOfRange { index: addr });
        }
        Ok(self.bus.dsp.read_register(addr as u8))
    }

    /// Write one DSP register (with its usual side effects).
    pub fn write_dsp_register(&mut self, addr: usize, value: u8) -> Result<()> {
        if addr >= REGISTER_COUNT {
            return Err(ApuError::RegisterIndexOutOfRange { index: addr });
        }
        self.bus.dsp.write_register(addr as u8, value, &*self.bus.aram);
        Ok(())
    }

    /// Read-only view of ARAM for editor tooling.
    pub fn aram(&self) -> &[u8] {
        self.bus.aram.as_slice()
    }

    /// Mutable ARAM access for editor tooling.
    ///
    /// Safe only while the engine is not concurrently processing.
    pub fn aram_mut(&mut self) -> &mut [u8] {
        self.bus.aram.as_mut_slice()
    }

    /// Export the current machine state in the snapshot layout, with
    /// optionally fresh metadata.
    pub fn export_snapshot(&self, metadata: Option<Id666>) -> Vec<u8> {
        let snapshot = SpcSnapshot {
            pc: self.cpu.pc,
            a: self.cpu.a,
            x: self.cpu.x,
            y: self.cpu.y,
            psw: self.cpu.psw.bits(),
            sp: self.cpu.sp,
            aram: self.bus.aram.clone(),
            dsp_registers: *self.bus.dsp.registers(),
            ipl_rom: self.bus.ipl_rom,
            metadata,
        };
        snapshot.to_bytes()
    }

    /// Live DSP register convenience mirror of [`registers::ENDX`].
    pub fn end_flags(&self) -> u8 {
        self.bus.dsp.read_register(registers::ENDX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{HEADER_MAGIC, SNAPSHOT_LEN};

    fn empty_snapshot() -> Vec<u8> {
        let mut data = vec![0u8; SNAPSHOT_LEN];
        data[..HEADER_MAGIC.len()].copy_from_slice(HEADER_MAGIC);
        data[0x21] = 0x1A;
        data[0x22] = 0x1A;
        data[0x23] = 0x1B;
        data[0x25] = 0x00;
        data[0x26] = 0x02; // PC = 0x0200
        data[0x2B] = 0xEF; // SP
        // Idle driver: BRA -2
        data[0x100 + 0x0200] = 0x2F;
        data[0x100 + 0x0201] = 0xFE;
        data
    }

    #[test]
    fn test_process_zero_fills_when_stopped() {
        let mut engine = Engine::new(44_100);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        let mut buffer = vec![1.0f32; 256];
        engine.process(&mut buffer);
        assert!(buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_failed_load_keeps_prior_state() {
        let mut engine = Engine::new(44_100);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        engine.play();
        let cycles_before = {
            let mut buffer = vec![0.0f32; 128];
            engine.process(&mut buffer);
            engine.elapsed_cycles()
        };
        assert!(engine.load_snapshot(&[0u8; 64]).is_err());
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.elapsed_cycles(), cycles_before);
    }

    #[test]
    fn test_cpu_advances_32_cycles_per_native_frame() {
        let mut engine = Engine::new(32_000);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        engine.play();
        let mut buffer = vec![0.0f32; 2 * 1000];
        engine.process(&mut buffer);
        // At a 32 kHz host rate, 1000 output frames = 1000 native frames
        let cycles = engine.elapsed_cycles();
        assert!(cycles >= 32 * 1000);
        assert!(cycles < 32 * 1000 + 8, "overshoot bounded by one instruction");
    }

    #[test]
    fn test_position_tracks_native_frames() {
        let mut engine = Engine::new(32_000);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        engine.play();
        let mut buffer = vec![0.0f32; 2 * 3200];
        engine.process(&mut buffer);
        assert!((engine.position_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_seek_is_deterministic_with_process() {
        let mut seeked = Engine::new(32_000);
        seeked.load_snapshot(&empty_snapshot()).unwrap();
        seeked.seek(0.25);

        let mut played = Engine::new(32_000);
        played.load_snapshot(&empty_snapshot()).unwrap();
        played.play();
        let mut sink = vec![0.0f32; 2 * 8000];
        played.process(&mut sink);

        assert_eq!(seeked.position_seconds(), played.position_seconds());
        assert_eq!(seeked.elapsed_cycles(), played.elapsed_cycles());
    }

    #[test]
    fn test_voice_bounds_errors() {
        let mut engine = Engine::new(44_100);
        assert!(matches!(
            engine.set_voice_muted(8, true),
            Err(ApuError::VoiceIndexOutOfRange { index: 8 })
        ));
        assert!(matches!(
            engine.read_dsp_register(128),
            Err(ApuError::RegisterIndexOutOfRange { index: 128 })
        ));
        assert!(engine.set_voice_muted(7, true).is_ok());
        assert!(engine.is_voice_muted(7).unwrap());
    }

    #[test]
    fn test_export_round_trips_loaded_snapshot_memory() {
        let mut engine = Engine::new(44_100);
        let mut data = empty_snapshot();
        data[0x100 + 0x4000] = 0x77; // recognizable ARAM byte
        engine.load_snapshot(&data).unwrap();

        let exported = engine.export_snapshot(None);
        assert_eq!(exported.len(), SNAPSHOT_LEN);
        assert_eq!(exported[0x100 + 0x4000], 0x77);
        assert_eq!(&exported[..HEADER_MAGIC.len()], HEADER_MAGIC.as_slice());

        // Exported state loads back without error
        let mut verify = Engine::new(44_100);
        verify.load_snapshot(&exported).unwrap();
    }

    #[test]
    fn test_direct_register_access() {
        let mut engine = Engine::new(44_100);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        engine.write_dsp_register(registers::MVOLL as usize, 0x55).unwrap();
        assert_eq!(engine.read_dsp_register(registers::MVOLL as usize).unwrap(), 0x55);
    }

    #[test]
    fn test_stop_rewinds_to_snapshot() {
        let mut engine = Engine::new(32_000);
        engine.load_snapshot(&empty_snapshot()).unwrap();
        engine.play();
        let mut buffer = vec![0.0f32; 2 * 640];
        engine.process(&mut buffer);
        assert!(engine.position_seconds() > 0.0);

        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.position_seconds(), 0.0);
        assert_eq!(engine.elapsed_cycles(), 0);
    }
}
