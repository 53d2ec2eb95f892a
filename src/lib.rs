//! SNES APU Emulator
//!
//! A sample-accurate emulator of the SNES audio subsystem: the SPC700
//! audio coprocessor paired with the 8-voice S-DSP, sharing 64 KiB of
//! ARAM. Loads SPC snapshot files, renders their audio faster than real
//! time, and exposes register-level access for editor tooling.
//!
//! # Features
//! - Full 256-opcode SPC700 interpreter with cycle accounting
//! - 8-voice DSP: BRR sample decoding, Gaussian interpolation,
//!   ADSR/GAIN envelopes, noise, pitch modulation and echo/FIR
//! - BRR codec with a lossy encoder for round-tripping sample data
//! - Byte-exact SPC snapshot import and export (ID666 metadata included)
//! - Real-time safe render path: no allocation, no locking in `process`
//! - Per-voice mute/solo/volume monitoring gates that never disturb the
//!   underlying register state
//!
//! # Quick start
//! ```no_run
//! use spc_apu::Engine;
//!
//! let data = std::fs::read("song.spc").unwrap();
//! let mut engine = Engine::new(44_100);
//! engine.load_snapshot(&data).unwrap();
//! engine.play();
//!
//! // Interleaved stereo, 512 frames per callback
//! let mut buffer = vec![0.0f32; 1024];
//! engine.process(&mut buffer);
//! ```
//!
//! # Architecture
//! The [`Engine`] owns an [`bus::ApuBus`] (ARAM + DSP + timers) and a
//! [`spc700::Spc700`]; the CPU borrows the bus per step, so CPU and DSP
//! observe the same memory without shared-ownership cycles. Timing
//! follows the hardware contract: 32 CPU cycles per 32 kHz DSP frame,
//! CPU first, then synthesis, then linear resampling to the host rate.

#![warn(missing_docs)]

pub mod brr;
pub mod bus;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod spc700;
pub mod timer;

pub use dsp::{Dsp, ARAM_SIZE, NATIVE_SAMPLE_RATE, REGISTER_COUNT, VOICE_COUNT};
pub use engine::{Engine, PlaybackState, CPU_CLOCK_HZ, CYCLES_PER_SAMPLE};
pub use error::{ApuError, Result};
pub use snapshot::{Id666, SpcSnapshot};
pub use spc700::{Psw, Spc700};
