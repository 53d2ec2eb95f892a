//! Error types for APU emulation, snapshot loading and sample decoding.

/// Result type for APU operations.
pub type Result<T> = std::result::Result<T, ApuError>;

/// Errors that can occur during snapshot loading, codec use and register access.
///
/// Nothing in the real-time render path (`Engine::process`, `Spc700::step`,
/// `Dsp::generate_frame`) returns errors; degenerate states produce silence
/// and numeric edges saturate. These variants stay local to the call that
/// caused them: a failed load leaves the engine's prior state intact.
#[derive(thiserror::Error, Debug)]
pub enum ApuError {
    /// Snapshot data failed validation (bad magic, marker or layout)
    #[error("Invalid snapshot: {reason}")]
    InvalidSnapshot {
        /// What failed to validate
        reason: String,
    },

    /// Snapshot or stream data shorter than the fixed layout requires
    #[error("Data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Sample stream length is not a whole number of 9-byte blocks
    #[error("Malformed sample stream: {len} bytes is not a multiple of 9")]
    MalformedStream {
        /// Offending stream length
        len: usize,
    },

    /// Voice index outside 0..8
    #[error("Voice index {index} out of range (8 voices)")]
    VoiceIndexOutOfRange {
        /// Requested voice index
        index: usize,
    },

    /// DSP register index outside 0..128
    #[error("DSP register 0x{index:02X} out of range (128 registers)")]
    RegisterIndexOutOfRange {
        /// Requested register index
        index: usize,
    },
}
