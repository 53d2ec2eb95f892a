//! Coprocessor interval timers.
//!
//! Three countdown timers driven from the CPU clock: timers 0 and 1 tick
//! at 8 kHz (clock / 128), timer 2 at 64 kHz (clock / 16). Each divides
//! its tick rate by an 8-bit target (0 counts as 256) into a 4-bit output
//! counter.
//!
//! Register behavior mirrored here:
//! - targets are write-only (0xFA-0xFC)
//! - output counters (0xFD-0xFF) clear on read
//! - the enable bits in CONTROL (0xF1) gate counting; a rising edge
//!   restarts the divider and clears the output counter

/// CPU cycles per tick for timers 0 and 1 (8 kHz).
pub const PRESCALE_SLOW: u32 = 128;

/// CPU cycles per tick for timer 2 (64 kHz).
pub const PRESCALE_FAST: u32 = 16;

/// One interval timer.
#[derive(Debug, Clone)]
pub struct Timer {
    prescale: u32,
    enabled: bool,
    /// Divider target; 0 divides by 256
    target: u8,
    /// Cycle accumulator toward the next tick
    cycle_acc: u32,
    /// Ticks accumulated toward the target
    stage: u8,
    /// 4-bit output counter
    counter: u8,
}

impl Timer {
    /// Create a disabled timer with the given cycle prescale.
    pub fn new(prescale: u32) -> Self {
        Timer {
            prescale,
            enabled: false,
            target: 0,
            cycle_acc: 0,
            stage: 0,
            counter: 0,
        }
    }

    /// The standard bank of three timers (two slow, one fast).
    pub fn bank() -> [Timer; 3] {
        [
            Timer::new(PRESCALE_SLOW),
            Timer::new(PRESCALE_SLOW),
            Timer::new(PRESCALE_FAST),
        ]
    }

    /// Set the divider target (0 = 256).
    pub fn set_target(&mut self, target: u8) {
        self.target = target;
    }

    /// Gate the timer; a rising edge restarts the divider and counter.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.stage = 0;
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    /// Whether the timer is currently counting.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Advance by a number of CPU cycles.
    pub fn advance(&mut self, cycles: u32) {
        if !self.enabled {
            return;
        }
        self.cycle_acc += cycles;
        while self.cycle_acc >= self.prescale {
            self.cycle_acc -= self.prescale;
            self.stage = self.stage.wrapping_add(1);
            let target = self.target;
            if self.stage == target {
                // target 0 wraps the full 256 stages
                self.stage = 0;
                self.counter = (self.counter + 1) & 0x0F;
            }
        }
    }

    /// Read the 4-bit output counter; the read clears it.
    pub fn read_counter(&mut self) -> u8 {
        let value = self.counter;
        self.counter = 0;
        value
    }

    /// Counter value without the clear-on-read side effect.
    pub fn peek_counter(&self) -> u8 {
        self.counter
    }
}
