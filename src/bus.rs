//! Shared memory and the memory-mapped I/O page.
//!
//! `ApuBus` owns the 64 KiB ARAM, the DSP, the three timers and the CPU
//! I/O latches, kept separate from the CPU itself to avoid borrow cycles
//! (the CPU borrows the bus per step). CPU and DSP observe the same ARAM
//! bytes; the DSP fetches sample and echo data raw, only the CPU sees the
//! I/O page.
//!
//! I/O page (0xF0-0xFF):
//!
//! | Address | Register | Behavior |
//! |---------|----------|----------|
//! | 0xF0    | TEST     | Stored, otherwise inert |
//! | 0xF1    | CONTROL  | Timer enables, port clears, IPL ROM mapping |
//! | 0xF2    | DSPADDR  | DSP register address latch |
//! | 0xF3    | DSPDATA  | DSP register window (addr >= 0x80: reads mirror, writes dropped) |
//! | 0xF4-F7 | CPUIO0-3 | Reads input latches, writes output latches |
//! | 0xF8-F9 |          | Plain RAM |
//! | 0xFA-FC | T0-T2    | Timer targets (write-only, reads fall through to RAM) |
//! | 0xFD-FF | C0-C2    | Timer counters (read clears, writes dropped) |
//!
//! With CONTROL bit 7 set, reads of 0xFFC0-0xFFFF return the 64-byte
//! boot ROM image; writes always land in RAM underneath.

use crate::dsp::{Dsp, ARAM_SIZE};
use crate::spc700::Bus;
use crate::timer::Timer;

/// CONTROL register address.
const CONTROL: u16 = 0x00F1;
/// DSP address latch.
const DSPADDR: u16 = 0x00F2;
/// DSP data window.
const DSPDATA: u16 = 0x00F3;
/// First CPU I/O port.
const CPUIO0: u16 = 0x00F4;
/// First timer target register.
const T0TARGET: u16 = 0x00FA;
/// First timer counter register.
const T0OUT: u16 = 0x00FD;
/// Base of the boot ROM overlay.
const IPL_BASE: u16 = 0xFFC0;

/// Size of the boot ROM image.
pub const IPL_ROM_SIZE: usize = 64;

/// ARAM, DSP, timers and I/O latches behind the CPU's memory seam.
pub struct ApuBus {
    /// Working memory shared by CPU and DSP
    pub aram: Box<[u8; ARAM_SIZE]>,
    /// DSP register bank and voices
    pub dsp: Dsp,
    /// Interval timers 0-2
    pub timers: [Timer; 3],
    /// Boot ROM image mapped over 0xFFC0 when enabled
    pub ipl_rom: [u8; IPL_ROM_SIZE],
    control: u8,
    dsp_addr: u8,
    input_ports: [u8; 4],
    output_ports: [u8; 4],
}

impl Default for ApuBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ApuBus {
    /// Create a bus with zeroed ARAM and everything at power-on defaults.
    pub fn new() -> Self {
        ApuBus {
            aram: vec![0u8; ARAM_SIZE]
                .into_boxed_slice()
                .try_into()
                .expect("ARAM_SIZE boxed slice"),
            dsp: Dsp::new(),
            timers: Timer::bank(),
            ipl_rom: [0; IPL_ROM_SIZE],
            control: 0x80,
            dsp_addr: 0,
            input_ports: [0; 4],
            output_ports: [0; 4],
        }
    }

    /// Zero ARAM and return peripherals to power-on state.
    pub fn reset(&mut self) {
        self.aram.fill(0);
        self.dsp.reset();
        self.timers = Timer::bank();
        self.control = 0x80;
        self.dsp_addr = 0;
        self.input_ports = [0; 4];
        self.output_ports = [0; 4];
    }

    /// Seed I/O latches and timers from a freshly installed ARAM image.
    ///
    /// A snapshot stores the I/O page as raw RAM bytes; the latch values
    /// the music driver expects to read back are re-derived from them.
    pub fn sync_io_from_aram(&mut self) {
        self.dsp_addr = self.aram[DSPADDR as usize];
        for (i, port) in self.input_ports.iter_mut().enumerate() {
            *port = self.aram[CPUIO0 as usize + i];
        }
        for (i, timer) in self.timers.iter_mut().enumerate() {
            timer.set_target(self.aram[T0TARGET as usize + i]);
        }
        self.write_control(self.aram[CONTROL as usize]);
    }

    /// Advance all timers by elapsed CPU cycles.
    pub fn advance_timers(&mut self, cycles: u32) {
        for timer in &mut self.timers {
            timer.advance(cycles);
        }
    }

    /// Run one DSP frame against the shared ARAM.
    pub fn run_dsp_frame(&mut self) -> (f32, f32) {
        self.dsp.generate_frame(&mut self.aram)
    }

    fn write_control(&mut self, value: u8) {
        for (i, timer) in self.timers.iter_mut().enumerate() {
            timer.set_enabled(value & (1 << i) != 0);
        }
        if value & 0x10 != 0 {
            self.input_ports[0] = 0;
            self.input_ports[1] = 0;
        }
        if value & 0x20 != 0 {
            self.input_ports[2] = 0;
            self.input_ports[3] = 0;
        }
        self.control = value;
    }

    /// Whether the boot ROM is mapped over 0xFFC0.
    #[inline]
    fn ipl_mapped(&self) -> bool {
        self.control & 0x80 != 0
    }
}

impl Bus for ApuBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            CONTROL => self.control,
            DSPADDR => self.dsp_addr,
            DSPDATA => self.dsp.read_register(self.dsp_addr & 0x7F),
            CPUIO0..=0x00F7 => self.input_ports[(addr - CPUIO0) as usize],
            T0OUT..=0x00FF => self.timers[(addr - T0OUT) as usize].read_counter(),
            IPL_BASE..=0xFFFF if self.ipl_mapped() => self.ipl_rom[(addr - IPL_BASE) as usize],
            _ => self.aram[addr as usize],
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            CONTROL => self.write_control(value),
            DSPADDR => self.dsp_addr = value,
            DSPDATA => {
                if self.dsp_addr < 0x80 {
                    self.dsp.write_register(self.dsp_addr, value, &*self.aram);
                }
            }
            CPUIO0..=0x00F7 => self.output_ports[(addr - CPUIO0) as usize] = value,
            T0TARGET..=0x00FC => self.timers[(addr - T0TARGET) as usize].set_target(value),
            T0OUT..=0x00FF => {} // counters are read-only
            _ => self.aram[addr as usize] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::registers;

    #[test]
    fn test_plain_ram_round_trip() {
        let mut bus = ApuBus::new();
        bus.write(0x1234, 0x56);
        assert_eq!(bus.read(0x1234), 0x56);
        assert_eq!(bus.aram[0x1234], 0x56);
    }

    #[test]
    fn test_dsp_port_window() {
        let mut bus = ApuBus::new();
        bus.write(DSPADDR, registers::MVOLL);
        bus.write(DSPDATA, 0x44);
        assert_eq!(bus.dsp.read_register(registers::MVOLL), 0x44);
        assert_eq!(bus.read(DSPDATA), 0x44);
    }

    #[test]
    fn test_dsp_addr_above_0x80_reads_mirror_writes_drop() {
        let mut bus = ApuBus::new();
        bus.write(DSPADDR, registers::MVOLL);
        bus.write(DSPDATA, 0x21);

        bus.write(DSPADDR, 0x80 | registers::MVOLL);
        assert_eq!(bus.read(DSPDATA), 0x21, "reads mirror the low half");
        bus.write(DSPDATA, 0x77);
        assert_eq!(bus.dsp.read_register(registers::MVOLL), 0x21, "write dropped");
    }

    #[test]
    fn test_key_on_through_dsp_port() {
        let mut bus = ApuBus::new();
        // Directory entry 0 at page 0x02 -> sample at 0x0300 (loop there too)
        bus.aram[0x0200] = 0x00;
        bus.aram[0x0201] = 0x03;
        bus.aram[0x0202] = 0x00;
        bus.aram[0x0203] = 0x03;
        bus.aram[0x0300] = 0x03; // loop + end, silent data

        bus.write(DSPADDR, registers::DIR);
        bus.write(DSPDATA, 0x02);
        bus.write(DSPADDR, registers::KON);
        bus.write(DSPDATA, 0x01);
        assert!(bus.dsp.is_voice_playing(0));
    }

    #[test]
    fn test_timer_counters_clear_on_cpu_read() {
        let mut bus = ApuBus::new();
        bus.write(0x00FA, 1); // timer 0 target
        bus.write(CONTROL, 0x81);
        bus.advance_timers(128 * 3);
        assert_eq!(bus.read(0x00FD), 3);
        assert_eq!(bus.read(0x00FD), 0);
    }

    #[test]
    fn test_control_clears_input_ports() {
        let mut bus = ApuBus::new();
        bus.aram[0x00F4] = 0xAA;
        bus.aram[0x00F5] = 0xBB;
        bus.sync_io_from_aram();
        assert_eq!(bus.read(0x00F4), 0xAA);

        bus.write(CONTROL, 0x80 | 0x10);
        assert_eq!(bus.read(0x00F4), 0);
        assert_eq!(bus.read(0x00F5), 0);
    }

    #[test]
    fn test_cpu_port_writes_go_to_output_latch() {
        let mut bus = ApuBus::new();
        bus.aram[0x00F6] = 0x12;
        bus.sync_io_from_aram();
        bus.write(0x00F6, 0x99);
        // Input latch is what the CPU reads back
        assert_eq!(bus.read(0x00F6), 0x12);
        assert_eq!(bus.output_ports[2], 0x99);
    }

    #[test]
    fn test_ipl_rom_overlay() {
        let mut bus = ApuBus::new();
        bus.ipl_rom[0] = 0xCD;
        bus.aram[IPL_BASE as usize] = 0x11;

        assert_eq!(bus.read(IPL_BASE), 0xCD, "ROM mapped at power-on");
        bus.write(IPL_BASE, 0x22);
        assert_eq!(bus.aram[IPL_BASE as usize], 0x22, "writes land in RAM");

        bus.write(CONTROL, 0x00);
        assert_eq!(bus.read(IPL_BASE), 0x22, "unmapped reads see RAM");
    }
}
