//! Driver for the VCTCXO tamer: the PPS error counter and trim DAC
//! peripheral of the PPSDO gateware.
//!
//! The tamer counts oscillator cycles between reference pulses over three
//! averaging windows (1, 10 and 100 PPS periods) and raises its status
//! register once a window has accumulated an error count. The trim DAC code
//! steering the oscillator is written through the same register bank.
#![cfg_attr(not(test), no_std)]

use bitbybit::{bitenum, bitfield};

/// Byte register indices of the tamer register bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Addr {
    Ctrl = 0x00,
    Stat = 0x01,
    Err1s = 0x04,
    Err10s = 0x0c,
    Err100s = 0x14,
    DacLsb = 0x20,
    DacMsb = 0x21,
    State = 0x22,
}

#[bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq)]
pub enum TuneMode {
    Disabled = 0,
    Pps1 = 1,
    Mhz10 = 2,
}

impl TryFrom<u8> for TuneMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Pps1),
            2 => Ok(Self::Mhz10),
            other => Err(other),
        }
    }
}

/// Control register.
///
/// The hardware register can not be read back. [VctcxoTamer] keeps a shadow
/// copy and always writes the full byte.
#[bitfield(u8, default = 0x00)]
#[derive(Debug, PartialEq)]
pub struct Ctrl {
    #[bit(0, rw)]
    pub reset: bool,
    #[bit(1, rw)]
    pub irq_en: bool,
    // self-clearing
    #[bit(2, rw)]
    pub irq_clr: bool,
    #[bits(6..=7, rw)]
    pub tune_mode: Option<TuneMode>,
}

#[bitfield(u8)]
#[derive(Debug, PartialEq)]
pub struct Status {
    #[bit(0, r)]
    pub err_1s: bool,
    #[bit(1, r)]
    pub err_10s: bool,
    #[bit(2, r)]
    pub err_100s: bool,
}

impl Status {
    /// Any error count available
    pub fn pending(&self) -> bool {
        self.raw_value() != 0
    }
}

/// Averaging window of an error counter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Window {
    Short = 0,
    Medium = 1,
    Long = 2,
}

impl Window {
    /// All windows, shortest first.
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Window length in PPS periods.
    pub const fn length(self) -> i32 {
        match self {
            Self::Short => 1,
            Self::Medium => 10,
            Self::Long => 100,
        }
    }

    pub const fn addr(self) -> Addr {
        match self {
            Self::Short => Addr::Err1s,
            Self::Medium => Addr::Err10s,
            Self::Long => Addr::Err100s,
        }
    }
}

/// Error counts captured from the tamer after it signalled completion.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorSample {
    /// Error counts indexed by [Window].
    pub errors: [i32; 3],
    /// Window just completed, indexed by [Window].
    pub completed: [bool; 3],
}

impl ErrorSample {
    pub fn error(&self, window: Window) -> i32 {
        self.errors[window as usize]
    }

    pub fn is_complete(&self, window: Window) -> bool {
        self.completed[window as usize]
    }

    /// The shortest completed window and its error count.
    pub fn shortest_complete(&self) -> Option<(Window, i32)> {
        Window::ALL
            .into_iter()
            .find(|w| self.is_complete(*w))
            .map(|w| (w, self.error(w)))
    }
}

/// Byte wide register bank access.
///
/// Accesses are not bus transactions and can not fail.
pub trait Registers {
    fn read(&mut self, addr: u8) -> u8;
    fn write(&mut self, addr: u8, data: u8);
}

impl<R: Registers + ?Sized> Registers for &mut R {
    fn read(&mut self, addr: u8) -> u8 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u8, data: u8) {
        (**self).write(addr, data)
    }
}

/// Memory mapped register bank with word aligned byte registers.
#[derive(Debug)]
pub struct Mmio {
    base: *mut u8,
}

impl Mmio {
    /// Address distance between consecutive byte registers.
    pub const STRIDE: usize = 4;

    /// # Safety
    /// `base` must point to the tamer register bank (or to memory covering
    /// `STRIDE * 256` bytes) and no other owner may access it.
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            base: base as *mut u8,
        }
    }
}

impl Registers for Mmio {
    fn read(&mut self, addr: u8) -> u8 {
        // Note(unsafe): Exclusive access to the bank is guaranteed by `new()`.
        unsafe { self.base.add(Self::STRIDE * addr as usize).read_volatile() }
    }

    fn write(&mut self, addr: u8, data: u8) {
        // Note(unsafe): Exclusive access to the bank is guaranteed by `new()`.
        unsafe {
            self.base
                .add(Self::STRIDE * addr as usize)
                .write_volatile(data)
        }
    }
}

/// Tamer driver owning the register bank and the shadow state of the write
/// only registers.
#[derive(Debug)]
pub struct VctcxoTamer<R> {
    regs: R,
    ctrl: Ctrl,
    trim: u16,
}

impl<R: Registers> VctcxoTamer<R> {
    /// Create the driver with a zeroed control shadow.
    ///
    /// Nothing is written to the hardware.
    pub fn new(regs: R) -> Self {
        Self {
            regs,
            ctrl: Ctrl::default(),
            trim: 0,
        }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn read(&mut self, addr: Addr) -> u8 {
        self.regs.read(addr as u8)
    }

    pub fn write(&mut self, addr: Addr, data: u8) {
        self.regs.write(addr as u8, data)
    }

    /// Shadow copy of the control register.
    pub fn ctrl(&self) -> Ctrl {
        self.ctrl
    }

    fn set_ctrl(&mut self, ctrl: Ctrl) {
        self.ctrl = ctrl;
        self.write(Addr::Ctrl, ctrl.raw_value());
    }

    /// The last trim DAC code written.
    pub fn trim(&self) -> u16 {
        self.trim
    }

    /// Assert (stop) or release the error counters.
    pub fn reset_counters(&mut self, reset: bool) {
        self.set_ctrl(self.ctrl.with_reset(reset));
    }

    pub fn enable_interrupt(&mut self, enable: bool) {
        self.set_ctrl(self.ctrl.with_irq_en(enable));
    }

    /// Pulse the interrupt clear bit. The shadow is left unchanged.
    pub fn clear_interrupt(&mut self) {
        self.write(Addr::Ctrl, self.ctrl.with_irq_clr(true).raw_value());
    }

    /// Select the tuning reference.
    ///
    /// Counters are restarted and the interrupt is enabled unless the mode is
    /// [TuneMode::Disabled].
    pub fn set_tune_mode(&mut self, mode: TuneMode) {
        self.enable_interrupt(false);
        self.set_ctrl(self.ctrl.with_tune_mode(mode));
        self.reset_counters(true);
        if mode != TuneMode::Disabled {
            self.reset_counters(false);
            self.enable_interrupt(true);
        }
    }

    /// Select the tuning reference from its register encoding.
    ///
    /// Unknown encodings are ignored.
    pub fn set_tune_mode_raw(&mut self, mode: u8) {
        match TuneMode::try_from(mode) {
            Ok(mode) => self.set_tune_mode(mode),
            Err(mode) => log::debug!("Ignoring invalid tune mode {mode}"),
        }
    }

    /// Read a little endian 32 bit count starting at `addr`.
    pub fn read_count(&mut self, addr: Addr) -> i32 {
        let base = addr as u8;
        let mut bytes = [0; 4];
        for (offset, byte) in (0..).zip(bytes.iter_mut()) {
            *byte = self.regs.read(base + offset);
        }
        i32::from_le_bytes(bytes)
    }

    /// Write the trim DAC code, LSB first.
    pub fn write_trim_dac(&mut self, code: u16) {
        self.trim = code;
        let [lsb, msb] = code.to_le_bytes();
        self.write(Addr::DacLsb, lsb);
        self.write(Addr::DacMsb, msb);
    }

    pub fn status(&mut self) -> Status {
        Status::new_with_raw_value(self.read(Addr::Stat))
    }

    /// Set the externally visible calibration state.
    pub fn set_state(&mut self, state: u8) {
        self.write(Addr::State, state);
    }

    /// Stop the counters and read out a completed sample.
    ///
    /// The interrupt is left disabled and the counters are held in reset
    /// until re-armed.
    pub fn capture(&mut self) -> ErrorSample {
        self.enable_interrupt(false);
        self.reset_counters(true);

        let mut sample = ErrorSample::default();
        for w in Window::ALL {
            sample.errors[w as usize] = self.read_count(w.addr());
        }

        let status = self.status();
        sample.completed =
            [status.err_1s(), status.err_10s(), status.err_100s()];

        self.clear_interrupt();
        sample
    }

    /// Start tuning against the 1 PPS reference.
    pub fn init(&mut self) {
        self.set_state(0);
        self.set_tune_mode(TuneMode::Pps1);
    }

    pub fn disable(&mut self) {
        self.set_tune_mode(TuneMode::Disabled);
        self.set_state(0);
    }
}
