#![allow(dead_code)]

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal_1::digital::{ErrorKind, ErrorType, InputPin};
use ppsdo::vctcxo_tamer::{Addr, Registers, Window};

/// Simulated tamer register bank.
///
/// The interrupt clear bit is self-clearing and acknowledges the status
/// register. Complete trim DAC writes (LSB then MSB) are recorded.
pub struct Sim {
    pub regs: [u8; 0x40],
    pub dac_writes: Vec<u16>,
    /// Linear oscillator model: error is `(zero - code) / divider`.
    pub model: Option<(u16, i32)>,
}

impl Default for Sim {
    fn default() -> Self {
        Self {
            regs: [0; 0x40],
            dac_writes: Vec::new(),
            model: None,
        }
    }
}

impl Sim {
    pub fn ctrl(&self) -> u8 {
        self.regs[Addr::Ctrl as usize]
    }

    pub fn state(&self) -> u8 {
        self.regs[Addr::State as usize]
    }

    pub fn dac(&self) -> u16 {
        u16::from_le_bytes([
            self.regs[Addr::DacLsb as usize],
            self.regs[Addr::DacMsb as usize],
        ])
    }

    pub fn set_count(&mut self, window: Window, count: i32) {
        let base = window.addr() as usize;
        self.regs[base..base + 4].copy_from_slice(&count.to_le_bytes());
    }

    pub fn set_status(&mut self, status: u8) {
        self.regs[Addr::Stat as usize] = status;
    }

    /// Complete the given windows with the given error counts.
    pub fn complete(&mut self, errors: [i32; 3], completed: [bool; 3]) {
        let mut status = 0;
        for w in Window::ALL {
            self.set_count(w, errors[w as usize]);
            if completed[w as usize] {
                status |= 1 << w as u8;
            }
        }
        self.set_status(status);
    }

    /// Complete the short window with the error given by the model.
    pub fn complete_model(&mut self) {
        let (zero, divider) = self.model.unwrap();
        let error = (zero as i32 - self.dac() as i32) / divider;
        self.complete([error, 0, 0], [true, false, false]);
    }
}

impl Registers for Sim {
    fn read(&mut self, addr: u8) -> u8 {
        self.regs[addr as usize]
    }

    fn write(&mut self, addr: u8, data: u8) {
        if addr == Addr::Ctrl as u8 && data & 0b100 != 0 {
            self.set_status(0);
            self.regs[addr as usize] = data & !0b100;
        } else {
            self.regs[addr as usize] = data;
        }
        if addr == Addr::DacMsb as u8 {
            let dac = self.dac();
            self.dac_writes.push(dac);
        }
    }
}

/// Enable input driven by the test.
pub struct Switch<'a>(pub &'a Cell<bool>);

impl ErrorType for Switch<'_> {
    type Error = Infallible;
}

impl InputPin for Switch<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// Enable input that can not be read.
pub struct Broken;

impl ErrorType for Broken {
    type Error = ErrorKind;
}

impl InputPin for Broken {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Err(ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Err(ErrorKind::Other)
    }
}

/// Enable input that fails to read while its level is `None`.
pub struct Flaky<'a>(pub &'a Cell<Option<bool>>);

impl ErrorType for Flaky<'_> {
    type Error = ErrorKind;
}

impl InputPin for Flaky<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.get().ok_or(ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
