//! SoC specific peripheral access of the PPSDO firmware
use core::convert::Infallible;

use embedded_hal_1::digital::{ErrorType, InputPin};

pub use vctcxo_tamer::Mmio;

/// A single bit of a memory mapped status CSR used as a digital input.
#[derive(Debug)]
pub struct CsrBit {
    addr: *const u32,
    bit: u8,
}

impl CsrBit {
    /// # Safety
    /// `addr` must point to a readable, aligned 32 bit CSR.
    pub const unsafe fn new(addr: usize, bit: u8) -> Self {
        Self {
            addr: addr as *const u32,
            bit,
        }
    }
}

impl ErrorType for CsrBit {
    type Error = Infallible;
}

impl InputPin for CsrBit {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        // Note(unsafe): Validity of the CSR address is guaranteed by `new()`.
        let word = unsafe { self.addr.read_volatile() };
        Ok((word >> self.bit) & 1 != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}
