//! # PPS disciplined VCTCXO
//!
//! The tamer peripheral counts VCTCXO cycles over 1, 10 and 100 PPS periods
//! and reports the frequency error. This firmware calibrates the trim DAC in
//! two coarse steps at either end of the DAC range and then keeps correcting
//! it proportionally to the measured error.
//!
//! Tuning is started and stopped by the enable CSR.
//!
//! ## Settings
//! The trim DAC settings are fixed at build time. If `PPSDO_SETTINGS` is set
//! when building, it is parsed as settings JSON, e.g.
//! `PPSDO_SETTINGS='{"dac_bits":12,"default_trim":2048}'`. Otherwise the
//! defaults apply.
//!
//! ## Logging
//! Log messages and telemetry are emitted over RTT.
#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};

use ppsdo::{
    control::ControlLoop,
    hardware::{CsrBit, Mmio},
    settings::Settings,
};

// SoC memory map
const TAMER_BASE: usize = 0x4000_0000;
const ENABLE_CSR: usize = 0x4000_1000;

#[cortex_m_rt::entry]
fn main() -> ! {
    let channels = rtt_target::rtt_init_default!();
    rtt_target::set_print_channel(channels.up.0);

    static LOGGER: rtt_logger::RTTLogger =
        rtt_logger::RTTLogger::new(log::LevelFilter::Info);
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(log::LevelFilter::Trace))
        .unwrap();
    log::info!("Starting");

    // Note(unsafe): The tamer bank and the enable CSR are owned by this loop
    // only.
    let regs = unsafe { Mmio::new(TAMER_BASE) };
    let enable = unsafe { CsrBit::new(ENABLE_CSR, 0) };

    let settings = match option_env!("PPSDO_SETTINGS") {
        Some(json) => match Settings::from_json(json.as_bytes()) {
            Ok(settings) => settings,
            Err(e) => panic!("Invalid settings JSON: {e}"),
        },
        None => Settings::default(),
    };
    log::info!("Settings: {settings:?}");
    let mut tamer = match ControlLoop::new(regs, enable, &settings) {
        Ok(tamer) => tamer,
        Err(e) => panic!("Invalid settings {settings:?}: {e}"),
    };
    tamer.run()
}

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::fmt::Write;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        cortex_m::asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Analogous to panic-rtt-target
    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{}", info).ok();
    }

    cortex_m::asm::udf();
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}
