//! Tamer control loop
//!
//! # Design
//! The loop is polled without any delay. Each iteration:
//! 1. Samples the enable input and detects edges.
//! 2. Checks the tamer status register. If any error count is available,
//!    the sample is captured and published to the [Mailbox]. The tamer
//!    interrupt line is not wired to a vector, detection is by polling.
//! 3. On a rising enable edge the tamer is initialized and calibration is
//!    restarted. The mailbox is marked ready so that the first calibration
//!    step ([TamerPhase::CoarseMin]) runs in this same iteration.
//! 4. On a falling enable edge the tamer is disabled and calibration is
//!    reset.
//! 5. A ready sample is handed to the [Calibrator]. Afterwards the counters
//!    are released and the interrupt re-armed for the next sample.
//!
//! There are no timeouts. Without a new sample, calibration stays in its
//! current phase.
use embedded_hal_1::digital::{Error as _, InputPin};
use vctcxo_tamer::{Registers, VctcxoTamer};

use crate::{
    calibration::{Calibrator, TamerPhase},
    mailbox::{self, Mailbox},
    settings::{Error, Settings},
    telemetry::Telemetry,
};

pub struct ControlLoop<R, P> {
    tamer: VctcxoTamer<R>,
    enable: P,
    enabled: bool,
    mailbox: Mailbox,
    calibrator: Calibrator,
}

impl<R: Registers, P: InputPin> ControlLoop<R, P> {
    /// Construct the control loop and write the default trim code.
    ///
    /// # Args
    /// * `regs` - The tamer register bank.
    /// * `enable` - The tamer enable input.
    /// * `settings` - Trim DAC configuration.
    pub fn new(regs: R, enable: P, settings: &Settings) -> Result<Self, Error> {
        let range = settings.validate()?;
        let mut tamer = VctcxoTamer::new(regs);
        tamer.write_trim_dac(settings.default_trim);
        Ok(Self {
            tamer,
            enable,
            enabled: false,
            mailbox: Mailbox::default(),
            calibrator: Calibrator::new(range, settings.default_trim),
        })
    }

    pub fn tamer(&self) -> &VctcxoTamer<R> {
        &self.tamer
    }

    pub fn tamer_mut(&mut self) -> &mut VctcxoTamer<R> {
        &mut self.tamer
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn telemetry(&self) -> Telemetry {
        let line = self.calibrator.line();
        Telemetry {
            enabled: self.enabled,
            phase: self.calibrator.phase(),
            trim: self.tamer.trim(),
            slope: line.slope,
            y_intercept: line.y_intercept,
            overruns: self.mailbox.overruns(),
        }
    }

    fn sample_enable(&mut self) -> bool {
        match self.enable.is_high() {
            Ok(level) => level,
            Err(e) => {
                log::warn!("Enable input: {:?}", e.kind());
                self.enabled
            }
        }
    }

    /// Run one iteration.
    pub fn poll(&mut self) {
        let was_enabled = self.enabled;
        self.enabled = self.sample_enable();

        if self.tamer.status().pending() {
            mailbox::produce(&mut self.tamer, &mut self.mailbox);
        }

        match (was_enabled, self.enabled) {
            (false, true) => {
                log::info!("Tamer enabled");
                self.tamer.init();
                self.calibrator.reset();
                self.mailbox.mark_ready();
            }
            (true, false) => {
                log::info!("Tamer disabled");
                self.tamer.disable();
                self.calibrator.reset();
                self.mailbox.clear();
            }
            _ => {}
        }

        if let Some(sample) = self.mailbox.take() {
            let phase = self.calibrator.phase();
            if self.calibrator.step(&mut self.tamer, &sample) != phase {
                self.report();
            }
            self.tamer.reset_counters(false);
            self.tamer.enable_interrupt(true);
        }
    }

    fn report(&self) {
        match self.telemetry().to_json::<192>() {
            Some(json) => log::info!("{json}"),
            None => log::info!("{:?}", self.telemetry()),
        }
    }

    /// Poll forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }
}

impl<R, P> ControlLoop<R, P> {
    /// Whether coarse calibration has completed.
    pub fn calibrated(&self) -> bool {
        self.calibrator.phase() == TamerPhase::Fine
    }
}
