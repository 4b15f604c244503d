//! Single slot hand-off of error samples from the tamer interrupt to the
//! control loop.
//!
//! There is no queue. A sample published while the previous one has not
//! been taken replaces it. Sample production (once per PPS period) is much
//! slower than the control loop so this only happens if the loop stalls.
//! Overruns are counted.
//!
//! The interrupt source is disabled for the duration of [produce()] and only
//! re-armed by the control loop after it has taken the sample. When producing
//! from a real interrupt handler, this discipline (or a critical section
//! around the mailbox) must be kept.
use vctcxo_tamer::{ErrorSample, Registers, VctcxoTamer};

#[derive(Clone, Debug, Default)]
pub struct Mailbox {
    sample: ErrorSample,
    ready: bool,
    overruns: u32,
}

impl Mailbox {
    /// Place a sample, overwriting any unconsumed one.
    pub fn publish(&mut self, sample: ErrorSample) {
        if self.ready {
            self.overruns = self.overruns.wrapping_add(1);
            log::warn!("Error sample overrun");
        }
        self.sample = sample;
        self.ready = true;
    }

    /// Request processing without a new sample.
    ///
    /// The next [Mailbox::take()] returns the previous sample again.
    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Discard the ready state. The held sample is kept.
    pub fn clear(&mut self) {
        self.ready = false;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn take(&mut self) -> Option<ErrorSample> {
        if core::mem::take(&mut self.ready) {
            Some(self.sample)
        } else {
            None
        }
    }

    /// Number of samples lost to overwriting.
    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}

/// Capture a sample from the tamer and publish it.
pub fn produce<R: Registers>(
    tamer: &mut VctcxoTamer<R>,
    mailbox: &mut Mailbox,
) {
    mailbox.publish(tamer.capture());
}
