#![cfg_attr(not(test), no_std)]

pub mod calibration;
pub mod control;
pub mod hardware;
pub mod mailbox;
pub mod settings;
pub mod telemetry;

pub use vctcxo_tamer;
