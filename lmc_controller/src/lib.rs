//! # LMC Controller Library
//!
//! Coordinated stepper motion for a five-axis lab machine, driven over a
//! line-oriented serial protocol.
//!
//! ## Components
//!
//! | Module         | Role                                                      |
//! |----------------|-----------------------------------------------------------|
//! | [`pins`]       | Endstop level normalization                               |
//! | [`axis`]       | Axis driver: step/dir/enable lines and the step counter   |
//! | [`motion`]     | Trapezoid planning and the multi-axis step generator      |
//! | [`homing`]     | Four-phase homing, per axis and for the clamp pair        |
//! | [`supervisor`] | Operation exclusion, emergency latch, timeouts, watchdog  |
//! | [`power`]      | Motor-power lifecycle                                     |
//! | [`protocol`]   | Line assembly, command parsing, responses                 |
//! | [`aux_io`]     | Control outputs, waste / rotor inputs, load cell          |
//! | [`controller`] | The main-loop value tying everything together             |
//!
//! ## No Allocation on the Control Path
//!
//! Every runtime buffer is sized at compile time from
//! [`NUM_MOTORS`](lmc_common::consts::NUM_MOTORS) and
//! [`MAX_COMMAND_LENGTH`](lmc_common::consts::MAX_COMMAND_LENGTH).
//! Nothing is allocated after [`Controller::new`](controller::Controller::new).

pub mod aux_io;
pub mod axis;
pub mod controller;
pub mod homing;
pub mod motion;
pub mod pins;
pub mod power;
pub mod protocol;
pub mod supervisor;

pub use controller::{Controller, ControllerError};
