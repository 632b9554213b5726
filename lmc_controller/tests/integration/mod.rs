mod common;

mod homing;
mod protocol;
mod safety;
mod scenarios;
