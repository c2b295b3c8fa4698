//! Genetic-programming virtual machines.
//!
//! Two interpreters built to execute evolving programs: a linear,
//! scope-based CPU ([`linear::LinearVm`]) and an event-driven, multi-core
//! CPU with tag-based dispatch ([`event::EventVm`]). An external
//! evolutionary driver constructs programs, steps a machine with
//! `process(n)`, and reads registers, memories, and error counters to
//! evaluate fitness. Runtime faults never abort execution.

pub mod errors;
pub mod event;
pub mod linear;
pub mod utils;
