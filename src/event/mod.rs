//! Event-driven multi-core genetic-programming CPU.
//!
//! Programs are tables of tagged functions; instructions, events, and
//! calls address functions by tag similarity rather than by index. The
//! machine runs up to 64 cores round-robin, each core an independent call
//! stack of frames over three private key-value memories plus one memory
//! shared across the whole machine.
//!
//! # Modules
//!
//! - [`tag`]: Fixed-width bit tags and Hamming matching
//! - [`memory`]: Key-value memories with defaulted reads
//! - [`isa`]: The driver-extensible instruction library
//! - [`vm`]: The [`vm::EventVm`] interpreter

pub mod isa;
pub mod memory;
pub mod tag;
pub mod vm;

pub use isa::{default_lib, InstFn, InstLib};
pub use memory::{Memory, DEFAULT_MEM_VALUE};
pub use tag::{Tag, TAG_WIDTH};
pub use vm::{
    Block, BlockKind, Event, EventKind, EventVm, Function, Instruction, Program, State,
    MAX_CALL_DEPTH, MAX_CORES, MAX_INST_ARGS,
};
