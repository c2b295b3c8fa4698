use evovm_derive::Error;

/// Errors surfaced by the program-construction API.
///
/// Interpreter execution never returns these: runtime faults (division by
/// zero, exhausted resources, stale call targets) are counted or ignored
/// per the hardware's error policy and inspected through the error
/// counters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    /// Opcode byte with no instruction definition.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),
    /// Unrecognized instruction mnemonic.
    #[error("unknown instruction name: {0}")]
    UnknownInstruction(String),
    /// Symbolic argument with no alias entry.
    #[error("unknown argument alias: {0}")]
    UnknownArgument(String),
    /// Genome position out of range.
    #[error("position {pos} out of range (genome length {len})")]
    InvalidPosition { pos: usize, len: usize },
    /// Function id out of range for the loaded program.
    #[error("function {id} out of range (program has {count} functions)")]
    InvalidFunction { id: usize, count: usize },
}
