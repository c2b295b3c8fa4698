//! Instruction set of the linear CPU.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction definitions (opcode, mnemonic, argument count,
//! description) and invokes a callback macro for code generation, so other
//! modules can generate instruction-related code without duplicating the
//! table.
//!
//! This module generates:
//! - The [`InstId`] enum with opcode mappings
//! - `TryFrom<u8>` for decoding opcodes
//! - The [`InstLib`] catalogue with the argument-alias table

use crate::errors::VmError;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::REGS;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Arguments of every instruction index the 16 registers (or, for `SetReg`,
/// carry the literal value); only the first `arity` arguments are
/// meaningful.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            /// INC reg ; reg += 1
            Inc = 0x00, "Inc" => 1, "Increment value in register Arg1",
            /// DEC reg ; reg -= 1
            Dec = 0x01, "Dec" => 1, "Decrement value in register Arg1",
            /// NOT reg ; reg = !reg
            Not = 0x02, "Not" => 1, "Logically toggle value in register Arg1",
            /// SETREG reg, value ; reg = value
            SetReg = 0x03, "SetReg" => 2, "Set Arg1 to numerical value of Arg2",
            /// ADD rs1, rs2, rd ; rd = rs1 + rs2
            Add = 0x04, "Add" => 3, "Arg3 = Arg1 + Arg2",
            /// SUB rs1, rs2, rd ; rd = rs1 - rs2
            Sub = 0x05, "Sub" => 3, "Arg3 = Arg1 - Arg2",
            /// MULT rs1, rs2, rd ; rd = rs1 * rs2
            Mult = 0x06, "Mult" => 3, "Arg3 = Arg1 * Arg2",
            /// DIV rs1, rs2, rd ; rd = rs1 / rs2 (counts an error on rs2 == 0)
            Div = 0x07, "Div" => 3, "Arg3 = Arg1 / Arg2",
            /// MOD rs1, rs2, rd ; behaves as DIV (counts an error on rs2 == 0)
            Mod = 0x08, "Mod" => 3, "Arg3 = Arg1 % Arg2",
            /// TESTEQU rs1, rs2, rd ; rd = (rs1 == rs2)
            TestEqu = 0x09, "TestEqu" => 3, "Arg3 = (Arg1 == Arg2)",
            /// TESTNEQU rs1, rs2, rd ; rd = (rs1 != rs2)
            TestNEqu = 0x0A, "TestNEqu" => 3, "Arg3 = (Arg1 != Arg2)",
            /// TESTLESS rs1, rs2, rd ; rd = (rs1 < rs2)
            TestLess = 0x0B, "TestLess" => 3, "Arg3 = (Arg1 < Arg2)",
            /// IF test, scope ; enter scope, skipped when test == 0
            If = 0x0C, "If" => 2, "If Arg1 != 0, enter scope Arg2; else skip over scope",
            /// WHILE test, scope ; looping scope, skipped when test == 0
            While = 0x0D, "While" => 2, "Until Arg1 != 0, repeat scope Arg2; else skip over scope",
            /// COUNTDOWN reg, scope ; looping scope that decrements reg each pass
            Countdown = 0x0E, "Countdown" => 3, "Countdown Arg1 to zero; scope to Arg2",
            /// BREAK scope ; fast-forward past scope
            Break = 0x0F, "Break" => 1, "Break out of scope Arg1",
            /// SCOPE scope ; open scope
            Scope = 0x10, "Scope" => 1, "Set scope to Arg1",
            /// DEFINE fun, scope ; record function body, then skip it
            Define = 0x11, "Define" => 2, "Build a function called Arg1 in scope Arg2",
            /// CALL fun ; invoke a previously defined function
            Call = 0x12, "Call" => 1, "Call previously defined function called Arg1",
            /// PUSH reg, stack ; stack <- reg (dropped at capacity)
            Push = 0x13, "Push" => 2, "Push register Arg1 onto stack Arg2",
            /// POP stack, reg ; reg <- stack (0 when empty)
            Pop = 0x14, "Pop" => 2, "Pop stack Arg1 into register Arg2",
            /// INPUT buf, reg ; reg = inputs[buf]
            Input = 0x15, "Input" => 2, "Pull next value from input buffer Arg1 into register Arg2",
            /// OUTPUT reg, buf ; outputs[buf] = reg
            Output = 0x16, "Output" => 2, "Push reg Arg1 into output buffer Arg2",
            /// COPYVAL rs, rd ; rd = rs
            CopyVal = 0x17, "CopyVal" => 2, "Copy reg Arg1 into reg Arg2",
            /// SCOPEREG reg ; back up reg, restored when the scope exits
            ScopeReg = 0x18, "ScopeReg" => 1, "Backup reg Arg1; restore at end of scope",
            /// Never emitted by synthesis; executing it is a logic error.
            Unknown = 0x19, "Unknown" => 0, "Error: Unknown instruction used.",
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $arity:expr, $desc:literal
        ),* $(,)?
    ) => {
        /// Instruction id of the linear CPU.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum InstId {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for InstId {
            type Error = VmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(InstId::$name), )*
                    _ => Err(VmError::InvalidOpcode(value)),
                }
            }
        }

        impl InstId {
            /// Every instruction id, in opcode order.
            pub const ALL: &'static [InstId] = &[ $( InstId::$name, )* ];

            /// Returns the mnemonic used in disassembly.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( InstId::$name => $mnemonic, )*
                }
            }

            /// Returns how many of the three arguments this instruction reads.
            pub const fn num_args(&self) -> usize {
                match self {
                    $( InstId::$name => $arity, )*
                }
            }

            /// Returns the human description of this instruction.
            pub const fn describe(&self) -> &'static str {
                match self {
                    $( InstId::$name => $desc, )*
                }
            }
        }
    };
}

for_each_instruction!(define_instructions);

/// Read-only catalogue of the linear CPU's instruction set.
///
/// Wraps the generated [`InstId`] metadata and adds the argument-alias
/// table: for every register `i`, both the decimal string (`"5"`) and the
/// register name (`"RegF"`) resolve to `i`.
pub struct InstLib {
    arg_aliases: HashMap<String, u8>,
}

impl InstLib {
    fn new() -> Self {
        let mut arg_aliases = HashMap::new();
        for i in 0..REGS as u8 {
            arg_aliases.insert(i.to_string(), i);
            arg_aliases.insert(format!("Reg{}", (b'A' + i) as char), i);
        }
        Self { arg_aliases }
    }

    /// Returns the mnemonic of `id`.
    pub fn name_of(&self, id: InstId) -> &'static str {
        id.mnemonic()
    }

    /// Returns the argument count of `id`.
    pub fn arity_of(&self, id: InstId) -> usize {
        id.num_args()
    }

    /// Returns the description of `id`.
    pub fn describe(&self, id: InstId) -> &'static str {
        id.describe()
    }

    /// Looks an instruction up by mnemonic.
    pub fn id_of(&self, name: &str) -> Result<InstId, VmError> {
        InstId::ALL
            .iter()
            .copied()
            .find(|id| id.mnemonic() == name)
            .ok_or_else(|| VmError::UnknownInstruction(name.to_string()))
    }

    /// Resolves a symbolic argument (`"3"`, `"RegD"`) to its value.
    pub fn resolve_arg(&self, symbol: &str) -> Result<u8, VmError> {
        self.arg_aliases
            .get(symbol)
            .copied()
            .ok_or_else(|| VmError::UnknownArgument(symbol.to_string()))
    }
}

/// Returns the process-wide instruction catalogue of the linear CPU.
pub fn inst_lib() -> &'static InstLib {
    static LIB: OnceLock<InstLib> = OnceLock::new();
    LIB.get_or_init(InstLib::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_roundtrip() {
        for &id in InstId::ALL {
            assert_eq!(InstId::try_from(id as u8).unwrap(), id);
        }
    }

    #[test]
    fn try_from_invalid_opcode() {
        assert_eq!(InstId::try_from(0xFF), Err(VmError::InvalidOpcode(0xFF)));
    }

    #[test]
    fn catalogue_arities() {
        let lib = inst_lib();
        assert_eq!(lib.arity_of(InstId::Inc), 1);
        assert_eq!(lib.arity_of(InstId::SetReg), 2);
        assert_eq!(lib.arity_of(InstId::Add), 3);
        assert_eq!(lib.arity_of(InstId::Countdown), 3);
        assert_eq!(lib.arity_of(InstId::Unknown), 0);
    }

    #[test]
    fn catalogue_names() {
        let lib = inst_lib();
        assert_eq!(lib.name_of(InstId::TestNEqu), "TestNEqu");
        assert_eq!(lib.id_of("ScopeReg").unwrap(), InstId::ScopeReg);
        assert_eq!(
            lib.id_of("Frobnicate"),
            Err(VmError::UnknownInstruction("Frobnicate".to_string()))
        );
    }

    #[test]
    fn argument_aliases() {
        let lib = inst_lib();
        assert_eq!(lib.resolve_arg("0").unwrap(), 0);
        assert_eq!(lib.resolve_arg("15").unwrap(), 15);
        assert_eq!(lib.resolve_arg("RegA").unwrap(), 0);
        assert_eq!(lib.resolve_arg("RegC").unwrap(), 2);
        assert_eq!(lib.resolve_arg("RegP").unwrap(), 15);
        assert_eq!(
            lib.resolve_arg("RegQ"),
            Err(VmError::UnknownArgument("RegQ".to_string()))
        );
    }
}
