//! Test harness for chippy unit and integration tests
//!
//! Helpers to assemble source, run it on a VM that captures its output, and
//! match decoded instruction sequences against patterns.
//!
//! # Example
//!
//! ```rust
//! use chippy::test_harness::*;
//! use chippy::{Opcode, Register};
//!
//! let program = instructions("LDR $r1, #10\nADD $r1, #5\nPRINT $r1\nHLT").unwrap();
//! assert_has_pattern(&program, &[
//!     InstructionPattern::Alu {
//!         opcode: Pat::Exact(Opcode::Add),
//!         dst: Pat::Exact(Register::general(1).unwrap()),
//!         src: Pat::Any,
//!     },
//!     InstructionPattern::Print { reg: Pat::Any },
//! ]);
//!
//! let execution = run_source("LDR $r1, #10\nADD $r1, #5\nPRINT $r1\nHLT").unwrap();
//! assert_eq!(execution.output, "15\n");
//! ```

#![allow(
    clippy::must_use_candidate,
    clippy::manual_assert,
    clippy::missing_panics_doc
)]

use crate::disassembler::listing;
use crate::isa::{Instruction, Opcode, OpcodeTable, Operand, Register};
use crate::vm::{Flags, Registers, State, Vm};
use crate::{Error, Result, assemble};

/// Steps after which [`run_rom`] gives up on a program.
pub const STEP_LIMIT: u64 = 100_000;

/// Assemble `source` and decode it back into instructions.
pub fn instructions(source: &str) -> Result<Vec<Instruction>> {
    let rom = assemble(source)?;
    Ok(extract_instructions(&rom))
}

/// Decode every whole word of a ROM that decodes under the standard table.
pub fn extract_instructions(rom: &[u8]) -> Vec<Instruction> {
    listing(OpcodeTable::standard(), rom)
        .into_iter()
        .filter_map(|line| line.instruction().cloned())
        .collect()
}

/// Final machine state of a run.
#[derive(Debug, Clone)]
pub struct Execution {
    pub output: String,
    pub registers: Registers,
    pub flags: Flags,
    pub pc: u16,
    pub steps: u64,
}

impl Execution {
    pub fn register(&self, register: Register) -> u8 {
        self.registers.get(register)
    }

    /// Value of general-purpose register `r{n}`.
    pub fn r(&self, n: u8) -> u8 {
        let register =
            Register::general(n).unwrap_or_else(|| panic!("r{n} is not a general register"));
        self.registers.get(register)
    }
}

/// Assemble and run `source` until it halts.
pub fn run_source(source: &str) -> Result<Execution> {
    let rom = assemble(source)?;
    run_rom(&rom)
}

/// Run a ROM until it halts, capturing PRINT output.
pub fn run_rom(rom: &[u8]) -> Result<Execution> {
    let mut vm = Vm::with_output(Vec::new());
    vm.load(rom)?;
    while vm.step()? == State::Running {
        if vm.steps() >= STEP_LIMIT {
            return Err(Error::Internal(format!(
                "program still running after {STEP_LIMIT} steps"
            )));
        }
    }

    let registers = vm.registers().clone();
    let flags = vm.flags();
    let pc = vm.pc();
    let steps = vm.steps();
    let output = String::from_utf8(vm.into_output())
        .map_err(|e| Error::Internal(format!("output is not UTF-8: {e}")))?;
    Ok(Execution {
        output,
        registers,
        flags,
        pc,
        steps,
    })
}

/// Pattern matching for instruction fields
#[derive(Debug, Clone)]
pub enum Pat<T> {
    /// Match any value
    Any,
    /// Match exact value
    Exact(T),
    /// Match if value satisfies predicate
    Predicate(fn(&T) -> bool),
}

impl<T: PartialEq> Pat<T> {
    /// Check if a value matches this pattern
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Pat::Any => true,
            Pat::Exact(expected) => value == expected,
            Pat::Predicate(pred) => pred(value),
        }
    }
}

/// Pattern for matching decoded instructions in tests
#[derive(Debug, Clone)]
pub enum InstructionPattern {
    /// Match any instruction
    Any,
    /// Match an opcode with one pattern per operand
    Op {
        opcode: Opcode,
        operands: Vec<Pat<Operand>>,
    },
    /// MOV or LDR into a register
    Load {
        opcode: Pat<Opcode>,
        dst: Pat<Register>,
        src: Pat<Operand>,
    },
    Store {
        src: Pat<Register>,
        dst: Pat<Operand>,
    },
    Alu {
        opcode: Pat<Opcode>,
        dst: Pat<Register>,
        src: Pat<Operand>,
    },
    Compare {
        reg: Pat<Register>,
        src: Pat<Operand>,
    },
    Jump {
        opcode: Pat<Opcode>,
        target: Pat<Operand>,
    },
    Print {
        reg: Pat<Register>,
    },
    Halt,
}

impl InstructionPattern {
    /// Check if an instruction matches this pattern
    pub fn matches(&self, instr: &Instruction) -> bool {
        use InstructionPattern as P;

        let opcode = instr.opcode;
        match (self, instr.operands.as_slice()) {
            (P::Any, _) => true,
            (
                P::Op {
                    opcode: expected,
                    operands: pats,
                },
                operands,
            ) => {
                opcode == *expected
                    && pats.len() == operands.len()
                    && pats.iter().zip(operands).all(|(pat, op)| pat.matches(op))
            }
            (
                P::Load {
                    opcode: o_pat,
                    dst: d_pat,
                    src: s_pat,
                },
                [Operand::Register(dst), src],
            ) => {
                matches!(opcode, Opcode::Mov | Opcode::Ldr)
                    && o_pat.matches(&opcode)
                    && d_pat.matches(dst)
                    && s_pat.matches(src)
            }
            (
                P::Store {
                    src: s_pat,
                    dst: d_pat,
                },
                [Operand::Register(src), dst],
            ) => opcode == Opcode::Str && s_pat.matches(src) && d_pat.matches(dst),
            (
                P::Alu {
                    opcode: o_pat,
                    dst: d_pat,
                    src: s_pat,
                },
                [Operand::Register(dst), src],
            ) => opcode.is_alu() && o_pat.matches(&opcode) && d_pat.matches(dst) && s_pat.matches(src),
            (
                P::Compare {
                    reg: r_pat,
                    src: s_pat,
                },
                [Operand::Register(reg), src],
            ) => opcode == Opcode::Cmp && r_pat.matches(reg) && s_pat.matches(src),
            (
                P::Jump {
                    opcode: o_pat,
                    target: t_pat,
                },
                [target],
            ) => opcode.is_jump() && o_pat.matches(&opcode) && t_pat.matches(target),
            (P::Print { reg: r_pat }, [Operand::Register(reg)]) => {
                opcode == Opcode::Print && r_pat.matches(reg)
            }
            (P::Halt, []) => opcode == Opcode::Hlt,
            _ => false,
        }
    }
}

/// Find a pattern in an instruction sequence
///
/// Returns the index of the first match, or None if not found
pub fn find_pattern(instructions: &[Instruction], pattern: &[InstructionPattern]) -> Option<usize> {
    if pattern.is_empty() {
        return Some(0);
    }

    'outer: for start in 0..=instructions.len().saturating_sub(pattern.len()) {
        for (i, pat) in pattern.iter().enumerate() {
            match instructions.get(start + i) {
                Some(instr) if pat.matches(instr) => {}
                _ => continue 'outer,
            }
        }
        return Some(start);
    }
    None
}

/// Assert that an instruction sequence contains a pattern
///
/// Panics with a descriptive message if the pattern is not found
pub fn assert_has_pattern(instructions: &[Instruction], pattern: &[InstructionPattern]) {
    if find_pattern(instructions, pattern).is_none() {
        panic!(
            "Pattern not found in instruction sequence.\n\nExpected pattern:\n{}\n\nActual instructions:\n{}",
            format_patterns(pattern),
            format_instructions(instructions)
        );
    }
}

/// Assert that instructions match a pattern exactly
pub fn assert_matches(instructions: &[Instruction], pattern: &[InstructionPattern]) {
    if instructions.len() != pattern.len() {
        panic!(
            "Instruction count mismatch: expected {}, got {}.\n\nExpected pattern:\n{}\n\nActual instructions:\n{}",
            pattern.len(),
            instructions.len(),
            format_patterns(pattern),
            format_instructions(instructions)
        );
    }

    for (i, (instr, pat)) in instructions.iter().zip(pattern).enumerate() {
        if !pat.matches(instr) {
            panic!(
                "Instruction mismatch at index {i}:\nExpected: {pat:?}\nActual:   {instr}\n\nFull instructions:\n{}",
                format_instructions(instructions)
            );
        }
    }
}

fn format_patterns(patterns: &[InstructionPattern]) -> String {
    patterns
        .iter()
        .map(|p| format!("  {p:?}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_instructions(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .map(|i| format!("  {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count instructions with a specific opcode
pub fn count_opcode(instructions: &[Instruction], opcode: Opcode) -> usize {
    instructions.iter().filter(|i| i.opcode == opcode).count()
}

/// Check if an instruction sequence contains a specific opcode
pub fn has_opcode(instructions: &[Instruction], opcode: Opcode) -> bool {
    instructions.iter().any(|i| i.opcode == opcode)
}
