//! Fetch/decode/execute loop over 4 KiB of memory and sixteen 8-bit registers.

mod flags;
mod memory;
mod registers;

pub use flags::Flags;
pub use memory::Memory;
pub use registers::Registers;

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::isa::{
    self, Address, Instruction, LOAD_ADDRESS, MEMORY_SIZE, Opcode, OpcodeTable, Operand,
    Register, WORD_SIZE, WordError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// What an executed instruction does to the program counter.
enum Flow {
    Next,
    Jump(u16),
    Halt,
}

pub struct Vm<'t, W: Write = io::Stdout> {
    table: &'t OpcodeTable,
    memory: Memory,
    registers: Registers,
    flags: Flags,
    pc: u16,
    /// One past the last loaded ROM byte.
    rom_end: u16,
    state: State,
    steps: u64,
    output: W,
}

impl Vm<'static, io::Stdout> {
    /// VM over the standard opcode table, printing to stdout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Vm<'static, io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Vm<'static, W> {
    #[must_use]
    pub fn with_output(output: W) -> Self {
        Vm::with_table(OpcodeTable::standard(), output)
    }
}

impl<'t, W: Write> Vm<'t, W> {
    #[must_use]
    pub fn with_table(table: &'t OpcodeTable, output: W) -> Self {
        Self {
            table,
            memory: Memory::new(),
            registers: Registers::default(),
            flags: Flags::default(),
            pc: LOAD_ADDRESS,
            rom_end: LOAD_ADDRESS,
            state: State::Running,
            steps: 0,
            output,
        }
    }

    /// Resets the machine and copies `rom` to the load address.
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        let start = usize::from(LOAD_ADDRESS);
        let capacity = MEMORY_SIZE - start;
        if rom.len() > capacity {
            return Err(Error::RomTooLarge {
                size: rom.len(),
                capacity,
            });
        }

        self.memory.load(start, rom);
        self.registers = Registers::default();
        self.flags = Flags::default();
        self.pc = LOAD_ADDRESS;
        self.rom_end = (start + rom.len()) as u16;
        self.state = State::Running;
        self.steps = 0;
        tracing::debug!(bytes = rom.len(), "ROM loaded");
        Ok(())
    }

    /// Executes one instruction. A halted machine stays halted.
    pub fn step(&mut self) -> Result<State> {
        if self.state == State::Halted {
            return Ok(State::Halted);
        }

        let pc = self.pc;
        let word = self.fetch()?;
        let instruction = match isa::decode(self.table, word) {
            Ok(instruction) => instruction,
            Err(WordError::UnknownOpcode(opcode)) => {
                tracing::warn!(
                    pc = format_args!("{pc:#06x}"),
                    opcode = format_args!("{opcode:#04x}"),
                    "undefined opcode, halting"
                );
                self.state = State::Halted;
                return Ok(State::Halted);
            }
            Err(_) => return Err(Error::MalformedInstruction { pc, word }),
        };
        tracing::trace!(pc = format_args!("{pc:#06x}"), "{instruction}");

        self.steps += 1;
        match self.execute(&instruction)? {
            Flow::Next => self.pc = pc.wrapping_add(WORD_SIZE),
            Flow::Jump(target) => self.pc = target,
            Flow::Halt => self.state = State::Halted,
        }
        Ok(self.state)
    }

    /// Steps until the machine halts.
    pub fn run(&mut self) -> Result<()> {
        while self.step()? == State::Running {}
        tracing::debug!(steps = self.steps, "halted");
        Ok(())
    }

    fn fetch(&self) -> Result<u32> {
        let pc = self.pc;
        if pc < LOAD_ADDRESS {
            return Err(Error::PcOutsideRom { pc });
        }
        if u32::from(pc) + u32::from(WORD_SIZE) > u32::from(self.rom_end) {
            return Err(Error::TruncatedInstruction { pc });
        }
        self.memory
            .read_word(u32::from(pc))
            .ok_or(Error::TruncatedInstruction { pc })
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<Flow> {
        let operands = instruction.operands.as_slice();
        let opcode = instruction.opcode;

        match (opcode, operands) {
            (Opcode::Hlt, []) => return Ok(Flow::Halt),
            (Opcode::Mov | Opcode::Ldr, [Operand::Register(rd), source]) => {
                let value = self.value(source)?;
                self.registers.set(*rd, value);
            }
            (Opcode::Str, [Operand::Register(rs), destination]) => {
                let address = self.effective_address(destination)?;
                let value = self.registers.get(*rs);
                self.memory
                    .write(address, value)
                    .ok_or_else(|| self.out_of_bounds(address))?;
            }
            (Opcode::Print, [Operand::Register(register)]) => {
                writeln!(self.output, "{}", self.registers.get(*register))?;
            }
            (Opcode::Cmp, [Operand::Register(register), source]) => {
                let lhs = i32::from(self.registers.get(*register));
                let rhs = self.operand_value(source)?;
                self.registers.set(Register::CMP, (lhs - rhs) as u8);
                self.flags.compare(lhs.cmp(&rhs));
            }
            (opcode, [Operand::Register(rd), source]) if opcode.is_alu() => {
                self.alu(opcode, *rd, source)?;
            }
            (opcode, [target]) if opcode.is_jump() => {
                if self.flags.jump_taken(opcode) {
                    let address = self.effective_address(target)?;
                    if address as usize >= MEMORY_SIZE {
                        return Err(self.out_of_bounds(address));
                    }
                    return Ok(Flow::Jump(address as u16));
                }
            }
            _ => return Err(self.unexpected(instruction)),
        }
        Ok(Flow::Next)
    }

    fn alu(&mut self, opcode: Opcode, rd: Register, source: &Operand) -> Result<()> {
        let lhs = i32::from(self.registers.get(rd));
        let rhs = self.operand_value(source)?;
        self.flags.clear_arithmetic();

        let result = match opcode {
            Opcode::Add => lhs + rhs,
            Opcode::Sub => lhs - rhs,
            Opcode::Mul => lhs * rhs,
            Opcode::Div => {
                if rhs == 0 {
                    self.flags.set(Flags::DIVIDE_BY_ZERO);
                    return Ok(());
                }
                lhs / rhs
            }
            Opcode::Xor => lhs ^ rhs,
            Opcode::And => lhs & rhs,
            Opcode::Or => lhs | rhs,
            Opcode::Not => !rhs & 0xFF,
            other => return Err(Error::Internal(format!("{other:?} is not an ALU opcode"))),
        };

        if result > 0xFF {
            self.flags.set(Flags::OVERFLOW);
        }
        if result < 0 {
            self.flags.set(Flags::UNDERFLOW);
        }
        self.registers.set(rd, result as u8);
        Ok(())
    }

    /// Arithmetic value of a source operand. Immediates keep all 16 bits so
    /// CMP and the ALU see the number that was written.
    fn operand_value(&self, operand: &Operand) -> Result<i32> {
        match operand {
            Operand::Immediate(value) => Ok(i32::from(*value)),
            other => self.value(other).map(i32::from),
        }
    }

    /// Byte value of a source operand; immediates contribute their low byte.
    fn value(&self, operand: &Operand) -> Result<u8> {
        match operand {
            Operand::Immediate(value) => Ok(*value as u8),
            Operand::Register(register) => Ok(self.registers.get(*register)),
            memory => {
                let address = self.effective_address(memory)?;
                self.memory
                    .read(address)
                    .ok_or_else(|| self.out_of_bounds(address))
            }
        }
    }

    fn effective_address(&self, operand: &Operand) -> Result<u32> {
        let register = |register: &Register| u32::from(self.registers.get(*register));
        Ok(match operand {
            Operand::Direct(address) => u32::from(*address),
            Operand::Indirect(Address::Absolute(pointer)) => {
                let pointer = u32::from(*pointer);
                let target = self
                    .memory
                    .read_u16(pointer)
                    .ok_or_else(|| self.out_of_bounds(pointer))?;
                u32::from(target)
            }
            Operand::RegisterIndirect(base) => register(base),
            Operand::RegisterRelative {
                offset,
                register: base,
            } => register(base) + u32::from(*offset),
            Operand::IndexedScaled {
                base,
                scale,
                register: index,
            } => u32::from(*base) + u32::from(*scale) * register(index),
            // The offset is a two's-complement displacement from this instruction.
            Operand::PcRelative(offset) => u32::from(self.pc.wrapping_add(*offset)),
            other => {
                return Err(Error::Internal(format!(
                    "`{other}` has no effective address"
                )));
            }
        })
    }

    fn out_of_bounds(&self, address: u32) -> Error {
        Error::AddressOutOfBounds {
            pc: self.pc,
            address,
        }
    }

    fn unexpected(&self, instruction: &Instruction) -> Error {
        Error::Internal(format!(
            "no handler for `{instruction}` at {:#06x}",
            self.pc
        ))
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[must_use]
    pub fn register(&self, register: Register) -> u8 {
        self.registers.get(register)
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Instructions executed since the last load.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn r(n: u8) -> Register {
        Register::general(n).unwrap()
    }

    fn run(source: &str) -> Vm<'static, Vec<u8>> {
        let rom = assemble(source).unwrap();
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&rom).unwrap();
        vm.run().unwrap();
        vm
    }

    fn printed(vm: &Vm<'_, Vec<u8>>) -> String {
        String::from_utf8(vm.output().clone()).unwrap()
    }

    #[test]
    fn test_print_sum() {
        let vm = run("LDR $r1, #10\nADD $r1, #5\nPRINT $r1\nHLT");
        assert_eq!(printed(&vm), "15\n");
        assert_eq!(vm.state(), State::Halted);
        assert_eq!(vm.steps(), 4);
        // HLT leaves pc on itself.
        assert_eq!(vm.pc(), 0x20C);
    }

    #[test]
    fn test_halted_vm_stays_halted() {
        let mut vm = run("HLT");
        assert_eq!(vm.step().unwrap(), State::Halted);
        assert_eq!(vm.steps(), 1);
    }

    #[test]
    fn test_alu_flags() {
        let vm = run("MOV r1, #200\nADD r1, #100\nHLT");
        assert_eq!(vm.register(r(1)), 44);
        assert!(vm.flags().contains(Flags::OVERFLOW));

        let vm = run("MOV r1, #3\nSUB r1, #5\nHLT");
        assert_eq!(vm.register(r(1)), 254);
        assert!(vm.flags().contains(Flags::UNDERFLOW));

        // Each ALU op clears the previous status bits.
        let vm = run("MOV r1, #3\nSUB r1, #5\nADD r1, #1\nHLT");
        assert!(!vm.flags().contains(Flags::UNDERFLOW));
    }

    #[test]
    fn test_logic_ops() {
        let vm = run(
            "MOV r1, #12\nAND r1, #10\nMOV r2, #12\nOR r2, #3\nMOV r3, #5\nXOR r3, #1\nNOT r4, #0x0F\nHLT",
        );
        assert_eq!(vm.register(r(1)), 8);
        assert_eq!(vm.register(r(2)), 15);
        assert_eq!(vm.register(r(3)), 4);
        assert_eq!(vm.register(r(4)), 0xF0);
    }

    #[test]
    fn test_divide_by_zero_is_a_flag() {
        let vm = run("MOV r1, #9\nDIV r1, #0\nHLT");
        assert_eq!(vm.register(r(1)), 9);
        assert!(vm.flags().contains(Flags::DIVIDE_BY_ZERO));
        let vm = run("MOV r1, #9\nMOV r2, #2\nDIV r1, r2\nHLT");
        assert_eq!(vm.register(r(1)), 4);
    }

    #[test]
    fn test_cmp_stores_difference() {
        let vm = run("MOV r1, #3\nCMP r1, #5\nHLT");
        assert_eq!(vm.register(Register::CMP), (-2i8) as u8);
        assert_eq!(vm.flags().condition(), Flags::LESS);
    }

    #[test]
    fn test_wide_immediates_reach_the_alu() {
        let vm = run("MOV r1, #5\nADD r1, #256\nHLT");
        assert_eq!(vm.register(r(1)), 5);
        assert!(vm.flags().contains(Flags::OVERFLOW));

        let vm = run("MOV r1, #5\nCMP r1, #261\nHLT");
        assert_eq!(vm.flags().condition(), Flags::LESS);
        assert_eq!(vm.register(Register::CMP), 0);
    }

    #[test]
    fn test_store_and_load_addressing_modes() {
        let vm = run(
            "MOV r1, #77\n\
             STR r1, 0x400\n\
             LDR r2, [0x400]\n\
             MOV r3, #0x10\n\
             STR r1, 0x3F0+r3\n\
             LDR r4, 0x400\n\
             MOV r5, #2\n\
             STR r5, 0x100+4*r5\n\
             LDR r6, 0x108\n\
             HLT",
        );
        assert_eq!(vm.register(r(2)), 77);
        assert_eq!(vm.register(r(4)), 77);
        assert_eq!(vm.register(r(6)), 2);
        assert_eq!(vm.memory().read(0x108), Some(2));
    }

    #[test]
    fn test_register_indirect() {
        let vm = run("MOV r1, #0xF0\nMOV r2, #9\nSTR r2, (r1)\nLDR r3, 0xF0\nHLT");
        assert_eq!(vm.register(r(3)), 9);
    }

    #[test]
    fn test_indirect_reads_a_big_endian_pointer() {
        // Build the pointer 0x0300 at 0x100, then store through it.
        let vm = run(
            "MOV r1, #0x03\nSTR r1, 0x100\nMOV r2, #42\nSTR r2, (0x100)\nLDR r3, (0x100)\nHLT",
        );
        assert_eq!(vm.memory().read(0x300), Some(42));
        assert_eq!(vm.register(r(3)), 42);
    }

    #[test]
    fn test_zero_register_reads_zero() {
        let vm = run("MOV zero, #5\nMOV r1, zero\nHLT");
        assert_eq!(vm.register(Register::ZERO), 0);
        assert_eq!(vm.register(r(1)), 0);
    }

    #[test]
    fn test_pc_relative_jump_skips() {
        let vm = run("JMP #(8)\nPRINT r1\nHLT");
        assert_eq!(printed(&vm), "");
    }

    #[test]
    fn test_out_of_bounds_store() {
        let rom = assemble("MOV r1, #1\nSTR r1, 4096\nHLT").unwrap();
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&rom).unwrap();
        let err = vm.run().unwrap_err();
        assert!(
            matches!(err, Error::AddressOutOfBounds { pc: 0x204, address: 4096 }),
            "{err:?}"
        );
    }

    #[test]
    fn test_running_off_the_rom() {
        let rom = assemble("PRINT r1").unwrap();
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&rom).unwrap();
        assert_eq!(vm.step().unwrap(), State::Running);
        assert!(matches!(
            vm.step(),
            Err(Error::TruncatedInstruction { pc: 0x204 })
        ));
    }

    #[test]
    fn test_jump_below_the_rom_is_rejected() {
        let rom = assemble("MOV r1, #0\nJMP 0x100\nHLT").unwrap();
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&rom).unwrap();
        let err = vm.run().unwrap_err();
        assert!(matches!(err, Error::PcOutsideRom { pc: 0x100 }), "{err:?}");
        assert_eq!(vm.steps(), 2);
    }

    #[test]
    fn test_partial_word_is_truncated() {
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&[0x18, 0x10]).unwrap();
        assert!(matches!(
            vm.step(),
            Err(Error::TruncatedInstruction { pc: 0x200 })
        ));
    }

    #[test]
    fn test_undefined_opcode_halts() {
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&[0xF8, 0, 0, 0]).unwrap();
        assert_eq!(vm.step().unwrap(), State::Halted);
        assert_eq!(vm.pc(), 0x200);
    }

    #[test]
    fn test_illegal_tag_is_malformed() {
        // ADD with the direct tag.
        let word: u32 = (0x08 << 27) | (4 << 24);
        let mut vm = Vm::with_output(Vec::new());
        vm.load(&word.to_be_bytes()).unwrap();
        assert!(matches!(
            vm.step(),
            Err(Error::MalformedInstruction { pc: 0x200, word: w }) if w == word
        ));
    }

    #[test]
    fn test_rom_too_large() {
        let mut vm = Vm::with_output(Vec::new());
        let rom = vec![0u8; MEMORY_SIZE - usize::from(LOAD_ADDRESS) + 1];
        assert!(matches!(
            vm.load(&rom),
            Err(Error::RomTooLarge { capacity: 3584, .. })
        ));
    }

    #[test]
    fn test_load_resets_state() {
        let mut vm = run("MOV r1, #1\nHLT");
        vm.load(&assemble("HLT").unwrap()).unwrap();
        assert_eq!(vm.state(), State::Running);
        assert_eq!(vm.register(r(1)), 0);
        assert_eq!(vm.steps(), 0);
    }
}
