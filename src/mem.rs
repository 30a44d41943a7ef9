use std::{
    fs::File,
    io::{
        self,
        Read,
    },
    ops::{
        Index,
        IndexMut,
    },
    path::Path,
};

use thiserror::Error;

use crate::constants;

/// Index of the flag register VF.
pub(crate) const FLAG: usize = 0xF;

#[derive(Error, Debug)]
pub enum RamError {
    #[error("memory access out of bounds at {0:#06x}")]
    InvalidAddress(usize),
}

/// The 4096 byte backing store. Glyph sprites live at the bottom,
/// program bytes start at 0x200.
pub(crate) struct Ram {
    memory: [u8; constants::RAM_SIZE],
}

impl Ram {
    pub fn new() -> Self {
        let mut ram = Ram {
            memory: [0; constants::RAM_SIZE],
        };
        ram.memory[0..constants::FONT.len()].copy_from_slice(&constants::FONT);

        ram
    }

    pub fn write_program(&mut self, program: &[u8]) {
        self.memory[constants::PROGRAM_START..constants::PROGRAM_START + program.len()].copy_from_slice(program);
    }

    /// Big-endian instruction word at `[pc, pc + 1]`.
    pub fn opcode(&self, pc: u16) -> Result<u16, RamError> {
        let pc = pc as usize;
        let high = *self.memory.get(pc).ok_or(RamError::InvalidAddress(pc))? as u16;
        let low = *self.memory.get(pc + 1).ok_or(RamError::InvalidAddress(pc + 1))? as u16;
        Ok((high << 8) | low)
    }

    pub fn get(&self, index: usize) -> Result<u8, RamError> {
        self.memory.get(index).ok_or(RamError::InvalidAddress(index)).copied()
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut u8, RamError> {
        self.memory.get_mut(index).ok_or(RamError::InvalidAddress(index))
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("loading rom failed: {0}")]
    Io(#[from] io::Error),

    #[error("program does not fit in memory, {program_size} > {capacity}")]
    OutOfMemory { program_size: usize, capacity: usize },
}

/// Raw program image, read verbatim from disk. No header, no checksum.
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let mut file = File::open(path)?;
        let mut data = vec![];

        file.read_to_end(&mut data)?;

        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The 16 general purpose 8 bit registers V0..VF.
pub(crate) struct Registers([u8; constants::REGISTER_COUNT]);

impl Registers {
    pub fn new() -> Self {
        Self([0; constants::REGISTER_COUNT])
    }
}

impl Index<usize> for Registers {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Registers {
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.0[index]
    }
}

#[derive(Error, Debug)]
#[error("stack is full")]
pub(crate) struct StackFullError;

#[derive(Error, Debug)]
#[error("stack is empty")]
pub(crate) struct StackEmptyError;

/// Fixed depth call stack. The stack pointer never wraps; pushing at
/// capacity and popping when empty are surfaced as errors.
pub(crate) struct CallStack {
    frames: [u16; constants::STACK_DEPTH],
    sp: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self {
            frames: [0; constants::STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn push(&mut self, address: u16) -> Result<(), StackFullError> {
        if self.sp >= constants::STACK_DEPTH {
            return Err(StackFullError);
        }
        self.frames[self.sp] = address;
        self.sp += 1;

        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, StackEmptyError> {
        if self.sp == 0 {
            return Err(StackEmptyError);
        }
        self.sp -= 1;
        let address = self.frames[self.sp];
        self.frames[self.sp] = 0;

        Ok(address)
    }

    pub fn depth(&self) -> usize {
        self.sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_places_font_at_bottom_and_program_at_0x200() {
        let mut ram = Ram::new();
        ram.write_program(&[0xAB, 0xCD]);

        assert_eq!(ram.get(0).unwrap(), 0xF0);
        assert_eq!(ram.get(constants::FONT.len() - 1).unwrap(), 0x80);
        assert_eq!(ram.get(constants::PROGRAM_START).unwrap(), 0xAB);
        assert_eq!(ram.get(constants::PROGRAM_START + 1).unwrap(), 0xCD);
    }

    #[test]
    fn ram_rejects_out_of_bounds_access() {
        let mut ram = Ram::new();

        assert!(matches!(ram.get(constants::RAM_SIZE), Err(RamError::InvalidAddress(_))));
        assert!(ram.get_mut(constants::RAM_SIZE).is_err());
        assert!(ram.opcode((constants::RAM_SIZE - 1) as u16).is_err());
    }

    #[test]
    fn opcode_fetch_is_big_endian() {
        let mut ram = Ram::new();
        ram.write_program(&[0x12, 0x34]);

        assert_eq!(ram.opcode(constants::PROGRAM_START as u16).unwrap(), 0x1234);
    }

    #[test]
    fn call_stack_is_last_in_first_out() {
        let mut stack = CallStack::new();
        stack.push(0x200).unwrap();
        stack.push(0x300).unwrap();

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap(), 0x300);
        assert_eq!(stack.pop().unwrap(), 0x200);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn call_stack_errors_at_capacity_and_when_empty() {
        let mut stack = CallStack::new();
        for i in 0..constants::STACK_DEPTH {
            stack.push(i as u16).unwrap();
        }

        assert!(stack.push(0xFFF).is_err());
        for _ in 0..constants::STACK_DEPTH {
            stack.pop().unwrap();
        }
        assert!(stack.pop().is_err());
    }
}
