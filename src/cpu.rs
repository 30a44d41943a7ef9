use thiserror::Error;

use crate::{
    constants,
    display::DisplaySurface,
    input::InputSource,
    mem::{
        CallStack,
        LoadError,
        Ram,
        RamError,
        Registers,
        FLAG,
    },
    random::RandomSource,
    sound::ToneOutput,
};

#[derive(Error, Debug)]
pub enum CpuError {
    #[error("stack overflow executing {word:#06x} at {at:#06x}")]
    StackOverflow { at: u16, word: u16 },

    #[error("stack underflow executing return at {at:#06x}")]
    StackUnderflow { at: u16 },

    #[error(transparent)]
    Memory(#[from] RamError),
}

/// Execution state of the machine. `AwaitingKey` is entered by the FX0A
/// opcode and holds the index of the register waiting for a key press;
/// while set, no timers decrement and no cycles execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    AwaitingKey(usize),
}

struct Instruction {
    word: u16,
    x: usize,
    y: usize,
    n: usize,
    nn: u8,
    nnn: u16,
}

impl From<u16> for Instruction {
    fn from(word: u16) -> Self {
        Self {
            word,
            x: ((word >> 8) & 0xF) as usize,
            y: ((word >> 4) & 0xF) as usize,
            n: (word & 0xF) as usize,
            nn: (word & 0xFF) as u8,
            nnn: word & 0x0FFF,
        }
    }
}

/// The virtual machine core: registers, memory, stack, timers and the
/// fetch-decode-execute cycle. The display, keypad, tone and randomness
/// seams are injected so the core stays deterministic under test.
pub struct Cpu<D, K, T, R> {
    display: D,
    keypad: K,
    tone: T,
    random: R,
    cycles_per_frame: usize,
    memory: Ram,
    registers: Registers,
    index_register: u16,
    pc: u16,
    stack: CallStack,
    delay_timer: u8,
    sound_timer: u8,
    state: ExecState,
}

impl<D, K, T, R> Cpu<D, K, T, R>
where
    D: DisplaySurface,
    K: InputSource,
    T: ToneOutput,
    R: RandomSource,
{
    pub fn new(cycles_per_frame: usize, display: D, keypad: K, tone: T, random: R) -> Self {
        Self {
            display,
            keypad,
            tone,
            random,
            cycles_per_frame,
            memory: Ram::new(),
            registers: Registers::new(),
            index_register: 0,
            pc: constants::PROGRAM_START as u16,
            stack: CallStack::new(),
            delay_timer: 0,
            sound_timer: 0,
            state: ExecState::Running,
        }
    }

    /// Reset the machine and write the program verbatim at 0x200.
    pub fn load(&mut self, program: &[u8]) -> Result<(), LoadError> {
        if program.len() > constants::PROGRAM_CAPACITY {
            return Err(LoadError::OutOfMemory {
                program_size: program.len(),
                capacity: constants::PROGRAM_CAPACITY,
            });
        }

        self.memory = Ram::new();
        self.memory.write_program(program);
        self.registers = Registers::new();
        self.index_register = 0;
        self.pc = constants::PROGRAM_START as u16;
        self.stack = CallStack::new();
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.state = ExecState::Running;
        self.display.clear();

        log::info!("loaded {} byte program", program.len());
        Ok(())
    }

    /// One display frame: timers decrement once, the tone output is driven,
    /// then the configured number of cycles execute in sequence.
    ///
    /// While awaiting a key, the frame only polls the keypad. The first
    /// observed press writes the lowest-valued pressed key code into the
    /// target register; execution resumes on the following frame.
    pub fn advance_frame(&mut self) -> Result<(), CpuError> {
        if let ExecState::AwaitingKey(target) = self.state {
            if let Some(key) = self.keypad.pressed_keys().into_iter().min() {
                self.registers[target] = key;
                self.state = ExecState::Running;
            }
            return Ok(());
        }

        self.tick_timers();
        for _ in 0..self.cycles_per_frame {
            self.step_cycle()?;
            if let ExecState::AwaitingKey(_) = self.state {
                break;
            }
        }

        Ok(())
    }

    /// One fetch-decode-execute cycle. The program counter advances past
    /// the instruction word before dispatch, so jump opcodes overwrite the
    /// default advance.
    pub fn step_cycle(&mut self) -> Result<(), CpuError> {
        let at = self.pc;
        let word = self.memory.opcode(at)?;
        self.pc = (at + 2) % constants::RAM_SIZE as u16;

        self.execute(Instruction::from(word), at)
    }

    fn tick_timers(&mut self) {
        if self.delay_timer > 0 {
            self.delay_timer -= 1;
        }
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
        }
        if self.sound_timer > 0 {
            self.tone.play(constants::TONE_HZ);
        } else {
            self.tone.stop();
        }
    }

    fn execute(&mut self, inst: Instruction, at: u16) -> Result<(), CpuError> {
        match inst.word >> 12 {
            0x0 => match inst.nn {
                0xE0 => self.op_00e0(),
                0xEE => self.op_00ee(at)?,
                _ => self.nop(inst.word),
            },
            0x1 => self.op_1nnn(inst.nnn),
            0x2 => self.op_2nnn(&inst, at)?,
            0x3 => self.op_3xnn(&inst),
            0x4 => self.op_4xnn(&inst),
            0x5 => self.op_5xy0(&inst),
            0x6 => self.op_6xnn(&inst),
            0x7 => self.op_7xnn(&inst),
            0x8 => match inst.n {
                0x0 => self.op_8xy0(&inst),
                0x1 => self.op_8xy1(&inst),
                0x2 => self.op_8xy2(&inst),
                0x3 => self.op_8xy3(&inst),
                0x4 => self.op_8xy4(&inst),
                0x5 => self.op_8xy5(&inst),
                0x6 => self.op_8xy6(&inst),
                0x7 => self.op_8xy7(&inst),
                0xE => self.op_8xye(&inst),
                _ => self.nop(inst.word),
            },
            0x9 => self.op_9xy0(&inst),
            0xA => self.op_annn(inst.nnn),
            0xB => self.op_bnnn(inst.nnn),
            0xC => self.op_cxnn(&inst),
            0xD => self.op_dxyn(&inst)?,
            0xE => match inst.nn {
                0x9E => self.op_ex9e(&inst),
                0xA1 => self.op_exa1(&inst),
                _ => self.nop(inst.word),
            },
            0xF => match inst.nn {
                0x07 => self.op_fx07(&inst),
                0x0A => self.op_fx0a(&inst),
                0x15 => self.op_fx15(&inst),
                0x18 => self.op_fx18(&inst),
                0x1E => self.op_fx1e(&inst),
                0x29 => self.op_fx29(&inst),
                0x33 => self.op_fx33(&inst)?,
                0x55 => self.op_fx55(&inst)?,
                0x65 => self.op_fx65(&inst)?,
                _ => self.nop(inst.word),
            },
            _ => unreachable!("top nibble is four bits"),
        }

        Ok(())
    }

    fn nop(&self, word: u16) {
        if word != 0 {
            log::debug!("ignoring unknown opcode {word:#06x}");
        }
    }

    /// Extra advance used by the skip opcodes: one instruction width past
    /// the default advance.
    fn skip(&mut self) {
        self.pc = (self.pc + 2) % constants::RAM_SIZE as u16;
    }

    fn op_00e0(&mut self) {
        self.display.clear();
    }

    fn op_00ee(&mut self, at: u16) -> Result<(), CpuError> {
        self.pc = self.stack.pop().map_err(|_| CpuError::StackUnderflow { at })?;
        Ok(())
    }

    fn op_1nnn(&mut self, nnn: u16) {
        self.pc = nnn;
    }

    fn op_2nnn(&mut self, inst: &Instruction, at: u16) -> Result<(), CpuError> {
        self.stack.push(self.pc).map_err(|_| CpuError::StackOverflow {
            at,
            word: inst.word,
        })?;
        self.pc = inst.nnn;
        Ok(())
    }

    fn op_3xnn(&mut self, inst: &Instruction) {
        if self.registers[inst.x] == inst.nn {
            self.skip();
        }
    }

    fn op_4xnn(&mut self, inst: &Instruction) {
        if self.registers[inst.x] != inst.nn {
            self.skip();
        }
    }

    fn op_5xy0(&mut self, inst: &Instruction) {
        if self.registers[inst.x] == self.registers[inst.y] {
            self.skip();
        }
    }

    fn op_6xnn(&mut self, inst: &Instruction) {
        self.registers[inst.x] = inst.nn;
    }

    // Carry flag untouched, unlike 8XY4.
    fn op_7xnn(&mut self, inst: &Instruction) {
        self.registers[inst.x] = self.registers[inst.x].wrapping_add(inst.nn);
    }

    fn op_8xy0(&mut self, inst: &Instruction) {
        self.registers[inst.x] = self.registers[inst.y];
    }

    fn op_8xy1(&mut self, inst: &Instruction) {
        self.registers[inst.x] |= self.registers[inst.y];
    }

    fn op_8xy2(&mut self, inst: &Instruction) {
        self.registers[inst.x] &= self.registers[inst.y];
    }

    fn op_8xy3(&mut self, inst: &Instruction) {
        self.registers[inst.x] ^= self.registers[inst.y];
    }

    fn op_8xy4(&mut self, inst: &Instruction) {
        let (val, overflow) = self.registers[inst.x].overflowing_add(self.registers[inst.y]);
        self.registers[inst.x] = val;
        self.registers[FLAG] = overflow as u8;
    }

    // Flag is the no-borrow indicator: 1 iff Vx > Vy before the subtract.
    fn op_8xy5(&mut self, inst: &Instruction) {
        let no_borrow = self.registers[inst.x] > self.registers[inst.y];
        self.registers[inst.x] = self.registers[inst.x].wrapping_sub(self.registers[inst.y]);
        self.registers[FLAG] = no_borrow as u8;
    }

    fn op_8xy6(&mut self, inst: &Instruction) {
        let lsb = self.registers[inst.x] & 1;
        self.registers[inst.x] >>= 1;
        self.registers[FLAG] = lsb;
    }

    fn op_8xy7(&mut self, inst: &Instruction) {
        let no_borrow = self.registers[inst.y] > self.registers[inst.x];
        self.registers[inst.x] = self.registers[inst.y].wrapping_sub(self.registers[inst.x]);
        self.registers[FLAG] = no_borrow as u8;
    }

    fn op_8xye(&mut self, inst: &Instruction) {
        let msb = (self.registers[inst.x] >> 7) & 1;
        self.registers[inst.x] <<= 1;
        self.registers[FLAG] = msb;
    }

    fn op_9xy0(&mut self, inst: &Instruction) {
        if self.registers[inst.x] != self.registers[inst.y] {
            self.skip();
        }
    }

    fn op_annn(&mut self, nnn: u16) {
        self.index_register = nnn;
    }

    // Full 12 bit target; the observed 8 bit mask was a latent defect.
    fn op_bnnn(&mut self, nnn: u16) {
        self.pc = (nnn + self.registers[0] as u16) & 0x0FFF;
    }

    fn op_cxnn(&mut self, inst: &Instruction) {
        self.registers[inst.x] = self.random.next_byte() & inst.nn;
    }

    /// Collision-detecting blit. Rows are read at I, most significant bit
    /// first; set bits toggle the display with wraparound. The flag is
    /// assigned exactly once per draw, `I` is never modified, and one
    /// present call is issued after all toggles.
    fn op_dxyn(&mut self, inst: &Instruction) -> Result<(), CpuError> {
        let start_x = self.registers[inst.x] as i32;
        let start_y = self.registers[inst.y] as i32;

        let mut erased = false;
        for row in 0..inst.n {
            let sprite = self.memory.get(self.index_register as usize + row)?;
            for bit in 0..8 {
                if (sprite >> (7 - bit)) & 1 == 1 {
                    erased |= self.display.toggle(start_x + bit, start_y + row as i32);
                }
            }
        }

        self.registers[FLAG] = erased as u8;
        self.display.present();
        Ok(())
    }

    fn op_ex9e(&mut self, inst: &Instruction) {
        if self.keypad.is_pressed(self.registers[inst.x]) {
            self.skip();
        }
    }

    fn op_exa1(&mut self, inst: &Instruction) {
        if !self.keypad.is_pressed(self.registers[inst.x]) {
            self.skip();
        }
    }

    fn op_fx07(&mut self, inst: &Instruction) {
        self.registers[inst.x] = self.delay_timer;
    }

    // Vx is written by advance_frame once a key is observed, not here.
    fn op_fx0a(&mut self, inst: &Instruction) {
        self.state = ExecState::AwaitingKey(inst.x);
    }

    fn op_fx15(&mut self, inst: &Instruction) {
        self.delay_timer = self.registers[inst.x];
    }

    fn op_fx18(&mut self, inst: &Instruction) {
        self.sound_timer = self.registers[inst.x];
    }

    // No overflow flag; I wraps as a 16 bit value.
    fn op_fx1e(&mut self, inst: &Instruction) {
        self.index_register = self.index_register.wrapping_add(self.registers[inst.x] as u16);
    }

    fn op_fx29(&mut self, inst: &Instruction) {
        self.index_register = self.registers[inst.x] as u16 * constants::GLYPH_BYTES as u16;
    }

    fn op_fx33(&mut self, inst: &Instruction) -> Result<(), CpuError> {
        let value = self.registers[inst.x];
        let i = self.index_register as usize;

        *self.memory.get_mut(i)? = value / 100;
        *self.memory.get_mut(i + 1)? = value / 10 % 10;
        *self.memory.get_mut(i + 2)? = value % 10;
        Ok(())
    }

    fn op_fx55(&mut self, inst: &Instruction) -> Result<(), CpuError> {
        for offset in 0..=inst.x {
            *self.memory.get_mut(self.index_register as usize + offset)? = self.registers[offset];
        }
        Ok(())
    }

    fn op_fx65(&mut self, inst: &Instruction) -> Result<(), CpuError> {
        for offset in 0..=inst.x {
            self.registers[offset] = self.memory.get(self.index_register as usize + offset)?;
        }
        Ok(())
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn v(&self, register: usize) -> u8 {
        self.registers[register]
    }

    pub fn index(&self) -> u16 {
        self.index_register
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}
