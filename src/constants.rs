pub const RAM_SIZE: usize = 0x1000;
pub const PROGRAM_START: usize = 0x200;
pub const PROGRAM_CAPACITY: usize = RAM_SIZE - PROGRAM_START;

pub const REGISTER_COUNT: usize = 16;
pub const STACK_DEPTH: usize = 16;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

pub const FRAME_RATE: usize = 60;
pub const MS_PER_FRAME: f64 = 1000.0 / FRAME_RATE as f64;
pub const DEFAULT_CYCLES_PER_FRAME: usize = 10;

pub const GLYPH_BYTES: usize = 5;
pub const TONE_HZ: f32 = 440.0;

#[rustfmt::skip]
pub const FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9

    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80  // F
];
