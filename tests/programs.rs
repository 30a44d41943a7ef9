//! End-to-end tests: small hand-assembled programs run through the public
//! API against in-process host doubles.

use std::{
    cell::RefCell,
    rc::Rc,
};

use chip8vm::{
    cpu::{
        Cpu,
        CpuError,
        ExecState,
    },
    display::FrameBuffer,
    input::InputSource,
    random::RandomSource,
    sound::ToneOutput,
};

#[derive(Clone, Default)]
struct SharedKeys(Rc<RefCell<Vec<u8>>>);

impl SharedKeys {
    fn press(&self, key: u8) {
        self.0.borrow_mut().push(key);
    }
}

impl InputSource for SharedKeys {
    fn pressed_keys(&self) -> Vec<u8> {
        let mut keys = self.0.borrow().clone();
        keys.sort_unstable();
        keys
    }

    fn is_pressed(&self, key: u8) -> bool {
        self.0.borrow().contains(&key)
    }
}

struct SilentTone;

impl ToneOutput for SilentTone {
    fn play(&mut self, _frequency: f32) {}

    fn stop(&mut self) {}
}

struct ZeroRandom;

impl RandomSource for ZeroRandom {
    fn next_byte(&mut self) -> u8 {
        0
    }
}

type TestMachine = Cpu<FrameBuffer, SharedKeys, SilentTone, ZeroRandom>;

fn machine(cycles_per_frame: usize, words: &[u16]) -> (TestMachine, SharedKeys) {
    let keys = SharedKeys::default();
    let mut cpu = Cpu::new(cycles_per_frame, FrameBuffer::new(), keys.clone(), SilentTone, ZeroRandom);

    let program: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();
    cpu.load(&program).unwrap();

    (cpu, keys)
}

#[test]
fn counting_loop_terminates_in_a_spin() {
    let (mut cpu, _) = machine(
        10,
        &[
            0x6000, // V0 = 0
            0x7001, // V0 += 1
            0x3005, // skip next if V0 == 5
            0x1202, // jump back to the add
            0x1208, // spin
        ],
    );

    for _ in 0..10 {
        cpu.advance_frame().unwrap();
    }

    assert_eq!(cpu.v(0x0), 5);
    assert_eq!(cpu.pc(), 0x208);
}

#[test]
fn glyph_draw_renders_the_builtin_sprite() {
    let (mut cpu, _) = machine(
        4,
        &[
            0x6000, // V0 = 0
            0xF029, // I = glyph address of V0
            0xD005, // draw glyph 0 at (V0, V0), five rows
            0x1206, // spin
        ],
    );

    cpu.advance_frame().unwrap();

    // Glyph 0 is 0xF0 0x90 0x90 0x90 0xF0: a hollow 4x5 rectangle.
    for x in 0..4 {
        assert!(cpu.display().is_set(x, 0));
        assert!(cpu.display().is_set(x, 4));
    }
    for y in 1..4 {
        assert!(cpu.display().is_set(0, y));
        assert!(!cpu.display().is_set(1, y));
        assert!(!cpu.display().is_set(2, y));
        assert!(cpu.display().is_set(3, y));
    }
}

#[test]
fn await_key_resumes_with_the_pressed_key() {
    let (mut cpu, keys) = machine(
        1,
        &[
            0xF30A, // V3 = await key
            0x6455, // V4 = 0x55
            0x1204, // spin
        ],
    );

    cpu.advance_frame().unwrap();
    assert_eq!(cpu.state(), ExecState::AwaitingKey(0x3));

    for _ in 0..5 {
        cpu.advance_frame().unwrap();
    }
    assert_eq!(cpu.v(0x4), 0, "execution must stay suspended with no key down");

    keys.press(0xA);
    cpu.advance_frame().unwrap(); // latches the key
    assert_eq!(cpu.v(0x3), 0xA);
    assert_eq!(cpu.state(), ExecState::Running);

    cpu.advance_frame().unwrap(); // resumes past the await
    assert_eq!(cpu.v(0x4), 0x55);
}

#[test]
fn fatal_stack_errors_unwind_out_of_the_frame_loop() {
    let (mut cpu, _) = machine(1, &[0x00EE]);

    let err = cpu.advance_frame().unwrap_err();
    assert!(matches!(err, CpuError::StackUnderflow { at: 0x200 }));
}
