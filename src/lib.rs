use std::time::{
    Duration,
    Instant,
};

use anyhow::Error;
use macroquad::{
    input::{
        is_key_pressed,
        KeyCode,
    },
    window::next_frame,
};

pub mod constants;
pub mod cpu;
pub mod display;
pub mod input;
pub mod mem;
pub mod random;
pub mod sound;

use cpu::Cpu;

/// Load the ROM at `path` and drive the machine at the fixed frame rate
/// until Escape is pressed or a fatal condition unwinds out of the core.
pub async fn run(path: &str, cycles_per_frame: usize, scale: i32) -> Result<(), Error> {
    let rom = mem::Rom::load(path)?;
    log::info!("running rom {path} ({} bytes)", rom.len());

    let display = display::MacroquadDisplay::new(scale);
    let keypad = input::KeyPad::new();
    let tone = sound::Beeper::new(constants::TONE_HZ).await?;
    let mut cpu = Cpu::new(cycles_per_frame, display, keypad, tone, random::ThreadRandom);
    cpu.load(rom.data())?;

    let mut last_frame = Instant::now() - Duration::from_secs(1337);
    loop {
        let now = Instant::now();
        if now.duration_since(last_frame).as_secs_f64() * 1000.0 >= constants::MS_PER_FRAME {
            last_frame = now;
            cpu.advance_frame()?;
        }

        cpu.display().blit();
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        next_frame().await;
    }

    Ok(())
}
