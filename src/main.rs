use clap::Parser;
use macroquad::window::{
    request_new_screen_size,
    Conf,
};

use chip8vm::constants;

#[derive(Parser)]
#[command(about = "CHIP-8 virtual machine")]
struct Args {
    /// Path to the ROM to run.
    rom: String,

    /// Instruction cycles executed per 60 Hz frame.
    #[arg(long, default_value_t = constants::DEFAULT_CYCLES_PER_FRAME)]
    cycles: usize,

    /// Window pixels per CHIP-8 pixel.
    #[arg(long, default_value_t = 10)]
    scale: i32,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "chip8vm".to_owned(),
        window_width: constants::SCREEN_WIDTH as i32 * 10,
        window_height: constants::SCREEN_HEIGHT as i32 * 10,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    request_new_screen_size(
        (constants::SCREEN_WIDTH as i32 * args.scale) as f32,
        (constants::SCREEN_HEIGHT as i32 * args.scale) as f32,
    );

    if let Err(error) = chip8vm::run(&args.rom, args.cycles, args.scale).await {
        log::error!("{error:#}");
        std::process::exit(1);
    }
}
