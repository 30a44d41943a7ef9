use macroquad::audio::{
    load_sound_from_bytes,
    play_sound,
    stop_sound,
    PlaySoundParams,
    Sound,
};

/// Single continuous tone driven by the sound timer.
pub trait ToneOutput {
    fn play(&mut self, frequency: f32);

    fn stop(&mut self);
}

const SAMPLE_RATE: u32 = 44_100;

/// One second of 16 bit mono PCM square wave, as a WAV image macroquad can
/// decode. Built in memory so the crate ships no audio assets.
fn square_wave_wav(frequency: f32) -> Vec<u8> {
    let samples = SAMPLE_RATE;
    let data_len = samples * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    let period = SAMPLE_RATE as f32 / frequency;
    for i in 0..samples {
        let phase = (i as f32 / period).fract();
        let value: i16 = if phase < 0.5 { 6_000 } else { -6_000 };
        wav.extend_from_slice(&value.to_le_bytes());
    }

    wav
}

/// Macroquad backed tone output. The pitch is fixed at construction; `play`
/// and `stop` are edge detected so the looping sound is not restarted every
/// frame the sound timer is running.
pub struct Beeper {
    sound: Sound,
    playing: bool,
}

impl Beeper {
    pub async fn new(frequency: f32) -> Result<Self, macroquad::Error> {
        let sound = load_sound_from_bytes(&square_wave_wav(frequency)).await?;

        Ok(Self { sound, playing: false })
    }
}

impl ToneOutput for Beeper {
    fn play(&mut self, _frequency: f32) {
        if !self.playing {
            play_sound(
                &self.sound,
                PlaySoundParams {
                    looped: true,
                    volume: 0.5,
                },
            );
            self.playing = true;
        }
    }

    fn stop(&mut self) {
        if self.playing {
            stop_sound(&self.sound);
            self.playing = false;
        }
    }
}
