use std::collections::HashMap;

use macroquad::input::{
    is_key_down,
    KeyCode,
};

/// Current pressed state of the 16 key hex keypad (key codes 0x0..=0xF).
pub trait InputSource {
    /// Key codes currently held down, ascending.
    fn pressed_keys(&self) -> Vec<u8>;

    fn is_pressed(&self, key: u8) -> bool;
}

/// QWERTY mapping onto the 4x4 COSMAC keypad layout.
pub struct KeyPad {
    key_code_hex_mapping: HashMap<KeyCode, u8>,
}

impl KeyPad {
    pub fn new() -> Self {
        let key_code_hex_mapping: HashMap<KeyCode, u8> = HashMap::from([
            (KeyCode::Key1, 0x1),
            (KeyCode::Key2, 0x2),
            (KeyCode::Key3, 0x3),
            (KeyCode::Key4, 0xC),
            (KeyCode::Q, 0x4),
            (KeyCode::W, 0x5),
            (KeyCode::E, 0x6),
            (KeyCode::R, 0xD),
            (KeyCode::A, 0x7),
            (KeyCode::S, 0x8),
            (KeyCode::D, 0x9),
            (KeyCode::F, 0xE),
            (KeyCode::Z, 0xA),
            (KeyCode::X, 0x0),
            (KeyCode::C, 0xB),
            (KeyCode::V, 0xF),
        ]);

        Self { key_code_hex_mapping }
    }
}

impl Default for KeyPad {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for KeyPad {
    fn pressed_keys(&self) -> Vec<u8> {
        let mut keys: Vec<u8> = self
            .key_code_hex_mapping
            .iter()
            .filter(|(code, _)| is_key_down(**code))
            .map(|(_, hex)| *hex)
            .collect();
        keys.sort_unstable();

        keys
    }

    fn is_pressed(&self, key: u8) -> bool {
        self.key_code_hex_mapping
            .iter()
            .any(|(code, hex)| *hex == key && is_key_down(*code))
    }
}
