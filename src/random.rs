/// Uniform byte generator behind the random opcode. Injected so core
/// behavior is deterministic under test.
pub trait RandomSource {
    fn next_byte(&mut self) -> u8;
}

/// Production source backed by the thread local generator.
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_byte(&mut self) -> u8 {
        rand::random::<u8>()
    }
}
