/// Initial accumulator of the djb2 mix.
const SEED: u32 = 5381;

/// Streaming djb2 hasher (`acc = acc * 33 + byte`, wrapping at 32 bits).
///
/// This is a cheap fingerprint, not a cryptographic digest. Feeding nothing
/// yields 0 rather than the seed, so empty input always hashes to 0.
#[derive(Debug, Clone, Copy)]
pub struct Djb2 {
    acc: u32,
    written: bool,
}

impl Default for Djb2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Djb2 {
    pub const fn new() -> Self {
        Self {
            acc: SEED,
            written: false,
        }
    }

    pub fn update(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return;
        }
        self.written = true;
        for &b in bytes {
            self.acc = self.acc.wrapping_mul(33).wrapping_add(u32::from(b));
        }
    }

    /// Feed the decimal rendering of an integer, as it appears in a
    /// textual preimage.
    pub fn update_display(&mut self, value: impl std::fmt::Display) {
        self.update(value.to_string());
    }

    pub const fn finalize(&self) -> u32 {
        if self.written { self.acc } else { 0 }
    }
}

/// One-shot hash of a byte sequence.
pub fn hash_bytes(bytes: impl AsRef<[u8]>) -> u32 {
    let mut hasher = Djb2::new();
    hasher.update(bytes);
    hasher.finalize()
}
