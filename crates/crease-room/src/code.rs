//! Room code generation.

use std::sync::Mutex;

use crease_protocol::{ProtocolError, RoomCode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draws candidate room codes.
///
/// Candidates are not checked for uniqueness here; the coordinator claims
/// them with an insert-if-absent and draws again on collision.
pub struct CodeGenerator {
    rng: Mutex<StdRng>,
}

impl CodeGenerator {
    pub fn from_os_rng() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// A reproducible sequence of codes, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// The next candidate code.
    pub fn generate(&self) -> Result<RoomCode, ProtocolError> {
        let raw: String = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (0..RoomCode::LEN)
                .map(|_| {
                    let index = rng.random_range(0..RoomCode::ALPHABET.len());
                    char::from(RoomCode::ALPHABET[index])
                })
                .collect()
        };
        RoomCode::parse(&raw)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_alphabet_only() {
        let codes = CodeGenerator::seeded(7);
        for _ in 0..500 {
            let code = codes.generate().unwrap();
            assert_eq!(code.as_str().len(), RoomCode::LEN);
            assert!(code.as_str().bytes().all(|b| RoomCode::ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let a = CodeGenerator::seeded(42);
        let b = CodeGenerator::seeded(42);
        for _ in 0..10 {
            assert_eq!(a.generate().unwrap(), b.generate().unwrap());
        }
    }
}
