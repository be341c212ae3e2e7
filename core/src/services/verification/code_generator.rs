//! Cryptographically secure verification code generator

use rand::{rngs::OsRng, RngCore};

use crate::errors::{DomainError, DomainResult};

/// Largest alphabet a single random byte can index
const MAX_ALPHABET_LEN: usize = 256;

/// Stateless generator of fixed-length codes
///
/// Symbols are drawn from the operating system CSPRNG. Bytes that would bias
/// the modulo are rejected, so every symbol of the alphabet is equally likely.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    alphabet: Vec<char>,
    length: usize,
}

impl CodeGenerator {
    /// Create a generator for `length` symbols from `alphabet`
    ///
    /// # Returns
    ///
    /// * `Err(DomainError::Configuration)` - empty or oversized alphabet,
    ///   duplicate symbols, fewer than two symbols or zero length
    pub fn new(alphabet: &str, length: usize) -> DomainResult<Self> {
        let symbols: Vec<char> = alphabet.chars().collect();

        if length == 0 {
            return Err(DomainError::Configuration {
                message: "code length must be greater than zero".to_string(),
            });
        }
        if symbols.len() < 2 || symbols.len() > MAX_ALPHABET_LEN {
            return Err(DomainError::Configuration {
                message: format!(
                    "code alphabet must contain between 2 and {} symbols",
                    MAX_ALPHABET_LEN
                ),
            });
        }
        let mut unique = symbols.clone();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != symbols.len() {
            return Err(DomainError::Configuration {
                message: "code alphabet contains duplicate symbols".to_string(),
            });
        }

        Ok(Self {
            alphabet: symbols,
            length,
        })
    }

    /// Generate a new code
    ///
    /// Fails only if the OS random source cannot be read.
    pub fn generate(&self) -> DomainResult<String> {
        let symbol_count = self.alphabet.len();
        // Bytes at or above this bound are rejected to avoid modulo bias
        let accept_below = MAX_ALPHABET_LEN - (MAX_ALPHABET_LEN % symbol_count);

        let mut code = String::with_capacity(self.length);
        let mut produced = 0;
        let mut buffer = [0u8; 32];

        while produced < self.length {
            OsRng
                .try_fill_bytes(&mut buffer)
                .map_err(|e| DomainError::EntropyUnavailable {
                    message: e.to_string(),
                })?;

            for byte in buffer.iter().map(|b| *b as usize) {
                if byte >= accept_below {
                    continue;
                }
                code.push(self.alphabet[byte % symbol_count]);
                produced += 1;
                if produced == self.length {
                    break;
                }
            }
        }

        Ok(code)
    }
}
