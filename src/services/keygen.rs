//! Random key generation and reservation.

use crate::models::record::Record;
use crate::services::cdn_service::CdnError;
use crate::services::record_store::RecordStore;
use rand::Rng;

const ASCII_LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const ASCII_UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

/// Literal path segments that must never be handed out as keys.
pub const RESERVED_KEYS: [&str; 3] = ["upload", "short", "ping"];

/// Upper bound on candidate draws before giving up. Collisions are
/// astronomically unlikely at sane lengths; the cap exists so a full or
/// misconfigured keyspace fails loudly instead of spinning forever.
pub const MAX_ATTEMPTS: usize = 1000;

/// Draws random candidate keys and claims a free one in the record store.
/// The random source is deliberately non-cryptographic: keys are public
/// identifiers, not secrets.
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    pub length: usize,
    pub use_digits: bool,
    pub use_uppercase: bool,
}

impl KeyGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            use_digits: false,
            use_uppercase: false,
        }
    }

    fn alphabet(&self) -> String {
        let mut letters = String::from(ASCII_LOWERCASE);
        if self.use_digits {
            letters.push_str(DIGITS);
        }
        if self.use_uppercase {
            letters.push_str(ASCII_UPPERCASE);
        }
        letters
    }

    /// Draw one random candidate of the configured length.
    pub fn candidate(&self) -> String {
        let letters: Vec<char> = self.alphabet().chars().collect();
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| letters[rng.random_range(0..letters.len())])
            .collect()
    }

    /// Reserve a free key and write its record in one step. `make` builds
    /// the record for a candidate key, so records whose file path embeds the
    /// key can be claimed atomically. The claim is a conditional write, so
    /// two concurrent requests can never both win the same key.
    pub async fn reserve<F>(
        &self,
        store: &dyn RecordStore,
        make: F,
    ) -> Result<(String, Record), CdnError>
    where
        F: Fn(&str) -> Record,
    {
        self.reserve_with(store, make, || self.candidate()).await
    }

    /// Same as [`KeyGenerator::reserve`] but with an explicit candidate
    /// source, which lets tests script the draw sequence.
    pub async fn reserve_with<F, G>(
        &self,
        store: &dyn RecordStore,
        make: F,
        mut next: G,
    ) -> Result<(String, Record), CdnError>
    where
        F: Fn(&str) -> Record,
        G: FnMut() -> String,
    {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = next();
            // Reserved words are rejected before the store is ever consulted.
            if RESERVED_KEYS.contains(&candidate.as_str()) {
                continue;
            }
            let record = make(&candidate);
            if store.set_if_absent(&candidate, &record).await? {
                return Ok((candidate, record));
            }
        }
        Err(CdnError::KeyspaceExhausted)
    }
}
