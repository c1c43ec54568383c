//! Collision-avoiding short key allocation.
//!
//! Keys are drawn uniformly from a 52-letter alphabet. The allocator starts at
//! the configured length and, after `max_iterations` consecutive collisions,
//! doubles the length. It gives up with [`StoreError::KeySpaceExhausted`]
//! once the length exceeds `max_length`.
//!
//! Storage mechanics stay behind [`OccupancyCheck`], supplied by the store.

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Symbols a key is made of.
pub const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Key generation settings, fixed at process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStoreConfig {
    pub initial_length: usize,
    pub max_length: usize,
    pub max_iterations: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            initial_length: 8,
            max_length: 100,
            max_iterations: 10,
        }
    }
}

/// Answer of an occupancy check for one candidate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    /// The key was free and is now bound to the value.
    Free,
    /// The key is already in use; try another one.
    Occupied,
}

/// Store-supplied predicate telling the allocator whether a key is taken.
///
/// An implementation may claim the key as part of the check (the relational
/// backend inserts the row right away). A [`Occupancy::Free`] answer is final:
/// the allocator returns that key. Errors are propagated to the caller as-is.
#[async_trait]
pub trait OccupancyCheck: Send {
    async fn check(&mut self, key: &str, value: &str) -> StoreResult<Occupancy>;
}

/// Generates keys unique within the store behind an [`OccupancyCheck`].
#[derive(Debug, Clone, Copy)]
pub struct KeyAllocator {
    config: KeyStoreConfig,
}

impl KeyAllocator {
    pub fn new(config: KeyStoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// Allocates a key for `value`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::KeySpaceExhausted`] when no free key was found up to `max_length`
    ///   (including `initial_length > max_length`)
    /// - any error returned by `check`
    pub async fn allocate_unique_key<C>(&self, value: &str, check: &mut C) -> StoreResult<String>
    where
        C: OccupancyCheck + ?Sized,
    {
        let mut length = self.config.initial_length;
        let mut attempts = 0;

        while length <= self.config.max_length {
            let key = random_key(length);

            match check.check(&key, value).await? {
                Occupancy::Free => return Ok(key),
                Occupancy::Occupied => {
                    attempts += 1;
                    if attempts >= self.config.max_iterations {
                        debug!(
                            "{} collisions at key length {}, growing key",
                            attempts, length
                        );
                        length *= 2;
                        attempts = 0;
                    }
                }
            }
        }

        warn!(
            "Key space exhausted: initial length {}, max length {}",
            self.config.initial_length, self.config.max_length
        );

        Err(StoreError::KeySpaceExhausted {
            initial_length: self.config.initial_length,
            max_length: self.config.max_length,
        })
    }
}

/// Builds a random key of `length` symbols from [`KEY_ALPHABET`].
pub fn random_key(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}
