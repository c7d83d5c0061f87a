// 🔢 Member numbers - "MBR" + 4 zero-padded digits
//
// Draw, probe storage, retry on collision. The probe is best-effort: two
// callers can pick the same free number, so the UNIQUE constraint on
// members.member_number stays the final authority.

use crate::error::{RegistryError, Result};
use rand::rngs::ThreadRng;
use rand::Rng;

pub const MEMBER_NUMBER_PREFIX: &str = "MBR";

/// Default retry ceiling before reporting the space as exhausted
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

const MIN_SUFFIX: u32 = 1;
const MAX_SUFFIX: u32 = 9999;

pub struct MemberNumberGenerator<R: Rng = ThreadRng> {
    rng: R,
    max_attempts: usize,
}

impl MemberNumberGenerator<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng(), DEFAULT_MAX_ATTEMPTS)
    }
}

impl Default for MemberNumberGenerator<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MemberNumberGenerator<R> {
    pub fn with_rng(rng: R, max_attempts: usize) -> Self {
        MemberNumberGenerator {
            rng,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// One random candidate, no probing
    pub fn candidate(&mut self) -> String {
        format_member_number(self.rng.gen_range(MIN_SUFFIX..=MAX_SUFFIX))
    }

    /// Draw until `exists` reports a free candidate
    pub fn generate<F>(&mut self, mut exists: F) -> Result<String>
    where
        F: FnMut(&str) -> bool,
    {
        self.try_generate(|candidate| Ok(exists(candidate)))
    }

    /// Same as [`generate`](Self::generate) with a fallible storage probe
    pub fn try_generate<F>(&mut self, mut exists: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.candidate();
            if !exists(&candidate)? {
                return Ok(candidate);
            }
            tracing::debug!(%candidate, attempt, "member number already assigned");
        }

        tracing::warn!(attempts = self.max_attempts, "member number space exhausted");
        Err(RegistryError::GenerationExhausted {
            attempts: self.max_attempts,
        })
    }
}

pub fn format_member_number(suffix: u32) -> String {
    format!("{}{:04}", MEMBER_NUMBER_PREFIX, suffix)
}
