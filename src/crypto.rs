//! Secure random source for code generation.
//!
//! Every activation code is derived from bytes drawn here. There is no
//! weak fallback: if the operating system CSPRNG cannot be read, generation
//! fails with an error and nothing is issued.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{AppError, Result};

/// Supplier of cryptographically strong random bytes.
pub trait SecureRandom: Send + Sync {
    /// Fill `buf` entirely or fail. Partial fills are never returned.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating-system CSPRNG (`getrandom` under the hood).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        OsRng.try_fill_bytes(buf).map_err(|e| {
            tracing::error!("OS random source unavailable: {}", e);
            AppError::Internal(format!("Secure random source unavailable: {}", e))
        })
    }
}
