//! Activation code generation and format checks.
//!
//! Format: `{PREFIX}-{BODY}-{CC}`, e.g. `ALG-X7K9P2AB-4F`
//!
//! - `PREFIX`: first three characters of the sales-point code, upper-cased
//!   (shorter codes are used as-is, never padded)
//! - `BODY`: 8 symbols drawn from [`CODE_ALPHABET`]
//! - `CC`: 2-symbol checksum over `PREFIX-BODY`
//!
//! The checksum is salted with a slice of the same random draw and the salt
//! is not stored. It catches transcription typos and discourages guessing a
//! neighbouring code, but it cannot be re-verified later and is not a
//! tamper-evidence mechanism. The ledger is the only authority on validity.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{OsRandom, SecureRandom};
use crate::error::{AppError, Result};

/// Upper-case letters and digits with the visually ambiguous `0 O 1 I L`
/// removed (31 symbols).
pub const CODE_ALPHABET: &[u8; 31] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Identifier written into `generation_params.algorithm`.
pub const ALGORITHM_VERSION: &str = "secure-random-v2";

/// Prefix used for keys issued by the online-payment channel.
pub const ONLINE_PREFIX: &str = "PAY";

const PREFIX_MAX_LEN: usize = 3;
const BODY_LEN: usize = 8;
const CHECKSUM_LEN: usize = 2;
const DRAW_LEN: usize = 32;
const SALT_RANGE: std::ops::Range<usize> = 8..16;
const SPARE_RANGE: std::ops::Range<usize> = 16..32;

/// Bytes at or above this value are rejected so every symbol is equally likely.
const UNBIASED_LIMIT: u8 = (256 / CODE_ALPHABET.len() * CODE_ALPHABET.len()) as u8;

/// Upper bound on bytes consumed for one body before giving up on the source.
const MAX_BODY_BYTES: usize = 1024;

/// Output of a single code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub code: String,
    pub checksum: String,
    /// Generation time in Unix milliseconds.
    pub timestamp: i64,
}

/// Normalize a sales-point code into a code prefix.
///
/// Rejects empty codes and anything that is not ASCII alphanumeric, since a
/// stray hyphen would break the three-segment layout.
pub fn code_prefix(sales_point_code: &str) -> Result<String> {
    let prefix: String = sales_point_code
        .trim()
        .chars()
        .take(PREFIX_MAX_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if prefix.is_empty() {
        return Err(AppError::Validation("Sales point code is required".into()));
    }
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(
            "Sales point code must be ASCII letters and digits".into(),
        ));
    }
    Ok(prefix)
}

/// Generate a code for `sales_point_code` using the OS random source.
pub fn generate_secure_code(sales_point_code: &str) -> Result<GeneratedCode> {
    generate_secure_code_with(&OsRandom, sales_point_code)
}

/// Generate a code drawing randomness from `rng`.
///
/// Each call performs its own 32-byte draw; nothing is carried over between
/// calls.
pub fn generate_secure_code_with(
    rng: &dyn SecureRandom,
    sales_point_code: &str,
) -> Result<GeneratedCode> {
    let prefix = code_prefix(sales_point_code)?;
    let timestamp = Utc::now().timestamp_millis();

    let mut draw = [0u8; DRAW_LEN];
    rng.fill(&mut draw)?;

    let body = draw_body(rng, &draw)?;
    let base_code = format!("{}-{}", prefix, body);
    let checksum = checksum(&base_code, &draw[SALT_RANGE]);
    let code = format!("{}-{}", base_code, checksum);

    Ok(GeneratedCode {
        code,
        checksum,
        timestamp,
    })
}

/// Map random bytes onto the alphabet, starting with the first 8 bytes of
/// the draw and spilling into its unused tail (then fresh draws) for any
/// rejected byte.
fn draw_body(rng: &dyn SecureRandom, draw: &[u8; DRAW_LEN]) -> Result<String> {
    let mut pool: Vec<u8> = draw[..BODY_LEN]
        .iter()
        .chain(&draw[SPARE_RANGE])
        .copied()
        .collect();
    let mut body = String::with_capacity(BODY_LEN);
    let mut next = 0;

    while body.len() < BODY_LEN {
        if next == pool.len() {
            if pool.len() >= MAX_BODY_BYTES {
                return Err(AppError::Internal(
                    "Secure random source produced no usable bytes".into(),
                ));
            }
            let mut more = [0u8; DRAW_LEN];
            rng.fill(&mut more)?;
            pool.extend_from_slice(&more);
        }
        let byte = pool[next];
        next += 1;
        if byte < UNBIASED_LIMIT {
            body.push(CODE_ALPHABET[byte as usize % CODE_ALPHABET.len()] as char);
        }
    }

    Ok(body)
}

/// Position-weighted, salted fold over `base_code`, rendered as two symbols.
pub fn checksum(base_code: &str, salt: &[u8]) -> String {
    let mut sum: u32 = 0;
    for (i, byte) in base_code.bytes().enumerate() {
        let salt_byte = if salt.is_empty() {
            0
        } else {
            salt[i % salt.len()] as u32
        };
        sum = sum
            .wrapping_mul(31)
            .wrapping_add((byte as u32).wrapping_mul(i as u32 + 1))
            ^ salt_byte;
    }

    let len = CODE_ALPHABET.len() as u32;
    let c1 = CODE_ALPHABET[(sum % len) as usize] as char;
    let c2 = CODE_ALPHABET[((sum >> 8) % len) as usize] as char;
    [c1, c2].iter().collect()
}

/// Syntactic pre-check of a candidate code.
///
/// Checks the three-segment layout and segment lengths. The prefix may be
/// any upper-case letter or digit (it comes from the sales-point code); the
/// body and checksum must use [`CODE_ALPHABET`]. The checksum itself is not
/// (and cannot be) recomputed, so a single substituted symbol still passes.
pub fn is_well_formed(code: &str) -> bool {
    let mut parts = code.split('-');
    let (Some(prefix), Some(body), Some(check), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let upper_alnum = |s: &str| s.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    let in_alphabet = |s: &str| s.bytes().all(|b| CODE_ALPHABET.contains(&b));

    (1..=PREFIX_MAX_LEN).contains(&prefix.len())
        && body.len() == BODY_LEN
        && check.len() == CHECKSUM_LEN
        && upper_alnum(prefix)
        && in_alphabet(body)
        && in_alphabet(check)
}

/// Canonical form used for lookups: trimmed and upper-cased.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
