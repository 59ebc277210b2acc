//! Prefixed ID generation for Keysmith entities.
//!
//! Format: `ks_{entity}_{uuid_simple}` (32 hex chars, no hyphens).
//! The prefix makes IDs self-describing in logs and CSV exports.

use uuid::Uuid;

const ALL_PREFIXES: &[&str] = &["ks_key_", "ks_sp_", "ks_usr_", "ks_pay_", "ks_bat_"];

/// Cheap shape check to reject garbage before hitting the database.
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that carry prefixed IDs.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    ActivationKey,
    SalesPoint,
    Account,
    OnlinePayment,
    Batch,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ActivationKey => "ks_key",
            Self::SalesPoint => "ks_sp",
            Self::Account => "ks_usr",
            Self::OnlinePayment => "ks_pay",
            Self::Batch => "ks_bat",
        }
    }

    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}
