use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{AccountSummary, SalesPointRef};

/// Longest duration a single key may grant (ten years).
pub const MAX_DURATION_DAYS: i64 = 3650;

/// Upper bound on a recorded price or payment amount, in minor units.
pub const MAX_PRICE: i64 = 1_000_000_000;

/// Lifecycle state. `Used` and `Revoked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStatus {
    Unused,
    Used,
    Revoked,
}

/// Write-once audit trail recorded at generation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub algorithm: String,
    /// Generation time in Unix milliseconds.
    pub timestamp: i64,
    pub checksum: String,
    /// Position within the batch (0 for single issuance).
    pub batch_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationKey {
    pub id: String,
    pub key_code: String,
    pub duration_days: i64,
    /// Absent for keys issued through online payment.
    pub sales_point_id: Option<String>,
    pub batch_id: String,
    pub notes: Option<String>,
    pub price_paid: Option<i64>,
    pub created_by: Option<String>,
    pub generation_params: Option<GenerationParams>,
    pub is_used: bool,
    /// Set iff `is_used`.
    pub used_by: Option<String>,
    /// Set iff `is_used`.
    pub used_at: Option<i64>,
    /// Subscription expiry granted by this key, recorded at redemption.
    pub expires_at: Option<i64>,
    pub revoked_at: Option<i64>,
    pub created_at: i64,
    /// Issuing channel, resolved at the data-access boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_point: Option<SalesPointRef>,
    /// Redeeming account, resolved at the data-access boundary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_by_account: Option<AccountSummary>,
}

impl ActivationKey {
    pub fn status(&self) -> KeyStatus {
        if self.is_used {
            KeyStatus::Used
        } else if self.revoked_at.is_some() {
            KeyStatus::Revoked
        } else {
            KeyStatus::Unused
        }
    }
}

/// Filters for listing keys. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivationKeyFilters {
    /// Redeeming account's year of study.
    pub year: Option<i32>,
    /// Redeeming account's faculty.
    pub faculty: Option<String>,
    pub sales_point_id: Option<String>,
    /// `None` lists unused and used keys but hides revoked ones.
    pub status: Option<KeyStatus>,
    pub batch_id: Option<String>,
    /// Case-insensitive substring of the key code.
    pub search: Option<String>,
}

/// Input for batch issuance.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchParams {
    pub sales_point_id: String,
    pub duration_days: i64,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub price_paid: Option<i64>,
}

/// Result of a committed batch.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedBatch {
    pub batch_id: String,
    /// Plaintext codes in batch order, all of them persisted.
    pub codes: Vec<String>,
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub key_id: String,
    pub key_code: String,
    pub account_id: String,
    pub duration_days: i64,
    pub used_at: i64,
    pub subscription_expires_at: i64,
}

/// A fully prepared ledger row, ready to insert.
#[derive(Debug, Clone)]
pub struct NewActivationKey {
    pub id: String,
    pub key_code: String,
    pub duration_days: i64,
    pub sales_point_id: Option<String>,
    pub batch_id: String,
    pub notes: Option<String>,
    pub price_paid: Option<i64>,
    pub created_by: Option<String>,
    pub generation_params: GenerationParams,
    pub created_at: i64,
}
