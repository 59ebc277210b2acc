use serde::{Deserialize, Serialize};

/// Subscriber account. Owned by the authentication side; this crate reads
/// it and writes only `is_paid` and `subscription_expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub faculty: Option<String>,
    pub year_of_study: Option<i32>,
    pub speciality: Option<String>,
    pub region: Option<String>,
    pub is_paid: bool,
    pub subscription_expires_at: Option<i64>,
    pub created_at: i64,
}

impl Account {
    /// Paid with a subscription that has not lapsed at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.is_paid && self.subscription_expires_at.is_some_and(|exp| exp > now)
    }
}

/// Redeeming-account details attached to key listings and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub speciality: Option<String>,
    pub year_of_study: Option<i32>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAccount {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub faculty: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<i32>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}
