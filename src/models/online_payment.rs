use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Canceled,
}

/// A direct online purchase. Once paid it is linked to exactly one
/// activation key issued without a sales point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlinePayment {
    pub id: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub duration_days: i64,
    pub paid_at: Option<i64>,
    pub activation_key_id: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOnlinePayment {
    pub customer_email: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_duration")]
    pub duration_days: i64,
}

fn default_currency() -> String {
    "dzd".to_string()
}

fn default_duration() -> i64 {
    365
}
