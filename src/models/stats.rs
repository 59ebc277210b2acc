use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Ledger-wide counters. `active + expired == used`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_codes: i64,
    pub unused_codes: i64,
    pub used_codes: i64,
    /// Redeemed keys whose account subscription is still running.
    pub active_codes: i64,
    /// Redeemed keys whose account subscription has lapsed.
    pub expired_codes: i64,
    pub revoked_codes: i64,
    /// Revenue from redeemed keys under the requested pricing policy.
    pub total_revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesPointStats {
    pub id: String,
    pub code: String,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub total_codes: i64,
    pub used_codes: i64,
    pub active_codes: i64,
    pub expired_codes: i64,
    pub total_revenue: i64,
    /// Most recent redemption of one of this sales point's keys.
    pub last_sale_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub online: i64,
    pub sales_point: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub online_revenue: i64,
    pub sales_point_revenue: i64,
    pub total_revenue: i64,
    pub online_transactions: i64,
    pub sales_point_transactions: i64,
    pub average_transaction_value: f64,
    /// Twelve calendar months ending with the current one, oldest first.
    pub monthly: Vec<MonthlyRevenue>,
}

/// Channel through which a subscriber's key was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelSource {
    SalesPoint,
    OnlinePayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Expired,
}

/// A subscriber who redeemed a key from a sales point or an online payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealUser {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub year_of_study: Option<i32>,
    pub speciality: Option<String>,
    pub region: Option<String>,
    pub source: ChannelSource,
    pub sales_point_id: Option<String>,
    pub sales_point_name: Option<String>,
    pub sales_point_code: Option<String>,
    pub sales_point_location: Option<String>,
    pub key_code: String,
    pub activated_at: i64,
    pub is_paid: bool,
    pub subscription_expires_at: Option<i64>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RealUserFilters {
    pub sales_point_id: Option<String>,
    pub status: Option<SubscriptionState>,
    pub source: Option<ChannelSource>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesPointCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RealUserStats {
    pub total_real_users: i64,
    pub active_users: i64,
    pub expired_users: i64,
    pub sales_point_users: i64,
    pub online_payment_users: i64,
    /// Sorted by count, descending.
    pub by_sales_point: Vec<SalesPointCount>,
}
