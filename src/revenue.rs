//! Read-side aggregation over the ledger and online payments.
//!
//! Every figure is recomputed from the tables on each call; nothing here is
//! stored. The analytics scope and pricing policy are explicit arguments so
//! two configurations can be evaluated against the same data.
//!
//! Scope rules: keys from sales points outside the scope are dropped.
//! Keys with no sales point (online channel) and online payments are never
//! filtered.
//!
//! Revenue rules: only redeemed keys earn revenue. A sales-point key earns
//! whatever the [`PricingPolicy`] says; an online key earns its recorded
//! price, which is the payment amount.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use rusqlite::Connection;

use crate::config::AnalyticsScope;
use crate::db::queries::{self, KeyUsage};
use crate::error::Result;
use crate::models::{
    ChannelSource, DashboardStats, MonthlyRevenue, RealUser, RealUserFilters, RealUserStats,
    RevenueSummary, SalesPointCount, SalesPointStats, SubscriptionState,
};
use crate::pricing::PricingPolicy;

/// Number of monthly buckets in [`RevenueSummary::monthly`].
pub const REVENUE_MONTHS: usize = 12;

fn in_scope(scope: &AnalyticsScope, usage: &KeyUsage) -> bool {
    usage
        .sales_point_id
        .as_deref()
        .is_none_or(|id| scope.includes(id))
}

fn key_revenue(pricing: &PricingPolicy, usage: &KeyUsage) -> i64 {
    if !usage.is_used {
        return 0;
    }
    match usage.sales_point_id {
        Some(_) => pricing.key_revenue(usage.price_paid, usage.duration_days),
        None => usage.price_paid.unwrap_or(0),
    }
}

pub fn fetch_dashboard_stats(
    conn: &Connection,
    scope: &AnalyticsScope,
    pricing: &PricingPolicy,
) -> Result<DashboardStats> {
    let now = queries::now();
    let mut stats = DashboardStats::default();

    for usage in queries::list_key_usage(conn)?
        .iter()
        .filter(|u| in_scope(scope, u))
    {
        if usage.is_revoked {
            stats.revoked_codes += 1;
            continue;
        }
        stats.total_codes += 1;
        if !usage.is_used {
            stats.unused_codes += 1;
            continue;
        }
        stats.used_codes += 1;
        if usage.is_active(now) {
            stats.active_codes += 1;
        } else {
            stats.expired_codes += 1;
        }
        stats.total_revenue = stats.total_revenue.saturating_add(key_revenue(pricing, usage));
    }

    Ok(stats)
}

pub fn fetch_sales_point_stats(
    conn: &Connection,
    scope: &AnalyticsScope,
    pricing: &PricingPolicy,
) -> Result<Vec<SalesPointStats>> {
    let now = queries::now();

    let mut by_sales_point: HashMap<String, Vec<KeyUsage>> = HashMap::new();
    for usage in queries::list_key_usage(conn)? {
        if usage.is_revoked {
            continue;
        }
        if let Some(id) = usage.sales_point_id.clone() {
            by_sales_point.entry(id).or_default().push(usage);
        }
    }

    let stats = queries::list_sales_points(conn)?
        .into_iter()
        .filter(|sp| scope.includes(&sp.id))
        .map(|sp| {
            let usages = by_sales_point.remove(&sp.id).unwrap_or_default();
            let used: Vec<&KeyUsage> = usages.iter().filter(|u| u.is_used).collect();
            let active_codes = used.iter().filter(|u| u.is_active(now)).count() as i64;
            SalesPointStats {
                total_codes: usages.len() as i64,
                used_codes: used.len() as i64,
                active_codes,
                expired_codes: used.len() as i64 - active_codes,
                total_revenue: used
                    .iter()
                    .fold(0i64, |acc, u| acc.saturating_add(key_revenue(pricing, u))),
                last_sale_at: used.iter().filter_map(|u| u.used_at).max(),
                id: sp.id,
                code: sp.code,
                name: sp.name,
                location: sp.location,
                is_active: sp.is_active,
            }
        })
        .collect();

    Ok(stats)
}

/// `YYYY-MM` for a Unix timestamp.
fn month_key(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.format("%Y-%m").to_string())
}

/// The last `count` calendar months ending with the month of `now`, oldest first.
fn trailing_months(now: DateTime<Utc>, count: usize) -> Vec<String> {
    let mut year = now.year();
    let mut month = now.month() as i32;
    let mut months = Vec::with_capacity(count);
    for _ in 0..count {
        months.push(format!("{:04}-{:02}", year, month));
        month -= 1;
        if month == 0 {
            month = 12;
            year -= 1;
        }
    }
    months.reverse();
    months
}

fn bucket(monthly: &mut [MonthlyRevenue], ts: Option<i64>) -> Option<&mut MonthlyRevenue> {
    let key = ts.and_then(month_key)?;
    monthly.iter_mut().find(|m| m.month == key)
}

/// Revenue split by channel with monthly buckets.
///
/// `since` drops anything that happened before it. Sales-point keys are
/// dated by redemption; online payments by their key's redemption, falling
/// back to the payment time.
pub fn fetch_revenue_summary(
    conn: &Connection,
    scope: &AnalyticsScope,
    pricing: &PricingPolicy,
    since: Option<i64>,
) -> Result<RevenueSummary> {
    let after_since = |ts: Option<i64>| match since {
        Some(bound) => ts.is_some_and(|t| t >= bound),
        None => true,
    };

    let mut monthly: Vec<MonthlyRevenue> = trailing_months(Utc::now(), REVENUE_MONTHS)
        .into_iter()
        .map(|month| MonthlyRevenue {
            month,
            ..Default::default()
        })
        .collect();

    let (mut online_revenue, mut online_transactions) = (0i64, 0i64);
    for payment in queries::list_paid_online_payments(conn)? {
        let at = payment.occurred_at();
        if !after_since(at) {
            continue;
        }
        online_revenue = online_revenue.saturating_add(payment.amount);
        online_transactions += 1;
        if let Some(m) = bucket(&mut monthly, at) {
            m.online = m.online.saturating_add(payment.amount);
        }
    }

    let (mut sales_point_revenue, mut sales_point_transactions) = (0i64, 0i64);
    for usage in queries::list_key_usage(conn)? {
        if usage.is_revoked || !usage.is_used || usage.sales_point_id.is_none() {
            continue;
        }
        if !in_scope(scope, &usage) || !after_since(usage.used_at) {
            continue;
        }
        let revenue = key_revenue(pricing, &usage);
        sales_point_revenue = sales_point_revenue.saturating_add(revenue);
        sales_point_transactions += 1;
        if let Some(m) = bucket(&mut monthly, usage.used_at) {
            m.sales_point = m.sales_point.saturating_add(revenue);
        }
    }

    for m in &mut monthly {
        m.total = m.online.saturating_add(m.sales_point);
    }

    let total_revenue = online_revenue.saturating_add(sales_point_revenue);
    let transactions = online_transactions + sales_point_transactions;
    let average_transaction_value = if transactions > 0 {
        total_revenue as f64 / transactions as f64
    } else {
        0.0
    };

    Ok(RevenueSummary {
        online_revenue,
        sales_point_revenue,
        total_revenue,
        online_transactions,
        sales_point_transactions,
        average_transaction_value,
        monthly,
    })
}

/// Union of sales-point and online redeemers, one entry per account.
///
/// An account reached through both channels is reported once, under its
/// most recent sales-point redemption.
fn collect_real_users(conn: &Connection, scope: &AnalyticsScope) -> Result<Vec<RealUser>> {
    let now = queries::now();
    let mut seen: HashSet<String> = HashSet::new();
    let mut users = Vec::new();

    let sales_point_users = queries::list_sales_point_redeemers(conn, now)?
        .into_iter()
        .filter(|u| u.sales_point_id.as_deref().is_none_or(|id| scope.includes(id)));
    let online_users = queries::list_online_redeemers(conn, now)?;

    for user in sales_point_users.chain(online_users) {
        if seen.insert(user.id.clone()) {
            users.push(user);
        }
    }

    users.sort_by(|a, b| b.activated_at.cmp(&a.activated_at));
    Ok(users)
}

fn matches_filters(user: &RealUser, filters: &RealUserFilters, search: Option<&str>) -> bool {
    if let Some(ref id) = filters.sales_point_id
        && user.sales_point_id.as_ref() != Some(id)
    {
        return false;
    }
    if let Some(source) = filters.source
        && user.source != source
    {
        return false;
    }
    match filters.status {
        Some(SubscriptionState::Active) if !user.is_active => return false,
        Some(SubscriptionState::Expired) if user.is_active => return false,
        _ => {}
    }
    let Some(search) = search else {
        return true;
    };
    let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(search));
    contains(Some(&user.email))
        || contains(user.full_name.as_deref())
        || contains(user.sales_point_name.as_deref())
        || contains(Some(&user.key_code))
}

/// Genuine customers, newest activation first.
pub fn fetch_real_users(
    conn: &Connection,
    scope: &AnalyticsScope,
    filters: &RealUserFilters,
) -> Result<Vec<RealUser>> {
    let search = filters
        .search
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    Ok(collect_real_users(conn, scope)?
        .into_iter()
        .filter(|u| matches_filters(u, filters, search.as_deref()))
        .collect())
}

pub fn fetch_real_user_stats(conn: &Connection, scope: &AnalyticsScope) -> Result<RealUserStats> {
    let users = collect_real_users(conn, scope)?;

    let mut counts: HashMap<&str, i64> = HashMap::new();
    for name in users.iter().filter_map(|u| u.sales_point_name.as_deref()) {
        *counts.entry(name).or_default() += 1;
    }
    let mut by_sales_point: Vec<SalesPointCount> = counts
        .into_iter()
        .map(|(name, count)| SalesPointCount {
            name: name.to_string(),
            count,
        })
        .collect();
    by_sales_point.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    let active_users = users.iter().filter(|u| u.is_active).count() as i64;
    Ok(RealUserStats {
        total_real_users: users.len() as i64,
        active_users,
        expired_users: users.len() as i64 - active_users,
        sales_point_users: users
            .iter()
            .filter(|u| u.source == ChannelSource::SalesPoint)
            .count() as i64,
        online_payment_users: users
            .iter()
            .filter(|u| u.source == ChannelSource::OnlinePayment)
            .count() as i64,
        by_sales_point,
    })
}
