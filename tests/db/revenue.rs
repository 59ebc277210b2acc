//! Dashboard, per-sales-point and revenue aggregation.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use keysmith::payments::{complete_online_payment, create_online_payment};
use keysmith::pricing::DurationPriceTable;
use keysmith::redemption::{redeem_activation_key, revoke_activation_key};
use keysmith::revenue;

struct Fixture {
    conn: rusqlite::Connection,
    alg: SalesPoint,
    orn: SalesPoint,
}

/// ALG: three keys at 1000, two redeemed. ORN: one unpriced key, redeemed.
fn fixture() -> Fixture {
    let mut conn = setup_test_db();
    let alg = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let orn = create_test_sales_point(&conn, "ORN", "Papeterie El Bahia");

    let alg_codes = issue_test_batch(&mut conn, &alg.id, 3, Some(1000)).codes;
    let orn_codes = issue_test_batch(&mut conn, &orn.id, 1, None).codes;

    for (i, code) in alg_codes.iter().take(2).enumerate() {
        let account = create_test_account(&conn, &format!("alg{}@example.com", i));
        redeem_activation_key(&mut conn, code, &account.id).unwrap();
    }
    let orn_user = create_test_account(&conn, "orn@example.com");
    redeem_activation_key(&mut conn, &orn_codes[0], &orn_user.id).unwrap();

    Fixture { conn, alg, orn }
}

fn alg_only(f: &Fixture) -> AnalyticsScope {
    AnalyticsScope::production(vec![f.alg.id.clone()])
}

#[test]
fn test_dashboard_counts_for_one_sales_point() {
    let f = fixture();

    let stats =
        revenue::fetch_dashboard_stats(&f.conn, &alg_only(&f), &PricingPolicy::ActualPrice).unwrap();

    assert_eq!(stats.total_codes, 3);
    assert_eq!(stats.used_codes, 2);
    assert_eq!(stats.unused_codes, 1);
    assert_eq!(stats.active_codes, 2);
    assert_eq!(stats.expired_codes, 0);
    assert_eq!(stats.revoked_codes, 0);
    assert_eq!(stats.total_revenue, 2000);
}

#[test]
fn test_dev_scope_includes_everything() {
    let f = fixture();

    let stats = revenue::fetch_dashboard_stats(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
    )
    .unwrap();

    assert_eq!(stats.total_codes, 4);
    assert_eq!(stats.used_codes, 3);
    // The ORN key carries no price, so actual pricing earns nothing from it
    assert_eq!(stats.total_revenue, 2000);
}

#[test]
fn test_estimated_pricing_uses_duration_table() {
    let f = fixture();
    let estimated = PricingPolicy::EstimatedByDuration(DurationPriceTable::default());

    let stats = revenue::fetch_dashboard_stats(&f.conn, &AnalyticsScope::dev(), &estimated).unwrap();

    assert_eq!(stats.total_revenue, 3000);
}

#[test]
fn test_production_scope_with_empty_list_includes_everything() {
    let f = fixture();

    let stats = revenue::fetch_dashboard_stats(
        &f.conn,
        &AnalyticsScope::production(vec![]),
        &PricingPolicy::ActualPrice,
    )
    .unwrap();

    assert_eq!(stats.total_codes, 4);
}

#[test]
fn test_expired_subscription_counts_as_expired() {
    let f = fixture();
    let orn_user = f
        .conn
        .query_row(
            "SELECT used_by FROM activation_keys WHERE sales_point_id = ?1",
            [&f.orn.id],
            |row| row.get::<_, String>(0),
        )
        .unwrap();
    queries::set_account_subscription(&f.conn, &orn_user, queries::now() - ONE_DAY).unwrap();

    let stats = revenue::fetch_dashboard_stats(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
    )
    .unwrap();

    assert_eq!(stats.used_codes, 3);
    assert_eq!(stats.active_codes, 2);
    assert_eq!(stats.expired_codes, 1);
}

#[test]
fn test_revoked_keys_counted_separately() {
    let mut f = fixture();
    let batch = issue_test_batch(&mut f.conn, &f.alg.id, 1, Some(1000));
    let key = queries::get_activation_key_by_code(&f.conn, &batch.codes[0])
        .unwrap()
        .unwrap();
    revoke_activation_key(&f.conn, &key.id).unwrap();

    let stats =
        revenue::fetch_dashboard_stats(&f.conn, &alg_only(&f), &PricingPolicy::ActualPrice).unwrap();
    assert_eq!(stats.total_codes, 3);
    assert_eq!(stats.revoked_codes, 1);

    let orn_only = AnalyticsScope::production(vec![f.orn.id.clone()]);
    let stats =
        revenue::fetch_dashboard_stats(&f.conn, &orn_only, &PricingPolicy::ActualPrice).unwrap();
    assert_eq!(stats.revoked_codes, 0, "revoked ALG key is out of ORN scope");
}

#[test]
fn test_online_keys_ignore_scope() {
    let mut f = fixture();
    let payment = create_online_payment(
        &f.conn,
        &CreateOnlinePayment {
            customer_email: "buyer@example.com".to_string(),
            customer_name: None,
            amount: 1500,
            currency: "dzd".to_string(),
            duration_days: 365,
        },
    )
    .unwrap();
    let completed = complete_online_payment(&mut f.conn, &payment.id).unwrap();
    let buyer = create_test_account(&f.conn, "buyer@example.com");
    redeem_activation_key(&mut f.conn, &completed.activation_key.key_code, &buyer.id).unwrap();

    let stats =
        revenue::fetch_dashboard_stats(&f.conn, &alg_only(&f), &PricingPolicy::ActualPrice).unwrap();

    assert_eq!(stats.total_codes, 4);
    assert_eq!(stats.used_codes, 3);
    assert_eq!(stats.total_revenue, 3500);
}

#[test]
fn test_sales_point_stats() {
    let f = fixture();

    let stats = revenue::fetch_sales_point_stats(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
    )
    .unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].code, "ALG", "ordered by name");
    assert_eq!(stats[0].total_codes, 3);
    assert_eq!(stats[0].used_codes, 2);
    assert_eq!(stats[0].active_codes, 2);
    assert_eq!(stats[0].total_revenue, 2000);
    assert!(stats[0].last_sale_at.is_some());

    assert_eq!(stats[1].code, "ORN");
    assert_eq!(stats[1].total_codes, 1);
    assert_eq!(stats[1].total_revenue, 0);

    let scoped =
        revenue::fetch_sales_point_stats(&f.conn, &alg_only(&f), &PricingPolicy::ActualPrice)
            .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, f.alg.id);
}

#[test]
fn test_sales_point_without_keys_reports_zeroes() {
    let f = fixture();
    let empty = create_test_sales_point(&f.conn, "ANB", "Annaba Corner");

    let stats = revenue::fetch_sales_point_stats(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
    )
    .unwrap();

    let row = stats.iter().find(|s| s.id == empty.id).unwrap();
    assert_eq!(row.total_codes, 0);
    assert_eq!(row.total_revenue, 0);
    assert!(row.last_sale_at.is_none());
}

#[test]
fn test_revenue_summary_splits_channels() {
    let mut f = fixture();
    let payment = create_online_payment(
        &f.conn,
        &CreateOnlinePayment {
            customer_email: "buyer@example.com".to_string(),
            customer_name: None,
            amount: 1500,
            currency: "dzd".to_string(),
            duration_days: 365,
        },
    )
    .unwrap();
    complete_online_payment(&mut f.conn, &payment.id).unwrap();

    let summary = revenue::fetch_revenue_summary(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
        None,
    )
    .unwrap();

    assert_eq!(summary.online_revenue, 1500);
    assert_eq!(summary.online_transactions, 1);
    assert_eq!(summary.sales_point_revenue, 2000);
    assert_eq!(summary.sales_point_transactions, 3);
    assert_eq!(summary.total_revenue, 3500);
    assert!((summary.average_transaction_value - 875.0).abs() < f64::EPSILON);

    assert_eq!(summary.monthly.len(), revenue::REVENUE_MONTHS);
    let current = summary.monthly.last().unwrap();
    assert_eq!(current.online, 1500);
    assert_eq!(current.sales_point, 2000);
    assert_eq!(current.total, 3500);
    let earlier: i64 = summary.monthly.iter().rev().skip(1).map(|m| m.total).sum();
    assert_eq!(earlier, 0);
}

#[test]
fn test_revenue_summary_since_in_future_is_empty() {
    let f = fixture();

    let summary = revenue::fetch_revenue_summary(
        &f.conn,
        &AnalyticsScope::dev(),
        &PricingPolicy::ActualPrice,
        Some(queries::now() + ONE_DAY),
    )
    .unwrap();

    assert_eq!(summary.total_revenue, 0);
    assert_eq!(summary.sales_point_transactions, 0);
    assert_eq!(summary.average_transaction_value, 0.0);
}
