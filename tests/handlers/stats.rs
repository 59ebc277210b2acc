//! Reporting endpoints and their scope/pricing overrides.

use axum::http::StatusCode;

#[path = "../common/mod.rs"]
mod common;
use common::*;
use keysmith::redemption::redeem_activation_key;

/// ALG: two keys at 1000, one redeemed. ORN: one key at 1000, redeemed.
fn seeded_state() -> (AppState, String, String, tempfile::TempDir) {
    let (state, dir) = test_state();
    let (alg_id, orn_id) = {
        let mut conn = state.db.get().unwrap();
        let alg = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
        let orn = create_test_sales_point(&conn, "ORN", "Papeterie El Bahia");
        let alg_codes = issue_test_batch(&mut conn, &alg.id, 2, Some(1000)).codes;
        let orn_codes = issue_test_batch(&mut conn, &orn.id, 1, Some(1000)).codes;
        let amina = create_test_account(&conn, "amina@example.com");
        let karim = create_test_account(&conn, "karim@example.com");
        redeem_activation_key(&mut conn, &alg_codes[0], &amina.id).unwrap();
        redeem_activation_key(&mut conn, &orn_codes[0], &karim.id).unwrap();
        (alg.id, orn.id)
    };
    (state, alg_id, orn_id, dir)
}

#[tokio::test]
async fn test_dashboard_defaults_and_overrides() {
    let (state, alg_id, _orn_id, _dir) = seeded_state();
    let app = keysmith::app(state);

    let (status, all) = send(&app, "GET", "/stats/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total_codes"], 3);
    assert_eq!(all["used_codes"], 2);
    assert_eq!(all["total_revenue"], 2000);

    let uri = format!(
        "/stats/dashboard?mode=production&production_sales_points={}",
        alg_id
    );
    let (status, scoped) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scoped["total_codes"], 2);
    assert_eq!(scoped["used_codes"], 1);
    assert_eq!(scoped["total_revenue"], 1000);

    let (status, _) = send(&app, "GET", "/stats/dashboard?pricing=guess", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sales_point_stats_and_revenue() {
    let (state, _alg_id, orn_id, _dir) = seeded_state();
    let app = keysmith::app(state);

    let (status, stats) = send(&app, "GET", "/stats/sales-points", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = stats.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["id"], orn_id.as_str());
    assert_eq!(rows[1]["total_revenue"], 1000);

    let (status, summary) = send(&app, "GET", "/stats/revenue?pricing=estimated", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["sales_point_revenue"], 2000);
    assert_eq!(summary["monthly"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_real_users_endpoints() {
    let (state, _alg_id, orn_id, _dir) = seeded_state();
    let app = keysmith::app(state);

    let (status, users) = send(&app, "GET", "/users/real", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let uri = format!("/users/real?sales_point_id={}", orn_id);
    let (_, filtered) = send(&app, "GET", &uri, None).await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["email"], "karim@example.com");

    let (status, stats) = send(&app, "GET", "/users/real/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_real_users"], 2);
    assert_eq!(stats["sales_point_users"], 2);

    let (status, csv) = send(&app, "GET", "/users/real/export.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(csv.as_str().unwrap().lines().count(), 3);
}
