//! Key listing filters and CSV export.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use keysmith::export;
use keysmith::redemption::{redeem_activation_key, revoke_activation_key};

struct Ledger {
    conn: rusqlite::Connection,
    alg: SalesPoint,
    orn: SalesPoint,
    alg_codes: Vec<String>,
    orn_codes: Vec<String>,
}

/// Three ALG keys (one used by a 2nd-year student, one revoked) and two ORN keys.
fn ledger() -> Ledger {
    let mut conn = setup_test_db();
    let alg = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let orn = create_test_sales_point(&conn, "ORN", "Papeterie El Bahia");
    let alg_codes = issue_test_batch(&mut conn, &alg.id, 3, Some(1000)).codes;
    let orn_codes = issue_test_batch(&mut conn, &orn.id, 2, Some(1000)).codes;

    let account = create_test_account(&conn, "amina@example.com");
    redeem_activation_key(&mut conn, &alg_codes[0], &account.id).unwrap();
    let revoked = queries::get_activation_key_by_code(&conn, &alg_codes[2])
        .unwrap()
        .unwrap();
    revoke_activation_key(&conn, &revoked.id).unwrap();

    Ledger {
        conn,
        alg,
        orn,
        alg_codes,
        orn_codes,
    }
}

fn list(conn: &rusqlite::Connection, filters: ActivationKeyFilters) -> Vec<ActivationKey> {
    queries::list_activation_keys(conn, &filters).unwrap()
}

#[test]
fn test_default_listing_hides_revoked() {
    let l = ledger();

    let keys = list(&l.conn, ActivationKeyFilters::default());

    assert_eq!(keys.len(), 4);
    assert!(keys.iter().all(|k| k.status() != KeyStatus::Revoked));
}

#[test]
fn test_status_filters() {
    let l = ledger();

    let used = list(
        &l.conn,
        ActivationKeyFilters {
            status: Some(KeyStatus::Used),
            ..Default::default()
        },
    );
    assert_eq!(used.len(), 1);
    assert_eq!(used[0].key_code, l.alg_codes[0]);

    let unused = list(
        &l.conn,
        ActivationKeyFilters {
            status: Some(KeyStatus::Unused),
            ..Default::default()
        },
    );
    assert_eq!(unused.len(), 3);

    let revoked = list(
        &l.conn,
        ActivationKeyFilters {
            status: Some(KeyStatus::Revoked),
            ..Default::default()
        },
    );
    assert_eq!(revoked.len(), 1);
    assert_eq!(revoked[0].key_code, l.alg_codes[2]);
}

#[test]
fn test_sales_point_and_year_filters() {
    let l = ledger();

    let orn = list(
        &l.conn,
        ActivationKeyFilters {
            sales_point_id: Some(l.orn.id.clone()),
            ..Default::default()
        },
    );
    let mut orn_codes: Vec<String> = orn.into_iter().map(|k| k.key_code).collect();
    orn_codes.sort();
    let mut expected = l.orn_codes.clone();
    expected.sort();
    assert_eq!(orn_codes, expected);

    let second_year = list(
        &l.conn,
        ActivationKeyFilters {
            year: Some(2),
            ..Default::default()
        },
    );
    assert_eq!(second_year.len(), 1);
    assert_eq!(
        second_year[0].sales_point_id.as_deref(),
        Some(l.alg.id.as_str())
    );

    let fourth_year = list(
        &l.conn,
        ActivationKeyFilters {
            year: Some(4),
            ..Default::default()
        },
    );
    assert!(fourth_year.is_empty());
}

#[test]
fn test_search_is_case_insensitive_substring() {
    let l = ledger();
    let fragment = l.alg_codes[1][4..10].to_lowercase();

    let keys = list(
        &l.conn,
        ActivationKeyFilters {
            search: Some(fragment),
            ..Default::default()
        },
    );

    assert!(keys.iter().any(|k| k.key_code == l.alg_codes[1]));
}

#[test]
fn test_search_wildcards_are_literal() {
    let l = ledger();

    let keys = list(
        &l.conn,
        ActivationKeyFilters {
            search: Some("%".to_string()),
            ..Default::default()
        },
    );

    assert!(keys.is_empty());
}

#[test]
fn test_pagination_reports_total() {
    let l = ledger();

    let (page, total) =
        queries::list_activation_keys_paginated(&l.conn, &ActivationKeyFilters::default(), 2, 0)
            .unwrap();
    assert_eq!(total, 4);
    assert_eq!(page.len(), 2);

    let (rest, _) =
        queries::list_activation_keys_paginated(&l.conn, &ActivationKeyFilters::default(), 2, 2)
            .unwrap();
    assert_eq!(rest.len(), 2);
    assert!(page.iter().all(|k| rest.iter().all(|r| r.id != k.id)));
}

#[test]
fn test_csv_export_of_listing() {
    let l = ledger();
    let keys = list(
        &l.conn,
        ActivationKeyFilters {
            status: Some(KeyStatus::Used),
            ..Default::default()
        },
    );

    let csv = export::keys_to_csv(&keys);
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Code,Sales Point,"));
    assert!(lines[1].contains(&format!("\"{}\"", l.alg_codes[0])));
    assert!(lines[1].contains("\"Librairie du Centre\""));
    assert!(lines[1].contains("\"amina@example.com\""));
    assert!(lines[1].contains("\"used\""));
}
