//! Redemption: single use, subscription extension, concurrent claims.

#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use keysmith::redemption::{redeem_activation_key, revoke_activation_key};

#[test]
fn test_redeem_marks_key_used_and_activates_account() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let account = create_test_account(&conn, "amina@example.com");
    let batch = issue_test_batch(&mut conn, &sp.id, 1, Some(1000));
    let code = &batch.codes[0];

    let before = queries::now();
    let redemption = redeem_activation_key(&mut conn, code, &account.id).unwrap();

    assert_eq!(redemption.key_code, *code);
    assert_eq!(redemption.account_id, account.id);
    assert_eq!(redemption.duration_days, 365);
    let expected = before + ONE_YEAR;
    assert!((redemption.subscription_expires_at - expected).abs() <= 5);

    let key = queries::get_activation_key_by_code(&conn, code).unwrap().unwrap();
    assert_eq!(key.status(), KeyStatus::Used);
    assert_eq!(key.used_by.as_deref(), Some(account.id.as_str()));
    assert_eq!(key.used_at, Some(redemption.used_at));
    assert_eq!(key.expires_at, Some(redemption.subscription_expires_at));
    assert_eq!(
        key.used_by_account.as_ref().map(|a| a.email.as_str()),
        Some("amina@example.com")
    );

    let account = queries::get_account_by_id(&conn, &account.id).unwrap().unwrap();
    assert!(account.is_paid);
    assert_eq!(
        account.subscription_expires_at,
        Some(redemption.subscription_expires_at)
    );
    assert!(account.is_active(queries::now()));
}

#[test]
fn test_redeem_accepts_lowercase_and_whitespace() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let account = create_test_account(&conn, "amina@example.com");
    let batch = issue_test_batch(&mut conn, &sp.id, 1, None);

    let typed = format!("  {}  ", batch.codes[0].to_lowercase());
    let redemption = redeem_activation_key(&mut conn, &typed, &account.id).unwrap();

    assert_eq!(redemption.key_code, batch.codes[0]);
}

#[test]
fn test_second_redemption_conflicts_and_keeps_expiry() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let first = create_test_account(&conn, "first@example.com");
    let second = create_test_account(&conn, "second@example.com");
    let batch = issue_test_batch(&mut conn, &sp.id, 1, None);
    let code = &batch.codes[0];

    let redemption = redeem_activation_key(&mut conn, code, &first.id).unwrap();

    let again = redeem_activation_key(&mut conn, code, &first.id);
    assert!(matches!(again, Err(AppError::Conflict(_))));
    let other = redeem_activation_key(&mut conn, code, &second.id);
    assert!(matches!(other, Err(AppError::Conflict(_))));

    let first = queries::get_account_by_id(&conn, &first.id).unwrap().unwrap();
    assert_eq!(
        first.subscription_expires_at,
        Some(redemption.subscription_expires_at),
        "a rejected redemption must not extend the subscription"
    );
    let second = queries::get_account_by_id(&conn, &second.id).unwrap().unwrap();
    assert!(!second.is_paid);
    assert!(second.subscription_expires_at.is_none());
}

#[test]
fn test_second_key_extends_from_current_expiry() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let account = create_test_account(&conn, "amina@example.com");
    let batch = issue_test_batch(&mut conn, &sp.id, 2, None);

    let first = redeem_activation_key(&mut conn, &batch.codes[0], &account.id).unwrap();
    let second = redeem_activation_key(&mut conn, &batch.codes[1], &account.id).unwrap();

    assert_eq!(
        second.subscription_expires_at,
        first.subscription_expires_at + ONE_YEAR,
        "remaining time is kept"
    );
}

#[test]
fn test_lapsed_subscription_restarts_from_now() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let account = create_test_account(&conn, "amina@example.com");
    queries::set_account_subscription(&conn, &account.id, queries::now() - 30 * ONE_DAY).unwrap();
    let batch = issue_test_batch(&mut conn, &sp.id, 1, None);

    let before = queries::now();
    let redemption = redeem_activation_key(&mut conn, &batch.codes[0], &account.id).unwrap();

    assert!((redemption.subscription_expires_at - (before + ONE_YEAR)).abs() <= 5);
}

#[test]
fn test_malformed_code_is_validation_error() {
    let mut conn = setup_test_db();
    let account = create_test_account(&conn, "amina@example.com");

    for code in ["", "ALG", "ALG-ABCDEFGH", "ALG-ABCDEFG0-2K", "ALG-ABCDEFGH-2K-XX"] {
        let result = redeem_activation_key(&mut conn, code, &account.id);
        assert!(
            matches!(result, Err(AppError::Validation(_))),
            "{:?} should be rejected as malformed",
            code
        );
    }
}

#[test]
fn test_unknown_code_is_not_found() {
    let mut conn = setup_test_db();
    let account = create_test_account(&conn, "amina@example.com");

    let result = redeem_activation_key(&mut conn, "ALG-ABCDEFGH-2K", &account.id);

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_unknown_account_is_referential_and_key_stays_unused() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let batch = issue_test_batch(&mut conn, &sp.id, 1, None);

    let result = redeem_activation_key(&mut conn, &batch.codes[0], "ks_usr_missing");

    assert!(matches!(result, Err(AppError::Referential(_))));
    let key = queries::get_activation_key_by_code(&conn, &batch.codes[0])
        .unwrap()
        .unwrap();
    assert_eq!(key.status(), KeyStatus::Unused);
}

#[test]
fn test_revoked_key_cannot_be_redeemed() {
    let mut conn = setup_test_db();
    let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
    let account = create_test_account(&conn, "amina@example.com");
    let batch = issue_test_batch(&mut conn, &sp.id, 1, None);
    let key = queries::get_activation_key_by_code(&conn, &batch.codes[0])
        .unwrap()
        .unwrap();
    revoke_activation_key(&conn, &key.id).unwrap();

    let result = redeem_activation_key(&mut conn, &batch.codes[0], &account.id);

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let account = queries::get_account_by_id(&conn, &account.id).unwrap().unwrap();
    assert!(!account.is_paid);
}

#[test]
fn test_concurrent_redemptions_have_one_winner() {
    const ATTEMPTS: usize = 6;

    let (pool, _dir) = setup_test_pool();
    let (code, account_ids) = {
        let mut conn = pool.get().unwrap();
        let sp = create_test_sales_point(&conn, "ALG", "Librairie du Centre");
        let batch = issue_test_batch(&mut conn, &sp.id, 1, Some(1000));
        let accounts: Vec<String> = (0..ATTEMPTS)
            .map(|i| create_test_account(&conn, &format!("racer{}@example.com", i)).id)
            .collect();
        (batch.codes[0].clone(), accounts)
    };

    let barrier = Arc::new(Barrier::new(ATTEMPTS));
    let handles: Vec<_> = account_ids
        .iter()
        .cloned()
        .map(|account_id| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            let code = code.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                barrier.wait();
                redeem_activation_key(&mut conn, &code, &account_id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one redemption may succeed");
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, AppError::Conflict(_)), "losers see Conflict, got {:?}", e);
        }
    }

    let conn = pool.get().unwrap();
    let paid: i64 = conn
        .query_row("SELECT COUNT(*) FROM users WHERE is_paid = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(paid, 1, "only the winner's subscription is extended");

    let winner = queries::get_account_by_id(&conn, &winners[0].account_id)
        .unwrap()
        .unwrap();
    let expires_at = winner.subscription_expires_at.unwrap();
    assert!(
        (expires_at - (winners[0].used_at + ONE_YEAR)).abs() <= 1,
        "subscription extended exactly once"
    );
}
