//! Online payments issue one `PAY` key each, exactly once.

#[path = "../common/mod.rs"]
mod common;

use common::*;
use keysmith::codes;
use keysmith::payments::{complete_online_payment, create_online_payment, fail_online_payment};
use keysmith::redemption::redeem_activation_key;

fn new_payment(conn: &rusqlite::Connection, amount: i64) -> OnlinePayment {
    create_online_payment(
        conn,
        &CreateOnlinePayment {
            customer_email: "Buyer@Example.com".to_string(),
            customer_name: Some("Buyer".to_string()),
            amount,
            currency: "dzd".to_string(),
            duration_days: 365,
        },
    )
    .unwrap()
}

#[test]
fn test_create_payment_is_pending() {
    let conn = setup_test_db();

    let payment = new_payment(&conn, 1500);

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.customer_email, "buyer@example.com");
    assert!(payment.activation_key_id.is_none());
    assert!(payment.paid_at.is_none());
}

#[test]
fn test_complete_payment_issues_online_key() {
    let mut conn = setup_test_db();
    let payment = new_payment(&conn, 1500);

    let completed = complete_online_payment(&mut conn, &payment.id).unwrap();

    assert_eq!(completed.payment.status, PaymentStatus::Paid);
    assert!(completed.payment.paid_at.is_some());
    assert_eq!(
        completed.payment.activation_key_id.as_deref(),
        Some(completed.activation_key.id.as_str())
    );

    let key = &completed.activation_key;
    assert!(key.key_code.starts_with("PAY-"));
    assert!(codes::is_well_formed(&key.key_code));
    assert!(key.sales_point_id.is_none());
    assert_eq!(key.price_paid, Some(1500));
    assert_eq!(key.duration_days, 365);
    assert_eq!(key.status(), KeyStatus::Unused);
}

#[test]
fn test_completing_twice_returns_same_key() {
    let mut conn = setup_test_db();
    let payment = new_payment(&conn, 1500);

    let first = complete_online_payment(&mut conn, &payment.id).unwrap();
    let second = complete_online_payment(&mut conn, &payment.id).unwrap();

    assert_eq!(first.activation_key.id, second.activation_key.id);
    assert_eq!(count_keys(&conn), 1);
}

#[test]
fn test_online_key_is_redeemable() {
    let mut conn = setup_test_db();
    let account = create_test_account(&conn, "buyer@example.com");
    let payment = new_payment(&conn, 1500);
    let completed = complete_online_payment(&mut conn, &payment.id).unwrap();

    let redemption =
        redeem_activation_key(&mut conn, &completed.activation_key.key_code, &account.id).unwrap();

    assert_eq!(redemption.key_id, completed.activation_key.id);
}

#[test]
fn test_failed_payment_cannot_complete() {
    let mut conn = setup_test_db();
    let payment = new_payment(&conn, 1500);

    let failed = fail_online_payment(&conn, &payment.id, PaymentStatus::Failed).unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    let result = complete_online_payment(&mut conn, &payment.id);
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert_eq!(count_keys(&conn), 0);
}

#[test]
fn test_paid_payment_cannot_be_canceled() {
    let mut conn = setup_test_db();
    let payment = new_payment(&conn, 1500);
    complete_online_payment(&mut conn, &payment.id).unwrap();

    let result = fail_online_payment(&conn, &payment.id, PaymentStatus::Canceled);

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
fn test_fail_rejects_non_terminal_status() {
    let conn = setup_test_db();
    let payment = new_payment(&conn, 1500);

    let result = fail_online_payment(&conn, &payment.id, PaymentStatus::Paid);

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn test_unknown_payment_not_found() {
    let mut conn = setup_test_db();

    assert!(matches!(
        complete_online_payment(&mut conn, "ks_pay_missing"),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        fail_online_payment(&conn, "ks_pay_missing", PaymentStatus::Failed),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_negative_amount_rejected() {
    let conn = setup_test_db();

    let result = create_online_payment(
        &conn,
        &CreateOnlinePayment {
            customer_email: "buyer@example.com".to_string(),
            customer_name: None,
            amount: -1,
            currency: "dzd".to_string(),
            duration_days: 365,
        },
    );

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn test_out_of_range_payment_rejected() {
    let conn = setup_test_db();
    let input = |amount: i64, duration_days: i64| CreateOnlinePayment {
        customer_email: "buyer@example.com".to_string(),
        customer_name: None,
        amount,
        currency: "dzd".to_string(),
        duration_days,
    };

    let too_long = create_online_payment(&conn, &input(1500, MAX_DURATION_DAYS + 1));
    assert!(matches!(too_long, Err(AppError::Validation(_))));

    let too_much = create_online_payment(&conn, &input(MAX_PRICE + 1, 365));
    assert!(matches!(too_much, Err(AppError::Validation(_))));
}
