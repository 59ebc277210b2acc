//! Online-payment channel. A completed payment issues exactly one key with
//! the `PAY` prefix and no sales point.

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

use crate::codes::ONLINE_PREFIX;
use crate::crypto::{OsRandom, SecureRandom};
use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::issuance;
use crate::models::{ActivationKey, CreateOnlinePayment, OnlinePayment, PaymentStatus};

#[derive(Debug, Clone, Serialize)]
pub struct CompletedPayment {
    pub payment: OnlinePayment,
    pub activation_key: ActivationKey,
}

pub fn create_online_payment(conn: &Connection, input: &CreateOnlinePayment) -> Result<OnlinePayment> {
    let payment = queries::create_online_payment(conn, input)?;
    tracing::info!(payment_id = %payment.id, amount = payment.amount, "Online payment created");
    Ok(payment)
}

pub fn complete_online_payment(conn: &mut Connection, id: &str) -> Result<CompletedPayment> {
    complete_online_payment_with(conn, &OsRandom, id)
}

/// Mark a pending payment paid and issue its key in one transaction.
///
/// Completing an already-paid payment returns the key issued the first time.
pub fn complete_online_payment_with(
    conn: &mut Connection,
    rng: &dyn SecureRandom,
    id: &str,
) -> Result<CompletedPayment> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let payment = queries::get_online_payment_by_id(&tx, id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;

    match payment.status {
        PaymentStatus::Paid => {
            let key_id = payment.activation_key_id.as_deref().ok_or_else(|| {
                AppError::Internal(format!("Paid payment {} has no activation key", id))
            })?;
            let activation_key =
                queries::get_activation_key_by_id(&tx, key_id)?.or_not_found(msg::KEY_NOT_FOUND)?;
            tracing::debug!(payment_id = %id, "Payment already completed");
            return Ok(CompletedPayment {
                payment,
                activation_key,
            });
        }
        PaymentStatus::Failed | PaymentStatus::Canceled => {
            return Err(AppError::Conflict(msg::PAYMENT_NOT_PENDING.into()));
        }
        PaymentStatus::Pending => {}
    }

    let key = issuance::prepare_single_key(
        rng,
        ONLINE_PREFIX,
        payment.duration_days,
        Some(payment.amount),
        Some(format!("Online payment {}", payment.id)),
    )?;
    queries::insert_activation_key(&tx, &key)?;
    if !queries::try_mark_payment_paid(&tx, id, &key.id, queries::now())? {
        return Err(AppError::Conflict(msg::PAYMENT_NOT_PENDING.into()));
    }

    let payment = queries::get_online_payment_by_id(&tx, id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
    let activation_key =
        queries::get_activation_key_by_id(&tx, &key.id)?.or_not_found(msg::KEY_NOT_FOUND)?;
    tx.commit()?;

    tracing::info!(payment_id = %id, key_id = %activation_key.id, "Online payment completed");
    Ok(CompletedPayment {
        payment,
        activation_key,
    })
}

/// Close a pending payment as `failed` or `canceled`.
pub fn fail_online_payment(conn: &Connection, id: &str, status: PaymentStatus) -> Result<OnlinePayment> {
    if !matches!(status, PaymentStatus::Failed | PaymentStatus::Canceled) {
        return Err(AppError::Validation(
            "Status must be failed or canceled".into(),
        ));
    }

    if !queries::try_close_pending_payment(conn, id, status)? {
        // Distinguish unknown payments from ones that already settled
        queries::get_online_payment_by_id(conn, id)?.or_not_found(msg::PAYMENT_NOT_FOUND)?;
        return Err(AppError::Conflict(msg::PAYMENT_NOT_PENDING.into()));
    }

    tracing::info!(payment_id = %id, status = status.as_ref(), "Online payment closed");
    queries::get_online_payment_by_id(conn, id)?.or_not_found(msg::PAYMENT_NOT_FOUND)
}
