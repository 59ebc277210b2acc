//! The key lifecycle: `unused → used` by redemption, `unused → revoked` by
//! an administrator. Both transitions are terminal and guarded by a
//! conditional update, so concurrent attempts resolve to exactly one winner.

use rusqlite::{Connection, TransactionBehavior};

use crate::codes;
use crate::db::queries;
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{ActivationKey, Redemption};

const SECONDS_PER_DAY: i64 = 86_400;

/// New subscription expiry after adding `duration_days`.
///
/// Time still left on the account is kept: the extension starts from the
/// later of `now` and the current expiry.
pub fn extended_expiry(now: i64, current_expiry: Option<i64>, duration_days: i64) -> Result<i64> {
    let base = current_expiry.map_or(now, |exp| exp.max(now));
    duration_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|secs| base.checked_add(secs))
        .ok_or_else(|| AppError::Validation(msg::EXPIRY_OUT_OF_RANGE.into()))
}

/// Redeem `code` for `account_id`.
///
/// Marks the key used, links it to the account, and extends the account's
/// subscription, all in one transaction. A second attempt on the same key
/// fails with `Conflict` and never touches the subscription again.
pub fn redeem_activation_key(
    conn: &mut Connection,
    code: &str,
    account_id: &str,
) -> Result<Redemption> {
    let code = codes::normalize(code);
    if !codes::is_well_formed(&code) {
        return Err(AppError::Validation(msg::INVALID_KEY_FORMAT.into()));
    }

    // IMMEDIATE takes the write lock up front, so the state we read below is
    // the state the conditional update runs against.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let account = queries::get_account_by_id(&tx, account_id)?.ok_or_else(|| {
        AppError::Referential(format!("{}: {}", msg::ACCOUNT_NOT_FOUND, account_id))
    })?;
    let key = queries::get_activation_key_by_code(&tx, &code)?.or_not_found(msg::KEY_NOT_FOUND)?;

    if key.revoked_at.is_some() {
        tracing::warn!(key_id = %key.id, "Redemption of revoked key rejected");
        return Err(AppError::Conflict(msg::KEY_REVOKED.into()));
    }
    if key.is_used {
        tracing::warn!(key_id = %key.id, "Redemption of used key rejected");
        return Err(AppError::Conflict(msg::KEY_ALREADY_USED.into()));
    }

    let now = queries::now();
    let expires_at = extended_expiry(now, account.subscription_expires_at, key.duration_days)?;

    if !queries::try_claim_activation_key(&tx, &key.id, &account.id, now, expires_at)? {
        return Err(AppError::Conflict(msg::KEY_ALREADY_USED.into()));
    }
    queries::set_account_subscription(&tx, &account.id, expires_at)?;
    tx.commit()?;

    tracing::info!(
        key_id = %key.id,
        account_id = %account.id,
        duration_days = key.duration_days,
        "Activation key redeemed"
    );

    Ok(Redemption {
        key_id: key.id,
        key_code: key.key_code,
        account_id: account.id,
        duration_days: key.duration_days,
        used_at: now,
        subscription_expires_at: expires_at,
    })
}

/// Revoke an unused key so it can never be redeemed.
///
/// Used keys are rejected: the subscription they granted stays in force and
/// the key must keep describing it.
pub fn revoke_activation_key(conn: &Connection, id: &str) -> Result<ActivationKey> {
    if queries::try_revoke_activation_key(conn, id, queries::now())? {
        tracing::info!(key_id = %id, "Activation key revoked");
        return queries::get_activation_key_by_id(conn, id)?.or_not_found(msg::KEY_NOT_FOUND);
    }

    let key = queries::get_activation_key_by_id(conn, id)?.or_not_found(msg::KEY_NOT_FOUND)?;
    tracing::warn!(key_id = %id, status = key.status().as_ref(), "Revocation rejected");
    if key.is_used {
        Err(AppError::Conflict(msg::CANNOT_REVOKE_USED.into()))
    } else {
        Err(AppError::Conflict(msg::KEY_ALREADY_REVOKED.into()))
    }
}
