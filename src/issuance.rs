//! Batch issuance of activation keys.
//!
//! A batch is all-or-nothing: codes are generated up front, inserted in one
//! transaction, and only returned after the commit succeeds. A caller never
//! receives a code that is absent from the ledger.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::codes::{self, ALGORITHM_VERSION, GeneratedCode};
use crate::crypto::{OsRandom, SecureRandom};
use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::id::EntityType;
use crate::models::{
    BatchParams, GenerationParams, IssuedBatch, MAX_DURATION_DAYS, MAX_PRICE, NewActivationKey,
    SalesPoint,
};

/// Largest batch accepted in one call.
pub const MAX_BATCH_SIZE: i64 = 1000;

/// Draws allowed per slot when a fresh code collides with one already in the batch.
const MAX_COLLISION_RETRIES: usize = 8;

fn validate_batch(params: &BatchParams) -> Result<()> {
    if params.quantity <= 0 {
        return Err(AppError::Validation(msg::QUANTITY_INVALID.into()));
    }
    if params.quantity > MAX_BATCH_SIZE {
        return Err(AppError::Validation(format!(
            "Quantity cannot exceed {}",
            MAX_BATCH_SIZE
        )));
    }
    if params.duration_days <= 0 {
        return Err(AppError::Validation(msg::DURATION_INVALID.into()));
    }
    if params.duration_days > MAX_DURATION_DAYS {
        return Err(AppError::Validation(msg::DURATION_TOO_LONG.into()));
    }
    if params.price_paid.is_some_and(|p| !(0..=MAX_PRICE).contains(&p)) {
        return Err(AppError::Validation(msg::PRICE_OUT_OF_RANGE.into()));
    }
    Ok(())
}

/// Issue a batch of keys for one sales point using the OS random source.
pub fn generate_batch_codes(
    conn: &mut Connection,
    params: &BatchParams,
    created_by: Option<&str>,
) -> Result<IssuedBatch> {
    generate_batch_codes_with(conn, &OsRandom, params, created_by)
}

/// Issue a batch drawing randomness from `rng`.
pub fn generate_batch_codes_with(
    conn: &mut Connection,
    rng: &dyn SecureRandom,
    params: &BatchParams,
    created_by: Option<&str>,
) -> Result<IssuedBatch> {
    // Shape checks come before any lookup or random draw
    validate_batch(params)?;

    let sales_point = queries::get_sales_point_by_id(conn, &params.sales_point_id)?.ok_or_else(
        || {
            AppError::Referential(format!(
                "{}: {}",
                msg::SALES_POINT_NOT_FOUND,
                params.sales_point_id
            ))
        },
    )?;
    if !sales_point.is_active {
        return Err(AppError::Validation(msg::SALES_POINT_INACTIVE.into()));
    }

    let batch_id = EntityType::Batch.gen_id();
    let keys = prepare_keys(rng, &sales_point, params, &batch_id, created_by)?;

    let tx = conn.transaction()?;
    for key in &keys {
        queries::insert_activation_key(&tx, key).map_err(|e| match e {
            AppError::Database(ref err) if queries::is_foreign_key_violation(err) => {
                AppError::Referential(format!(
                    "{}: {}",
                    msg::SALES_POINT_NOT_FOUND,
                    params.sales_point_id
                ))
            }
            other => {
                tracing::error!(batch_id = %batch_id, "Batch insert failed: {}", other);
                other
            }
        })?;
    }
    tx.commit()?;

    tracing::info!(
        batch_id = %batch_id,
        sales_point = %sales_point.code,
        quantity = keys.len(),
        duration_days = params.duration_days,
        "Issued activation key batch"
    );

    Ok(IssuedBatch {
        batch_id,
        codes: keys.into_iter().map(|k| k.key_code).collect(),
    })
}

/// Build every row of the batch. Each code gets its own random draw; a code
/// repeating one already in the batch is redrawn.
fn prepare_keys(
    rng: &dyn SecureRandom,
    sales_point: &SalesPoint,
    params: &BatchParams,
    batch_id: &str,
    created_by: Option<&str>,
) -> Result<Vec<NewActivationKey>> {
    let quantity = params.quantity as usize;
    let mut seen: HashSet<String> = HashSet::with_capacity(quantity);
    let mut keys = Vec::with_capacity(quantity);

    for index in 0..quantity {
        let generated = draw_unique(rng, &sales_point.code, &seen)?;
        seen.insert(generated.code.clone());
        keys.push(new_key(
            generated,
            Some(sales_point.id.clone()),
            params.duration_days,
            batch_id,
            index as i64,
            params.notes.clone(),
            params.price_paid,
            created_by,
        ));
    }

    Ok(keys)
}

fn draw_unique(
    rng: &dyn SecureRandom,
    sales_point_code: &str,
    seen: &HashSet<String>,
) -> Result<GeneratedCode> {
    for _ in 0..MAX_COLLISION_RETRIES {
        let generated = codes::generate_secure_code_with(rng, sales_point_code)?;
        if !seen.contains(&generated.code) {
            return Ok(generated);
        }
        tracing::warn!("Discarding code that repeats one already in the batch");
    }
    Err(AppError::Internal(
        "Random source keeps producing duplicate codes".into(),
    ))
}

/// Prepare a single key outside a batch (online-payment channel).
pub fn prepare_single_key(
    rng: &dyn SecureRandom,
    prefix: &str,
    duration_days: i64,
    price_paid: Option<i64>,
    notes: Option<String>,
) -> Result<NewActivationKey> {
    let generated = codes::generate_secure_code_with(rng, prefix)?;
    let batch_id = EntityType::Batch.gen_id();
    Ok(new_key(
        generated,
        None,
        duration_days,
        &batch_id,
        0,
        notes,
        price_paid,
        None,
    ))
}

#[allow(clippy::too_many_arguments)]
fn new_key(
    generated: GeneratedCode,
    sales_point_id: Option<String>,
    duration_days: i64,
    batch_id: &str,
    batch_index: i64,
    notes: Option<String>,
    price_paid: Option<i64>,
    created_by: Option<&str>,
) -> NewActivationKey {
    NewActivationKey {
        id: EntityType::ActivationKey.gen_id(),
        key_code: generated.code,
        duration_days,
        sales_point_id,
        batch_id: batch_id.to_string(),
        notes,
        price_paid,
        created_by: created_by.map(String::from),
        created_at: generated.timestamp / 1000,
        generation_params: GenerationParams {
            algorithm: ALGORITHM_VERSION.to_string(),
            timestamp: generated.timestamp,
            checksum: generated.checksum,
            batch_index,
        },
    }
}
