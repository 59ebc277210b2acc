//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Joined relations (a key's sales point, its redeeming account) are resolved
//! here into typed structs, so callers never see raw join shapes.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse an optional JSON text column.
fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, col: usize) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<String>>(col)?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const SALES_POINT_COLS: &str = "id, code, name, location, contact_name, contact_phone, contact_email, is_active, commission_rate, notes, created_by, created_at, updated_at";

pub const ACCOUNT_COLS: &str = "id, email, full_name, faculty, year_of_study, speciality, region, is_paid, subscription_expires_at, created_at";

pub const ONLINE_PAYMENT_COLS: &str = "id, customer_email, customer_name, amount, currency, status, duration_days, paid_at, activation_key_id, created_at";

/// Key columns followed by the joined sales point (`sp`) and redeeming
/// account (`u`). Pair with [`ACTIVATION_KEY_FROM`].
pub const ACTIVATION_KEY_COLS: &str = "k.id, k.key_code, k.duration_days, k.sales_point_id, k.batch_id, k.notes, k.price_paid, k.created_by, k.generation_params, k.is_used, k.used_by, k.used_at, k.expires_at, k.revoked_at, k.created_at, sp.id, sp.code, sp.name, sp.location, u.id, u.email, u.full_name, u.speciality, u.year_of_study, u.region";

pub const ACTIVATION_KEY_FROM: &str = "activation_keys k
     LEFT JOIN sales_points sp ON sp.id = k.sales_point_id
     LEFT JOIN users u ON u.id = k.used_by";

// ============ FromRow Implementations ============

impl FromRow for SalesPoint {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SalesPoint {
            id: row.get(0)?,
            code: row.get(1)?,
            name: row.get(2)?,
            location: row.get(3)?,
            contact_name: row.get(4)?,
            contact_phone: row.get(5)?,
            contact_email: row.get(6)?,
            is_active: row.get::<_, i32>(7)? != 0,
            commission_rate: row.get(8)?,
            notes: row.get(9)?,
            created_by: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl FromRow for Account {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Account {
            id: row.get(0)?,
            email: row.get(1)?,
            full_name: row.get(2)?,
            faculty: row.get(3)?,
            year_of_study: row.get(4)?,
            speciality: row.get(5)?,
            region: row.get(6)?,
            is_paid: row.get::<_, i32>(7)? != 0,
            subscription_expires_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for OnlinePayment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OnlinePayment {
            id: row.get(0)?,
            customer_email: row.get(1)?,
            customer_name: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            status: parse_enum(row, 5, "status")?,
            duration_days: row.get(6)?,
            paid_at: row.get(7)?,
            activation_key_id: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl FromRow for ActivationKey {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        // LEFT JOINs: the relation exists iff its id column is non-null
        let sales_point = match row.get::<_, Option<String>>(15)? {
            Some(id) => Some(SalesPointRef {
                id,
                code: row.get(16)?,
                name: row.get(17)?,
                location: row.get(18)?,
            }),
            None => None,
        };
        let used_by_account = match row.get::<_, Option<String>>(19)? {
            Some(id) => Some(AccountSummary {
                id,
                email: row.get(20)?,
                full_name: row.get(21)?,
                speciality: row.get(22)?,
                year_of_study: row.get(23)?,
                region: row.get(24)?,
            }),
            None => None,
        };
        Ok(ActivationKey {
            id: row.get(0)?,
            key_code: row.get(1)?,
            duration_days: row.get(2)?,
            sales_point_id: row.get(3)?,
            batch_id: row.get(4)?,
            notes: row.get(5)?,
            price_paid: row.get(6)?,
            created_by: row.get(7)?,
            generation_params: parse_json(row, 8)?,
            is_used: row.get::<_, i32>(9)? != 0,
            used_by: row.get(10)?,
            used_at: row.get(11)?,
            expires_at: row.get(12)?,
            revoked_at: row.get(13)?,
            created_at: row.get(14)?,
            sales_point,
            used_by_account,
        })
    }
}
