use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, types::Value};

use crate::error::{AppError, Result, msg};
use crate::id::EntityType;
use crate::models::*;

use super::from_row::{
    ACCOUNT_COLS, ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM, ONLINE_PAYMENT_COLS,
    SALES_POINT_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// True when `err` is a SQLite constraint failure of the given extended kind
/// (e.g. `SQLITE_CONSTRAINT_FOREIGNKEY`).
fn is_constraint(err: &rusqlite::Error, extended_code: std::os::raw::c_int) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation && e.extended_code == extended_code
    )
}

pub fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    is_constraint(err, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    is_constraint(err, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Builder for dynamic UPDATE statements with optional fields.
struct UpdateBuilder {
    table: &'static str,
    id: String,
    fields: Vec<(&'static str, Value)>,
    track_updated_at: bool,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
            fields: Vec::new(),
            track_updated_at: false,
        }
    }

    fn with_updated_at(mut self) -> Self {
        self.track_updated_at = true;
        self
    }

    fn set_opt<V: Into<Value>>(mut self, column: &'static str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.fields.push((column, v.into()));
        }
        self
    }

    /// `None` leaves the column alone, `Some(None)` writes NULL.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Execute the update and return the updated row. `None` if no row matched.
    fn execute_returning<T: super::from_row::FromRow>(
        mut self,
        conn: &Connection,
        returning_cols: &str,
    ) -> Result<Option<T>> {
        if self.track_updated_at {
            self.fields.push(("updated_at", now().into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? RETURNING {}",
            self.table,
            sets.join(", "),
            returning_cols
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), T::from_row)
            .optional()
            .map_err(Into::into)
    }
}

// ============ Sales Points ============

pub fn create_sales_point(
    conn: &Connection,
    input: &CreateSalesPoint,
    created_by: Option<&str>,
) -> Result<SalesPoint> {
    input.validate()?;

    let id = EntityType::SalesPoint.gen_id();
    let now = now();
    let code = input.code.trim().to_uppercase();

    conn.execute(
        "INSERT INTO sales_points (id, code, name, location, contact_name, contact_phone,
             contact_email, is_active, commission_rate, notes, created_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        params![
            &id,
            &code,
            input.name.trim(),
            &input.location,
            &input.contact_name,
            &input.contact_phone,
            &input.contact_email,
            input.is_active as i32,
            input.commission_rate,
            &input.notes,
            created_by,
            now,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Sales point code {} already exists", code))
        } else {
            e.into()
        }
    })?;

    Ok(SalesPoint {
        id,
        code,
        name: input.name.trim().to_string(),
        location: input.location.clone(),
        contact_name: input.contact_name.clone(),
        contact_phone: input.contact_phone.clone(),
        contact_email: input.contact_email.clone(),
        is_active: input.is_active,
        commission_rate: input.commission_rate,
        notes: input.notes.clone(),
        created_by: created_by.map(String::from),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_sales_point_by_id(conn: &Connection, id: &str) -> Result<Option<SalesPoint>> {
    query_one(
        conn,
        &format!("SELECT {} FROM sales_points WHERE id = ?1", SALES_POINT_COLS),
        &[&id],
    )
}

pub fn list_sales_points(conn: &Connection) -> Result<Vec<SalesPoint>> {
    query_all(
        conn,
        &format!("SELECT {} FROM sales_points ORDER BY name", SALES_POINT_COLS),
        &[],
    )
}

/// Partial update. Returns `None` if the sales point does not exist.
pub fn update_sales_point(
    conn: &Connection,
    id: &str,
    input: &UpdateSalesPoint,
) -> Result<Option<SalesPoint>> {
    input.validate()?;

    let builder = UpdateBuilder::new("sales_points", id)
        .with_updated_at()
        .set_opt("code", input.code.as_ref().map(|c| c.trim().to_uppercase()))
        .set_opt("name", input.name.as_ref().map(|n| n.trim().to_string()))
        .set_nullable("location", input.location.clone())
        .set_nullable("contact_name", input.contact_name.clone())
        .set_nullable("contact_phone", input.contact_phone.clone())
        .set_nullable("contact_email", input.contact_email.clone())
        .set_opt("is_active", input.is_active.map(|a| a as i32))
        .set_opt("commission_rate", input.commission_rate)
        .set_nullable("notes", input.notes.clone());

    if builder.is_empty() {
        return get_sales_point_by_id(conn, id);
    }

    builder
        .execute_returning(conn, SALES_POINT_COLS)
        .map_err(|e| match e {
            AppError::Database(ref err) if is_unique_violation(err) => {
                AppError::Conflict("Sales point code already exists".into())
            }
            other => other,
        })
}

/// Delete a sales point with no keys. Keys pin their issuing channel, so a
/// sales point that has issued anything is rejected with `Conflict`.
pub fn delete_sales_point(conn: &Connection, id: &str) -> Result<bool> {
    if count_keys_for_sales_point(conn, id)? > 0 {
        return Err(AppError::Conflict(msg::SALES_POINT_IN_USE.into()));
    }
    let deleted = conn.execute("DELETE FROM sales_points WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

pub fn count_keys_for_sales_point(conn: &Connection, sales_point_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM activation_keys WHERE sales_point_id = ?1",
        params![sales_point_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

// ============ Accounts ============

pub fn create_account(conn: &Connection, input: &CreateAccount) -> Result<Account> {
    let email = input.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation(msg::EMAIL_EMPTY.into()));
    }
    let id = EntityType::Account.gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO users (id, email, full_name, faculty, year_of_study, speciality, region,
             is_paid, subscription_expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, ?8)",
        params![
            &id,
            &email,
            &input.full_name,
            &input.faculty,
            input.year_of_study,
            &input.speciality,
            &input.region,
            now,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Account {} already exists", email))
        } else {
            e.into()
        }
    })?;

    Ok(Account {
        id,
        email,
        full_name: input.full_name.clone(),
        faculty: input.faculty.clone(),
        year_of_study: input.year_of_study,
        speciality: input.speciality.clone(),
        region: input.region.clone(),
        is_paid: false,
        subscription_expires_at: None,
        created_at: now,
    })
}

pub fn get_account_by_id(conn: &Connection, id: &str) -> Result<Option<Account>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", ACCOUNT_COLS),
        &[&id],
    )
}

/// Mark the account paid with the given expiry.
pub fn set_account_subscription(conn: &Connection, id: &str, expires_at: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users SET is_paid = 1, subscription_expires_at = ?1 WHERE id = ?2",
        params![expires_at, id],
    )?;
    Ok(updated > 0)
}

// ============ Activation Keys ============

pub fn insert_activation_key(conn: &Connection, key: &NewActivationKey) -> Result<()> {
    let generation_params = serde_json::to_string(&key.generation_params)?;
    conn.execute(
        "INSERT INTO activation_keys (id, key_code, duration_days, sales_point_id, batch_id,
             notes, price_paid, created_by, generation_params, is_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
        params![
            &key.id,
            &key.key_code,
            key.duration_days,
            &key.sales_point_id,
            &key.batch_id,
            &key.notes,
            key.price_paid,
            &key.created_by,
            &generation_params,
            key.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_activation_key_by_id(conn: &Connection, id: &str) -> Result<Option<ActivationKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.id = ?1",
            ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM
        ),
        &[&id],
    )
}

pub fn get_activation_key_by_code(conn: &Connection, code: &str) -> Result<Option<ActivationKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.key_code = ?1",
            ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM
        ),
        &[&code],
    )
}

pub fn list_activation_keys_for_batch(conn: &Connection, batch_id: &str) -> Result<Vec<ActivationKey>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.batch_id = ?1 ORDER BY k.rowid",
            ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM
        ),
        &[&batch_id],
    )
}

/// WHERE clause and its positional values for key listings.
fn key_filter_clause(filters: &ActivationKeyFilters) -> (String, Vec<Value>) {
    let mut clause = String::from("WHERE 1=1");
    let mut values: Vec<Value> = Vec::new();

    match filters.status {
        None => clause.push_str(" AND k.revoked_at IS NULL"),
        Some(KeyStatus::Unused) => clause.push_str(" AND k.is_used = 0 AND k.revoked_at IS NULL"),
        Some(KeyStatus::Used) => clause.push_str(" AND k.is_used = 1"),
        Some(KeyStatus::Revoked) => clause.push_str(" AND k.revoked_at IS NOT NULL"),
    }
    if let Some(year) = filters.year {
        clause.push_str(" AND u.year_of_study = ?");
        values.push(year.into());
    }
    if let Some(ref faculty) = filters.faculty {
        clause.push_str(" AND u.faculty = ?");
        values.push(faculty.clone().into());
    }
    if let Some(ref sales_point_id) = filters.sales_point_id {
        clause.push_str(" AND k.sales_point_id = ?");
        values.push(sales_point_id.clone().into());
    }
    if let Some(ref batch_id) = filters.batch_id {
        clause.push_str(" AND k.batch_id = ?");
        values.push(batch_id.clone().into());
    }
    if let Some(ref search) = filters.search
        && !search.trim().is_empty()
    {
        // LIKE is ASCII case-insensitive in SQLite
        clause.push_str(" AND k.key_code LIKE ? ESCAPE '\\'");
        values.push(like_pattern(search.trim()).into());
    }

    (clause, values)
}

/// All keys matching `filters`, newest first.
pub fn list_activation_keys(
    conn: &Connection,
    filters: &ActivationKeyFilters,
) -> Result<Vec<ActivationKey>> {
    let (clause, values) = key_filter_clause(filters);
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY k.created_at DESC, k.rowid DESC",
        ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM, clause
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    query_all(conn, &sql, &params)
}

pub fn list_activation_keys_paginated(
    conn: &Connection,
    filters: &ActivationKeyFilters,
    limit: i64,
    offset: i64,
) -> Result<(Vec<ActivationKey>, i64)> {
    let (clause, mut values) = key_filter_clause(filters);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} {}", ACTIVATION_KEY_FROM, clause),
        rusqlite::params_from_iter(&values),
        |row| row.get(0),
    )?;

    values.push(limit.into());
    values.push(offset.into());
    let sql = format!(
        "SELECT {} FROM {} {} ORDER BY k.created_at DESC, k.rowid DESC LIMIT ? OFFSET ?",
        ACTIVATION_KEY_COLS, ACTIVATION_KEY_FROM, clause
    );
    let params: Vec<&dyn rusqlite::ToSql> =
        values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    let items = query_all(conn, &sql, &params)?;

    Ok((items, total))
}

/// Atomically claim an unused, unrevoked key for an account.
///
/// The guard on `is_used` and `revoked_at` is evaluated together with the
/// write, so of two concurrent claims exactly one sees `true`.
pub fn try_claim_activation_key(
    conn: &Connection,
    id: &str,
    account_id: &str,
    used_at: i64,
    expires_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE activation_keys SET is_used = 1, used_by = ?1, used_at = ?2, expires_at = ?3
         WHERE id = ?4 AND is_used = 0 AND revoked_at IS NULL",
        params![account_id, used_at, expires_at, id],
    )?;
    Ok(affected > 0)
}

/// Atomically revoke a key that is neither used nor already revoked.
pub fn try_revoke_activation_key(conn: &Connection, id: &str, revoked_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE activation_keys SET revoked_at = ?1
         WHERE id = ?2 AND is_used = 0 AND revoked_at IS NULL",
        params![revoked_at, id],
    )?;
    Ok(affected > 0)
}

// ============ Online Payments ============

pub fn create_online_payment(conn: &Connection, input: &CreateOnlinePayment) -> Result<OnlinePayment> {
    let email = input.customer_email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation(msg::EMAIL_EMPTY.into()));
    }
    if !(0..=MAX_PRICE).contains(&input.amount) {
        return Err(AppError::Validation(msg::PRICE_OUT_OF_RANGE.into()));
    }
    if input.duration_days <= 0 {
        return Err(AppError::Validation(msg::DURATION_INVALID.into()));
    }
    if input.duration_days > MAX_DURATION_DAYS {
        return Err(AppError::Validation(msg::DURATION_TOO_LONG.into()));
    }

    let id = EntityType::OnlinePayment.gen_id();
    let now = now();
    let currency = input.currency.trim().to_lowercase();

    conn.execute(
        "INSERT INTO online_payments (id, customer_email, customer_name, amount, currency,
             status, duration_days, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            &email,
            &input.customer_name,
            input.amount,
            &currency,
            PaymentStatus::Pending.as_ref(),
            input.duration_days,
            now,
        ],
    )?;

    Ok(OnlinePayment {
        id,
        customer_email: email,
        customer_name: input.customer_name.clone(),
        amount: input.amount,
        currency,
        status: PaymentStatus::Pending,
        duration_days: input.duration_days,
        paid_at: None,
        activation_key_id: None,
        created_at: now,
    })
}

pub fn get_online_payment_by_id(conn: &Connection, id: &str) -> Result<Option<OnlinePayment>> {
    query_one(
        conn,
        &format!("SELECT {} FROM online_payments WHERE id = ?1", ONLINE_PAYMENT_COLS),
        &[&id],
    )
}

pub fn list_online_payments(conn: &Connection) -> Result<Vec<OnlinePayment>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM online_payments ORDER BY created_at DESC",
            ONLINE_PAYMENT_COLS
        ),
        &[],
    )
}

/// Pending → paid, linking the issued key. `false` if no longer pending.
pub fn try_mark_payment_paid(
    conn: &Connection,
    id: &str,
    activation_key_id: &str,
    paid_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE online_payments SET status = 'paid', paid_at = ?1, activation_key_id = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![paid_at, activation_key_id, id],
    )?;
    Ok(affected > 0)
}

/// Pending → `status`. `false` if no longer pending.
pub fn try_close_pending_payment(conn: &Connection, id: &str, status: PaymentStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE online_payments SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![status.as_ref(), id],
    )?;
    Ok(affected > 0)
}

// ============ Read-side rows for aggregation ============

/// A key with the redeeming account's subscription state.
#[derive(Debug, Clone)]
pub struct KeyUsage {
    pub sales_point_id: Option<String>,
    pub is_used: bool,
    pub is_revoked: bool,
    pub price_paid: Option<i64>,
    pub duration_days: i64,
    pub used_at: Option<i64>,
    pub account_is_paid: bool,
    pub account_expires_at: Option<i64>,
}

impl KeyUsage {
    /// Redeemed and the account's subscription is still running at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.is_used && self.account_is_paid && self.account_expires_at.is_some_and(|exp| exp > now)
    }
}

pub fn list_key_usage(conn: &Connection) -> Result<Vec<KeyUsage>> {
    let mut stmt = conn.prepare(
        "SELECT k.sales_point_id, k.is_used, k.revoked_at IS NOT NULL, k.price_paid,
                k.duration_days, k.used_at, u.is_paid, u.subscription_expires_at
         FROM activation_keys k
         LEFT JOIN users u ON u.id = k.used_by",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(KeyUsage {
                sales_point_id: row.get(0)?,
                is_used: row.get::<_, i32>(1)? != 0,
                is_revoked: row.get::<_, i32>(2)? != 0,
                price_paid: row.get(3)?,
                duration_days: row.get(4)?,
                used_at: row.get(5)?,
                account_is_paid: row.get::<_, Option<i32>>(6)?.unwrap_or(0) != 0,
                account_expires_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A paid online payment with the usage time of the key it issued.
#[derive(Debug, Clone)]
pub struct PaidPayment {
    pub amount: i64,
    pub paid_at: Option<i64>,
    pub key_used_at: Option<i64>,
}

impl PaidPayment {
    /// Time used for bucketing: key redemption, else payment time.
    pub fn occurred_at(&self) -> Option<i64> {
        self.key_used_at.or(self.paid_at)
    }
}

pub fn list_paid_online_payments(conn: &Connection) -> Result<Vec<PaidPayment>> {
    let mut stmt = conn.prepare(
        "SELECT p.amount, p.paid_at, k.used_at
         FROM online_payments p
         LEFT JOIN activation_keys k ON k.id = p.activation_key_id
         WHERE p.status = 'paid'",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PaidPayment {
                amount: row.get(0)?,
                paid_at: row.get(1)?,
                key_used_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_redeemer(row: &rusqlite::Row, source: ChannelSource, now: i64) -> rusqlite::Result<RealUser> {
    let is_paid = row.get::<_, i32>(6)? != 0;
    let subscription_expires_at: Option<i64> = row.get(7)?;
    Ok(RealUser {
        id: row.get(0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        year_of_study: row.get(3)?,
        speciality: row.get(4)?,
        region: row.get(5)?,
        source,
        sales_point_id: row.get(8)?,
        sales_point_name: row.get(9)?,
        sales_point_code: row.get(10)?,
        sales_point_location: row.get(11)?,
        key_code: row.get(12)?,
        activated_at: row.get(13)?,
        is_paid,
        subscription_expires_at,
        is_active: is_paid && subscription_expires_at.is_some_and(|exp| exp > now),
    })
}

/// Accounts that redeemed a sales-point key, newest redemption first.
pub fn list_sales_point_redeemers(conn: &Connection, now: i64) -> Result<Vec<RealUser>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.full_name, u.year_of_study, u.speciality, u.region,
                u.is_paid, u.subscription_expires_at,
                sp.id, sp.name, sp.code, sp.location, k.key_code, k.used_at
         FROM activation_keys k
         JOIN users u ON u.id = k.used_by
         JOIN sales_points sp ON sp.id = k.sales_point_id
         WHERE k.is_used = 1
         ORDER BY k.used_at DESC",
    )?;
    let rows = stmt
        .query_map([], |row| map_redeemer(row, ChannelSource::SalesPoint, now))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Accounts that redeemed a key issued by a paid online payment, newest first.
pub fn list_online_redeemers(conn: &Connection, now: i64) -> Result<Vec<RealUser>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.email, u.full_name, u.year_of_study, u.speciality, u.region,
                u.is_paid, u.subscription_expires_at,
                NULL, NULL, NULL, NULL, k.key_code, k.used_at
         FROM online_payments p
         JOIN activation_keys k ON k.id = p.activation_key_id
         JOIN users u ON u.id = k.used_by
         WHERE p.status = 'paid' AND k.is_used = 1
         ORDER BY k.used_at DESC",
    )?;
    let rows = stmt
        .query_map([], |row| map_redeemer(row, ChannelSource::OnlinePayment, now))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
