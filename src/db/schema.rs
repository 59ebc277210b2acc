use rusqlite::Connection;

/// Initialize the database schema. Idempotent.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        -- Resale channels; the code's first three characters prefix their keys
        CREATE TABLE IF NOT EXISTS sales_points (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            location TEXT,
            contact_name TEXT,
            contact_phone TEXT,
            contact_email TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            commission_rate REAL NOT NULL DEFAULT 0 CHECK (commission_rate BETWEEN 0 AND 100),
            notes TEXT,
            created_by TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sales_points_name ON sales_points(name);

        -- Subscriber accounts (owned by the auth side; redemption writes is_paid/expiry)
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT,
            faculty TEXT,
            year_of_study INTEGER,
            speciality TEXT,
            region TEXT,
            is_paid INTEGER NOT NULL DEFAULT 0,
            subscription_expires_at INTEGER,
            created_at INTEGER NOT NULL
        );

        -- The ledger. key_code UNIQUE is the collision safety net across batches.
        -- is_used, used_by and used_at are set together, exactly once.
        CREATE TABLE IF NOT EXISTS activation_keys (
            id TEXT PRIMARY KEY,
            key_code TEXT NOT NULL UNIQUE,
            duration_days INTEGER NOT NULL CHECK (duration_days BETWEEN 1 AND 3650),
            sales_point_id TEXT REFERENCES sales_points(id),
            batch_id TEXT NOT NULL,
            notes TEXT,
            price_paid INTEGER CHECK (price_paid BETWEEN 0 AND 1000000000),
            created_by TEXT,
            generation_params TEXT,
            is_used INTEGER NOT NULL DEFAULT 0,
            used_by TEXT REFERENCES users(id),
            used_at INTEGER,
            expires_at INTEGER,
            revoked_at INTEGER,
            created_at INTEGER NOT NULL,
            CHECK ((is_used = 0 AND used_by IS NULL AND used_at IS NULL)
                OR (is_used = 1 AND used_by IS NOT NULL AND used_at IS NOT NULL)),
            CHECK (NOT (is_used = 1 AND revoked_at IS NOT NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_activation_keys_sales_point ON activation_keys(sales_point_id);
        CREATE INDEX IF NOT EXISTS idx_activation_keys_batch ON activation_keys(batch_id);
        CREATE INDEX IF NOT EXISTS idx_activation_keys_used_by ON activation_keys(used_by);
        CREATE INDEX IF NOT EXISTS idx_activation_keys_created ON activation_keys(created_at DESC);

        -- Direct online purchases; a paid payment links to the key it issued
        CREATE TABLE IF NOT EXISTS online_payments (
            id TEXT PRIMARY KEY,
            customer_email TEXT NOT NULL,
            customer_name TEXT,
            amount INTEGER NOT NULL CHECK (amount BETWEEN 0 AND 1000000000),
            currency TEXT NOT NULL DEFAULT 'dzd',
            status TEXT NOT NULL CHECK (status IN ('pending', 'paid', 'failed', 'canceled')),
            duration_days INTEGER NOT NULL CHECK (duration_days BETWEEN 1 AND 3650),
            paid_at INTEGER,
            activation_key_id TEXT REFERENCES activation_keys(id),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_online_payments_status ON online_payments(status);
        CREATE INDEX IF NOT EXISTS idx_online_payments_key ON online_payments(activation_key_id);
        "#,
    )?;
    Ok(())
}
