pub const SCHEMA: &str = r#"
-- Cardholders: identity and display fields
CREATE TABLE IF NOT EXISTS cardholders (
    id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL DEFAULT ''
);

-- Biometric enrollment state, one row per cardholder
CREATE TABLE IF NOT EXISTS biometric_data (
    cardholder_id INTEGER PRIMARY KEY REFERENCES cardholders(id),
    template BLOB,
    updated_at TEXT
);

-- Auxiliary cardholder fields maintained by the sync job
CREATE TABLE IF NOT EXISTS cardholder_aux (
    cardholder_id INTEGER PRIMARY KEY REFERENCES cardholders(id),
    photo_updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_biometric_updated_at ON biometric_data(updated_at);
"#;
