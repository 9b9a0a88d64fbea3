/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// One spreadsheet row or form payload: column/field key to JSON value.
pub type JsonRecord = serde_json::Map<String, serde_json::Value>;
