/// Generation records are keyed by UUID (v7, time-ordered).
pub type GenerationId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
