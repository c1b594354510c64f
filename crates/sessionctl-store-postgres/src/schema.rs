//! Reference schema. `sessionctl-api` applies this at startup for the
//! illustrative wiring; a real deployment would own migrations separately.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id                  TEXT PRIMARY KEY,
    backend_id          TEXT,
    owner_principal_id  TEXT NOT NULL,
    owner_account_id    TEXT NOT NULL,
    base_image          TEXT NOT NULL,
    command             JSONB NOT NULL,
    env                 JSONB NOT NULL,
    setup               JSONB NOT NULL,
    files               JSONB NOT NULL,
    resources           JSONB NOT NULL,
    network             TEXT NOT NULL,
    requested_ports     JSONB NOT NULL,
    ports               JSONB NOT NULL,
    resolved_image      TEXT,
    setup_hash          TEXT,
    status              TEXT NOT NULL,
    exit_code           INTEGER,
    created_at          TIMESTAMPTZ NOT NULL,
    started_at          TIMESTAMPTZ,
    ended_at            TIMESTAMPTZ,
    duration_ms         BIGINT,
    cpu_millis_used     BIGINT,
    memory_peak_mb      INTEGER,
    cost_estimate_cents BIGINT
);

CREATE INDEX IF NOT EXISTS idx_sessions_owner_account_status ON sessions (owner_account_id, status);
CREATE INDEX IF NOT EXISTS idx_sessions_owner_account_created ON sessions (owner_account_id, created_at);

CREATE TABLE IF NOT EXISTS quota_increase_requests (
    id              BIGSERIAL PRIMARY KEY,
    account_id      TEXT NOT NULL,
    requested_tier  TEXT NOT NULL,
    reason          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quota_requests_account ON quota_increase_requests (account_id, created_at);

CREATE TABLE IF NOT EXISTS image_cache (
    hash           TEXT PRIMARY KEY,
    base_image     TEXT NOT NULL,
    registry_tag   TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL,
    last_used_at   TIMESTAMPTZ NOT NULL
);
"#;
