//! Database schema definitions for the libSQL-backed `GraphRepository`
//! (spec.md §6 "DB contract").

/// Node source: one row per tool, carrying its embedding for semantic
/// search outside this crate's scope.
pub const CREATE_TOOL_EMBEDDING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tool_embedding (
    tool_id TEXT PRIMARY KEY NOT NULL,
    server_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}'
)
"#;

/// Edge source for tool-to-tool dependencies.
pub const CREATE_TOOL_DEPENDENCY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tool_dependency (
    from_tool_id TEXT NOT NULL,
    to_tool_id TEXT NOT NULL,
    observed_count INTEGER NOT NULL DEFAULT 0,
    confidence_score REAL NOT NULL,
    edge_type TEXT NOT NULL,
    edge_source TEXT NOT NULL,
    last_observed INTEGER,
    PRIMARY KEY (from_tool_id, to_tool_id)
)
"#;

/// Edge source for capability-to-capability dependencies.
pub const CREATE_CAPABILITY_DEPENDENCY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS capability_dependency (
    from_capability_id TEXT NOT NULL,
    to_capability_id TEXT NOT NULL,
    observed_count INTEGER NOT NULL DEFAULT 0,
    confidence_score REAL NOT NULL,
    edge_type TEXT NOT NULL,
    edge_source TEXT NOT NULL,
    PRIMARY KEY (from_capability_id, to_capability_id)
)
"#;

/// Capability metadata — not named explicitly in the DB contract table
/// list, but required to back `CapabilityRepository` (§4.8.1): id, name,
/// constituent tools, and success rate.
pub const CREATE_CAPABILITY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS capability (
    capability_id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    tools_used TEXT NOT NULL,
    success_rate REAL NOT NULL DEFAULT 0.0,
    code_snippet TEXT,
    metadata TEXT NOT NULL DEFAULT '{}'
)
"#;

/// Tool input/output schemas, used for `provides`-edge calculation
/// (schema overlap between one tool's output and another's input).
pub const CREATE_TOOL_SCHEMA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tool_schema (
    tool_id TEXT PRIMARY KEY NOT NULL,
    server_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    input_schema TEXT NOT NULL,
    output_schema TEXT NOT NULL
)
"#;

/// Append-only execution traces, sanitized before persistence.
pub const CREATE_EXECUTION_TRACE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS execution_trace (
    trace_id TEXT PRIMARY KEY NOT NULL,
    parent_trace_id TEXT,
    node_id TEXT NOT NULL,
    decisions TEXT NOT NULL DEFAULT '{}',
    task_results TEXT NOT NULL DEFAULT '{}',
    "timestamp" INTEGER NOT NULL
)
"#;

/// Observability trace of algorithm decisions (LocalAlpha selection,
/// DAG confidence scoring, etc.).
pub const CREATE_ALGORITHM_TRACES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS algorithm_traces (
    algorithm_mode TEXT NOT NULL,
    target_type TEXT NOT NULL,
    signals TEXT NOT NULL,
    params TEXT NOT NULL,
    final_score REAL NOT NULL,
    threshold_used REAL,
    decision TEXT NOT NULL,
    "timestamp" INTEGER NOT NULL
)
"#;

/// Time-series telemetry (graph density, average edge weight, and so on).
pub const CREATE_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    metric_name TEXT NOT NULL,
    value REAL NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    "timestamp" INTEGER NOT NULL
)
"#;

/// Small config values and checksums.
pub const CREATE_CONFIG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

pub const CREATE_TOOL_DEPENDENCY_CONFIDENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tool_dependency_confidence
ON tool_dependency(confidence_score)
"#;

pub const CREATE_CAPABILITY_DEPENDENCY_CONFIDENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_capability_dependency_confidence
ON capability_dependency(confidence_score)
"#;

pub const CREATE_EXECUTION_TRACE_PARENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_execution_trace_parent
ON execution_trace(parent_trace_id)
"#;

/// All statements needed to bring a fresh database up to schema, in
/// dependency order.
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_TOOL_EMBEDDING_TABLE,
    CREATE_TOOL_DEPENDENCY_TABLE,
    CREATE_CAPABILITY_DEPENDENCY_TABLE,
    CREATE_CAPABILITY_TABLE,
    CREATE_TOOL_SCHEMA_TABLE,
    CREATE_EXECUTION_TRACE_TABLE,
    CREATE_ALGORITHM_TRACES_TABLE,
    CREATE_METRICS_TABLE,
    CREATE_CONFIG_TABLE,
    CREATE_TOOL_DEPENDENCY_CONFIDENCE_INDEX,
    CREATE_CAPABILITY_DEPENDENCY_CONFIDENCE_INDEX,
    CREATE_EXECUTION_TRACE_PARENT_INDEX,
];
