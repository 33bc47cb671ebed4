//! libSQL row <-> `graphrag-core` type mapping.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Connection, Database};

use graphrag_core::graph::{CapabilityDependencyRow, DependencyRow, GraphRepository};
use graphrag_core::suggester::CapabilityRepository;
use graphrag_core::types::{Capability, EdgeSource, EdgeType, Node};

use crate::error::{Error, Result as StoreResult};

/// A libSQL-backed `GraphRepository` + `CapabilityRepository`. Holds a
/// single long-lived [`Connection`]; libSQL connections are cheap to clone
/// and safe to share (matching the teacher's `TursoStorage` usage).
pub struct GraphStoreDb {
    conn: Connection,
}

impl GraphStoreDb {
    /// # Errors
    ///
    /// Returns an error if a connection cannot be established on `db`.
    pub fn new(db: &Database) -> StoreResult<Self> {
        Ok(Self {
            conn: db.connect().map_err(|e| Error::Connection(e.to_string()))?,
        })
    }
}

fn edge_type_str(t: EdgeType) -> &'static str {
    match t {
        EdgeType::Dependency => "dependency",
        EdgeType::Contains => "contains",
        EdgeType::Alternative => "alternative",
        EdgeType::Provides => "provides",
        EdgeType::Sequence => "sequence",
    }
}

fn edge_type_from_str(s: &str) -> StoreResult<EdgeType> {
    match s {
        "dependency" => Ok(EdgeType::Dependency),
        "contains" => Ok(EdgeType::Contains),
        "alternative" => Ok(EdgeType::Alternative),
        "provides" => Ok(EdgeType::Provides),
        "sequence" => Ok(EdgeType::Sequence),
        other => Err(Error::Decode("edge_type", other.to_string())),
    }
}

fn edge_source_str(s: EdgeSource) -> &'static str {
    match s {
        EdgeSource::Observed => "observed",
        EdgeSource::Inferred => "inferred",
        EdgeSource::Template => "template",
        EdgeSource::User => "user",
    }
}

fn edge_source_from_str(s: &str) -> StoreResult<EdgeSource> {
    match s {
        "observed" => Ok(EdgeSource::Observed),
        "inferred" => Ok(EdgeSource::Inferred),
        "template" => Ok(EdgeSource::Template),
        "user" => Ok(EdgeSource::User),
        other => Err(Error::Decode("edge_source", other.to_string())),
    }
}

fn timestamp_from_row(value: Option<i64>) -> Option<DateTime<Utc>> {
    value.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl GraphRepository for GraphStoreDb {
    async fn list_tools(&self) -> graphrag_core::Result<Vec<Node>> {
        let mut rows = self
            .conn
            .query("SELECT tool_id, server_id, tool_name, metadata FROM tool_embedding", ())
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut tools = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Query(e.to_string()))? {
            let id: String = row.get(0).map_err(|e| Error::Decode("tool_id", e.to_string()))?;
            let server: String = row.get(1).map_err(|e| Error::Decode("server_id", e.to_string()))?;
            let name: String = row.get(2).map_err(|e| Error::Decode("tool_name", e.to_string()))?;
            let metadata_raw: String = row.get(3).map_err(|e| Error::Decode("metadata", e.to_string()))?;
            let mut node = Node::tool(id, name, server);
            node.metadata = serde_json::from_str(&metadata_raw).map_err(Error::Json)?;
            tools.push(node);
        }
        Ok(tools)
    }

    async fn list_tool_dependencies(&self, min_confidence: f64) -> graphrag_core::Result<Vec<DependencyRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT from_tool_id, to_tool_id, observed_count, confidence_score, edge_type, edge_source, last_observed \
                 FROM tool_dependency WHERE confidence_score >= ?1",
                params![min_confidence],
            )
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut deps = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Query(e.to_string()))? {
            deps.push(DependencyRow {
                from: row.get::<String>(0).map_err(|e| Error::Decode("from_tool_id", e.to_string()))?,
                to: row.get::<String>(1).map_err(|e| Error::Decode("to_tool_id", e.to_string()))?,
                observed_count: row.get::<i64>(2).map_err(|e| Error::Decode("observed_count", e.to_string()))? as u64,
                confidence_score: row.get::<f64>(3).map_err(|e| Error::Decode("confidence_score", e.to_string()))?,
                edge_type: edge_type_from_str(&row.get::<String>(4).map_err(|e| Error::Decode("edge_type", e.to_string()))?)?,
                edge_source: edge_source_from_str(&row.get::<String>(5).map_err(|e| Error::Decode("edge_source", e.to_string()))?)?,
                last_observed: timestamp_from_row(row.get::<Option<i64>>(6).map_err(|e| Error::Decode("last_observed", e.to_string()))?),
            });
        }
        Ok(deps)
    }

    async fn list_capability_dependencies(&self, min_confidence: f64) -> graphrag_core::Result<Vec<CapabilityDependencyRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT from_capability_id, to_capability_id, observed_count, confidence_score, edge_type, edge_source \
                 FROM capability_dependency WHERE confidence_score >= ?1",
                params![min_confidence],
            )
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut deps = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Query(e.to_string()))? {
            deps.push(CapabilityDependencyRow {
                from: row.get::<String>(0).map_err(|e| Error::Decode("from_capability_id", e.to_string()))?,
                to: row.get::<String>(1).map_err(|e| Error::Decode("to_capability_id", e.to_string()))?,
                observed_count: row.get::<i64>(2).map_err(|e| Error::Decode("observed_count", e.to_string()))? as u64,
                confidence_score: row.get::<f64>(3).map_err(|e| Error::Decode("confidence_score", e.to_string()))?,
                edge_type: edge_type_from_str(&row.get::<String>(4).map_err(|e| Error::Decode("edge_type", e.to_string()))?)?,
                edge_source: edge_source_from_str(&row.get::<String>(5).map_err(|e| Error::Decode("edge_source", e.to_string()))?)?,
            });
        }
        Ok(deps)
    }

    async fn upsert_tool_dependency(&self, row: &DependencyRow) -> graphrag_core::Result<()> {
        self.conn
            .execute(
                "INSERT INTO tool_dependency (from_tool_id, to_tool_id, observed_count, confidence_score, edge_type, edge_source, last_observed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(from_tool_id, to_tool_id) DO UPDATE SET \
                 observed_count = excluded.observed_count, confidence_score = excluded.confidence_score, \
                 edge_type = excluded.edge_type, edge_source = excluded.edge_source, last_observed = excluded.last_observed",
                params![
                    row.from.clone(),
                    row.to.clone(),
                    row.observed_count as i64,
                    row.confidence_score,
                    edge_type_str(row.edge_type),
                    edge_source_str(row.edge_source),
                    row.last_observed.map(|t| t.timestamp()),
                ],
            )
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        Ok(())
    }

    async fn upsert_capability_dependency(&self, row: &CapabilityDependencyRow) -> graphrag_core::Result<()> {
        self.conn
            .execute(
                "INSERT INTO capability_dependency (from_capability_id, to_capability_id, observed_count, confidence_score, edge_type, edge_source) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(from_capability_id, to_capability_id) DO UPDATE SET \
                 observed_count = excluded.observed_count, confidence_score = excluded.confidence_score, \
                 edge_type = excluded.edge_type, edge_source = excluded.edge_source",
                params![
                    row.from.clone(),
                    row.to.clone(),
                    row.observed_count as i64,
                    row.confidence_score,
                    edge_type_str(row.edge_type),
                    edge_source_str(row.edge_source),
                ],
            )
            .await
            .map_err(|e| Error::Query(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityRepository for GraphStoreDb {
    async fn list_capabilities(&self) -> graphrag_core::Result<Vec<Capability>> {
        let mut rows = self
            .conn
            .query("SELECT capability_id, name, tools_used, success_rate, code_snippet, metadata FROM capability", ())
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut capabilities = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Query(e.to_string()))? {
            let tools_used_raw: String = row.get(2).map_err(|e| Error::Decode("tools_used", e.to_string()))?;
            let metadata_raw: String = row.get(5).map_err(|e| Error::Decode("metadata", e.to_string()))?;
            capabilities.push(Capability {
                id: row.get::<String>(0).map_err(|e| Error::Decode("capability_id", e.to_string()))?,
                name: row.get::<String>(1).map_err(|e| Error::Decode("name", e.to_string()))?,
                tools_used: serde_json::from_str(&tools_used_raw).map_err(Error::Json)?,
                success_rate: row.get::<f64>(3).map_err(|e| Error::Decode("success_rate", e.to_string()))?,
                code_snippet: row.get::<Option<String>>(4).map_err(|e| Error::Decode("code_snippet", e.to_string()))?,
                metadata: serde_json::from_str(&metadata_raw).map_err(Error::Json)?,
            });
        }
        Ok(capabilities)
    }
}

fn schema_property_names(schema_json: &str) -> StoreResult<HashSet<String>> {
    let value: serde_json::Value = serde_json::from_str(schema_json).map_err(Error::Json)?;
    Ok(value
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default())
}

impl GraphStoreDb {
    /// Derive `provides` tool-dependency edges from `tool_schema` overlap:
    /// tool A "provides" tool B when a property A's `output_schema`
    /// declares also appears in B's `input_schema` (spec.md §6, "for
    /// provides-edge calculation"). Confidence is the fraction of B's
    /// input properties that A's output satisfies. Upserted with
    /// `EdgeSource::Inferred` so a later observed dependency can still
    /// override it.
    ///
    /// # Errors
    ///
    /// Returns an error if `tool_schema` cannot be read, a schema column
    /// fails to parse as JSON, or an upsert fails.
    pub async fn derive_provides_edges(&self) -> graphrag_core::Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT tool_id, input_schema, output_schema FROM tool_schema", ())
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut tools = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| Error::Query(e.to_string()))? {
            let tool_id: String = row.get(0).map_err(|e| Error::Decode("tool_id", e.to_string()))?;
            let input_raw: String = row.get(1).map_err(|e| Error::Decode("input_schema", e.to_string()))?;
            let output_raw: String = row.get(2).map_err(|e| Error::Decode("output_schema", e.to_string()))?;
            let inputs = schema_property_names(&input_raw)?;
            let outputs = schema_property_names(&output_raw)?;
            tools.push((tool_id, inputs, outputs));
        }

        let mut derived = 0;
        for (from_id, _, from_outputs) in &tools {
            if from_outputs.is_empty() {
                continue;
            }
            for (to_id, to_inputs, _) in &tools {
                if from_id == to_id || to_inputs.is_empty() {
                    continue;
                }
                let overlap = from_outputs.intersection(to_inputs).count();
                if overlap == 0 {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let confidence = overlap as f64 / to_inputs.len() as f64;
                self.upsert_tool_dependency(&DependencyRow {
                    from: from_id.clone(),
                    to: to_id.clone(),
                    observed_count: 1,
                    confidence_score: confidence,
                    edge_type: EdgeType::Provides,
                    edge_source: EdgeSource::Inferred,
                    last_observed: None,
                })
                .await?;
                derived += 1;
            }
        }
        Ok(derived)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{connect, StoreConfig};
    use graphrag_core::types::EdgeAttrs;

    async fn memory_db() -> GraphStoreDb {
        let db = connect(&StoreConfig::new(":memory:", None)).await.unwrap();
        GraphStoreDb::new(&db).unwrap()
    }

    #[tokio::test]
    async fn upsert_then_list_round_trips_tool_dependency() {
        let repo = memory_db().await;
        let row = DependencyRow {
            from: "fs:read_file".into(),
            to: "fs:write_file".into(),
            observed_count: 3,
            confidence_score: 0.5,
            edge_type: EdgeType::Sequence,
            edge_source: EdgeSource::Observed,
            last_observed: Some(Utc::now()),
        };
        repo.upsert_tool_dependency(&row).await.unwrap();
        let listed = repo.list_tool_dependencies(0.3).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].from, "fs:read_file");
        assert_eq!(listed[0].edge_type, EdgeType::Sequence);
    }

    #[tokio::test]
    async fn low_confidence_tool_dependency_is_filtered() {
        let repo = memory_db().await;
        let row = DependencyRow {
            from: "a".into(),
            to: "b".into(),
            observed_count: 1,
            confidence_score: 0.1,
            edge_type: EdgeType::Sequence,
            edge_source: EdgeSource::Inferred,
            last_observed: None,
        };
        repo.upsert_tool_dependency(&row).await.unwrap();
        assert!(repo.list_tool_dependencies(0.3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_embedding_round_trips_as_a_node() {
        let repo = memory_db().await;
        repo.conn
            .execute(
                "INSERT INTO tool_embedding (tool_id, server_id, tool_name, metadata) VALUES (?1, ?2, ?3, ?4)",
                params!["fs:read_file", "fs", "read_file", "{}"],
            )
            .await
            .unwrap();
        let tools = repo.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].id, "fs:read_file");
    }

    #[tokio::test]
    async fn capability_round_trips() {
        let repo = memory_db().await;
        repo.conn
            .execute(
                "INSERT INTO capability (capability_id, name, tools_used, success_rate, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
                params!["11111111-1111-1111-1111-111111111111", "backup-and-restore", r#"["fs:read_file","fs:write_file"]"#, 0.8, "{}"],
            )
            .await
            .unwrap();
        let capabilities = repo.list_capabilities().await.unwrap();
        assert_eq!(capabilities.len(), 1);
        assert_eq!(capabilities[0].tools_used.len(), 2);
        assert!((capabilities[0].success_rate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn edge_type_and_source_round_trip_through_strings() {
        for t in [EdgeType::Dependency, EdgeType::Contains, EdgeType::Alternative, EdgeType::Provides, EdgeType::Sequence] {
            assert_eq!(edge_type_from_str(edge_type_str(t)).unwrap(), t);
        }
        for s in [EdgeSource::Observed, EdgeSource::Inferred, EdgeSource::Template, EdgeSource::User] {
            assert_eq!(edge_source_from_str(edge_source_str(s)).unwrap(), s);
        }
    }

    #[tokio::test]
    async fn derive_provides_edges_links_matching_output_to_input() {
        let repo = memory_db().await;
        repo.conn
            .execute(
                "INSERT INTO tool_schema (tool_id, server_id, name, input_schema, output_schema) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    "fs:read_file",
                    "fs",
                    "read_file",
                    r#"{"properties":{"path":{}}}"#,
                    r#"{"properties":{"contents":{}}}"#,
                ],
            )
            .await
            .unwrap();
        repo.conn
            .execute(
                "INSERT INTO tool_schema (tool_id, server_id, name, input_schema, output_schema) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    "text:summarize",
                    "text",
                    "summarize",
                    r#"{"properties":{"contents":{}}}"#,
                    r#"{"properties":{"summary":{}}}"#,
                ],
            )
            .await
            .unwrap();

        let derived = repo.derive_provides_edges().await.unwrap();
        assert_eq!(derived, 1);

        let deps = repo.list_tool_dependencies(0.0).await.unwrap();
        let edge = deps.iter().find(|d| d.from == "fs:read_file" && d.to == "text:summarize").unwrap();
        assert_eq!(edge.edge_type, EdgeType::Provides);
        assert_eq!(edge.edge_source, EdgeSource::Inferred);
        assert!((edge.confidence_score - 1.0).abs() < 1e-9);
    }
}
