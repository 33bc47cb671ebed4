//! `graphrag-mcp-server`: the stdio entry point. Reads newline- or
//! LSP-framed JSON-RPC from stdin on a dedicated blocking thread, and
//! dispatches each line onto the tokio runtime, bounded by
//! [`graphrag_mcp::limiter::InFlightLimiter`].

use std::io::Write;
use std::sync::Arc;

use graphrag_core::config::{DagScoringConfig, LocalAlphaConfig};
use graphrag_mcp::{dispatch, jsonrpc, PlannerMcpServer};
use graphrag_store::{GraphStoreDb, StoreConfig};
use parking_lot::Mutex;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    info!("starting graphrag-mcp-server");

    let store_url = std::env::var("GRAPHRAG_DB_URL").unwrap_or_else(|_| ":memory:".to_string());
    let auth_token = std::env::var("GRAPHRAG_DB_TOKEN").ok();
    let db = graphrag_store::connect(&StoreConfig::new(store_url, auth_token)).await?;
    let repo = GraphStoreDb::new(&db)?;
    let provides_edges = repo.derive_provides_edges().await?;
    info!(provides_edges, "derived provides-edges from tool_schema overlap");

    let dag_config = match std::env::var("GRAPHRAG_DAG_CONFIG") {
        Ok(path) => DagScoringConfig::load(path)?,
        Err(_) => DagScoringConfig::default(),
    };
    let alpha_config = match std::env::var("GRAPHRAG_ALPHA_CONFIG") {
        Ok(path) => LocalAlphaConfig::load(path)?,
        Err(_) => LocalAlphaConfig::default(),
    };

    let stdout: Arc<Mutex<dyn Write + Send>> = Arc::new(Mutex::new(std::io::stdout()));
    let server = Arc::new(PlannerMcpServer::new(repo, dag_config, alpha_config, Arc::clone(&stdout)).await?);

    info!(max_in_flight = server.limiter.available_permits(), "graphrag-mcp-server ready");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut reader = stdin.lock();
        loop {
            match jsonrpc::read_next_message(&mut reader) {
                Ok(Some((line, _is_framed))) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read error");
                    break;
                }
            }
        }
    });

    while let Some(line) = rx.recv().await {
        let server = Arc::clone(&server);
        let stdout = Arc::clone(&stdout);
        tokio::spawn(async move {
            if let Some(response) = dispatch::handle_message(&server, &line).await {
                match serde_json::to_string(&response) {
                    Ok(body) => {
                        let mut writer = stdout.lock();
                        if let Err(e) = jsonrpc::write_line(&mut *writer, &body) {
                            error!(error = %e, "failed to write response");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to serialize response"),
                }
            }
        });
    }

    info!("stdin closed, shutting down");
    Ok(())
}
