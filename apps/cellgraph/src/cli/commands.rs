//! # CLI Command Implementations

use crate::api;
use cellgraph_core::{
    CellGraphError, ConnectivityEdge, EdgeRow, Pipeline, PipelineConfig, RedbStore, Simulator,
    StoreMetrics, TelemetryRow, TelemetryStore, link_edges, sync_rows,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

// =============================================================================
// INPUT FILES
// =============================================================================

/// Maximum size of an ingestion file (100 MB).
const MAX_INGEST_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Resolve a user-supplied path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CellGraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        CellGraphError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CellGraphError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CellGraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CellGraphError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CellGraphError::InvalidRecord(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Read a JSON array from a validated file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CellGraphError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_INGEST_FILE_SIZE)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| CellGraphError::IoError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| CellGraphError::SerializationError(format!("{}: {}", path.display(), e)))
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Configuration file, then `CELLGRAPH_DB`, then `--database`.
pub fn resolve_config(
    config_path: Option<&Path>,
    database: Option<&Path>,
) -> Result<PipelineConfig, CellGraphError> {
    let mut config = PipelineConfig::load(config_path)?;
    if let Some(path) = database {
        config.store.path = path.to_path_buf();
    }
    config.validate()?;
    Ok(config)
}

fn open_store(config: &PipelineConfig) -> Result<RedbStore, CellGraphError> {
    RedbStore::open(&config.store.path)
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty store, replacing an existing one only with `--force`.
pub fn cmd_init(config: &PipelineConfig, json_mode: bool, force: bool) -> Result<(), CellGraphError> {
    let path = &config.store.path;
    if path.exists() {
        if !force {
            return Err(CellGraphError::IoError(format!(
                "Store {} already exists (use --force to replace it)",
                path.display()
            )));
        }
        std::fs::remove_file(path)
            .map_err(|e| CellGraphError::IoError(format!("{}: {}", path.display(), e)))?;
        tracing::warn!(path = %path.display(), "existing store removed");
    }

    open_store(config)?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": path.to_string_lossy(),
            "created": true
        }));
    } else {
        println!("Initialized empty store at {}", path.display());
    }
    Ok(())
}

// =============================================================================
// SIMULATE COMMAND
// =============================================================================

/// Write synthetic rows and a ring topology into the store.
pub fn cmd_simulate(
    config: &PipelineConfig,
    json_mode: bool,
    cells: u64,
    seed: u64,
    chords: usize,
) -> Result<(), CellGraphError> {
    let simulator = Simulator::new(cells, seed)?;
    let mut store = open_store(config)?;

    let rows = simulator.rows(chrono::Local::now().naive_local());
    let sync = sync_rows(&mut store, rows)?;
    let links = link_edges(&mut store, &simulator.edges(chords))?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.store.path.to_string_lossy(),
            "cells": sync.cells,
            "inserted": sync.inserted,
            "updated": sync.updated,
            "edges": links.succeeded,
            "failed_writes": sync.writes.failed() + links.failed()
        }));
        return Ok(());
    }

    println!("Simulated {} cells (seed {})", sync.cells, seed);
    println!("  Inserted: {}", sync.inserted);
    println!("  Updated:  {}", sync.updated);
    println!("  Edges:    {}", links.succeeded);
    let failed = sync.writes.failed() + links.failed();
    if failed > 0 {
        println!("  Failed:   {}", failed);
    }
    Ok(())
}

// =============================================================================
// INGEST AND LINK COMMANDS
// =============================================================================

/// Sync telemetry rows, keeping the latest row per cell.
pub fn cmd_ingest(config: &PipelineConfig, json_mode: bool, file: &Path) -> Result<(), CellGraphError> {
    let rows: Vec<TelemetryRow> = read_json_file(file)?;
    let mut store = open_store(config)?;
    let report = sync_rows(&mut store, rows)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Synced {} rows into {} cells", report.rows, report.cells);
    println!("  Inserted: {}", report.inserted);
    println!("  Updated:  {}", report.updated);
    for failure in &report.writes.failures {
        println!("  Failed:   {} ({})", failure.target, failure.error);
    }
    Ok(())
}

/// Append connectivity edges. Cells may be given as numeric ids or keys.
pub fn cmd_link(config: &PipelineConfig, json_mode: bool, file: &Path) -> Result<(), CellGraphError> {
    let edges: Vec<ConnectivityEdge> = read_json_file::<EdgeRow>(file)?
        .into_iter()
        .map(ConnectivityEdge::from)
        .collect();
    let mut store = open_store(config)?;
    let report = link_edges(&mut store, &edges)?;

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Linked {} of {} edges", report.succeeded, report.attempted);
    for failure in &report.failures {
        println!("  Failed: {} ({})", failure.target, failure.error);
    }
    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Run the pipeline once against the store.
pub fn cmd_run(config: &PipelineConfig, json_mode: bool) -> Result<(), CellGraphError> {
    let pipeline = Pipeline::new(config)?;
    let mut store = open_store(config)?;
    let report = pipeline.run(&mut store)?;

    if json_mode {
        print_json(&report);
    } else {
        print!("{}", report);
    }
    Ok(())
}

// =============================================================================
// STATUS AND SEGMENTS COMMANDS
// =============================================================================

/// Show store counts.
pub fn cmd_status(config: &PipelineConfig, json_mode: bool) -> Result<(), CellGraphError> {
    let store = open_store(config)?;
    let metrics = StoreMetrics::from_store(&store)?;

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.store.path.to_string_lossy(),
            "entity_count": metrics.entities,
            "edge_count": metrics.edges,
            "segment_count": metrics.segments,
            "failing_segments": metrics.failing_segments,
            "colored_entities": metrics.colored,
            "congested_entities": metrics.congested
        }));
        return Ok(());
    }

    println!("cellgraph Store Status");
    println!("======================");
    println!("Database: {}", config.store.path.display());
    println!();
    println!("Cells:            {}", metrics.entities);
    match metrics.edges {
        Some(edges) => println!("Edges:            {}", edges),
        None => println!("Edges:            (no edge collection)"),
    }
    println!("Segments:         {}", metrics.segments);
    println!("Failing segments: {}", metrics.failing_segments);
    println!("Predicted cells:  {}", metrics.colored);
    println!("Congested cells:  {}", metrics.congested);
    Ok(())
}

/// List persisted segments.
pub fn cmd_segments(config: &PipelineConfig, json_mode: bool) -> Result<(), CellGraphError> {
    let store = open_store(config)?;
    let segments = store.read_segments()?;

    if json_mode {
        print_json(&segments);
        return Ok(());
    }

    if segments.is_empty() {
        println!("No segments stored (run the pipeline first)");
        return Ok(());
    }
    println!(
        "{:>8}  {:>6}  {:>10}  {:<6}  updated",
        "segment", "cells", "norm", "status"
    );
    for segment in &segments {
        println!(
            "{:>8}  {:>6}  {:>10.4}  {:<6}  {}",
            segment.segment_id,
            segment.device_ids.len(),
            segment.norm,
            segment.status.as_str(),
            segment.updated
        );
    }
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Serve the dashboard API over the store.
pub async fn cmd_server(config: &PipelineConfig, host: &str, port: u16) -> Result<(), CellGraphError> {
    let store = open_store(config)?;

    println!("cellgraph dashboard API starting...");
    println!();
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Database: {}", config.store.path.display());
    println!();
    println!("Endpoints:");
    println!("  GET /health          - Health check");
    println!("  GET /status          - Store counts");
    println!("  GET /entities        - All cells");
    println!("  GET /entities/{{key}}  - One cell");
    println!("  GET /edges           - Connectivity edges");
    println!("  GET /segments        - Segment predictions");
    println!("  GET /graph           - Graph elements");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, api::AppState::new(store)).await
}

// =============================================================================
// TESTS
// =============================================================================
