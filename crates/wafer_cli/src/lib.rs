//! Wafer CLI Library
//!
//! File and text helpers behind the `wafer` binary: corpus JSON dumps,
//! ASCII wafer maps and pipeline config assembly from command line flags.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

use wafer_core::config::PipelineConfig;
use wafer_core::corpus::TrainingCorpus;
use wafer_core::features::FEATURE_LAYOUT_VERSION;
use wafer_core::wafer::{simulate_wafer, DieStatus, FieldSelector, WaferGrid, WaferSpec};
use wafer_core::{PredictionResult, SCHEMA_VERSION};

/// Summary of a corpus dump, saved by [`save_metadata`] on request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusMetadata {
    pub schema_version: u8,
    pub layout_version: u32,
    pub seed: u64,
    pub samples: usize,
    pub per_class: Vec<usize>,
    /// RFC3339
    pub created_at: String,
    pub size_bytes: u64,
}

#[derive(Serialize, Deserialize)]
struct CorpusFile {
    schema_version: u8,
    layout_version: u32,
    corpus: TrainingCorpus,
}

/// Serialize a corpus to `out` as JSON
pub fn write_corpus(corpus: &TrainingCorpus, out: &Path) -> Result<CorpusMetadata> {
    let file = CorpusFile { schema_version: SCHEMA_VERSION, layout_version: FEATURE_LAYOUT_VERSION, corpus: corpus.clone() };
    let json = serde_json::to_string(&file).context("Failed to serialize corpus")?;
    fs::write(out, &json).with_context(|| format!("Failed to write corpus file: {}", out.display()))?;
    info!(path = %out.display(), samples = corpus.len(), bytes = json.len(), "Corpus written");

    Ok(CorpusMetadata {
        schema_version: SCHEMA_VERSION,
        layout_version: FEATURE_LAYOUT_VERSION,
        seed: corpus.seed(),
        samples: corpus.len(),
        per_class: corpus.class_counts().to_vec(),
        created_at: chrono::Utc::now().to_rfc3339(),
        size_bytes: json.len() as u64,
    })
}

/// Write corpus metadata as pretty JSON
pub fn save_metadata(path: &Path, meta: &CorpusMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(meta).context("Failed to serialize corpus metadata")?;
    fs::write(path, json).with_context(|| format!("Failed to write metadata file: {}", path.display()))?;
    Ok(())
}

/// Read a corpus written by [`write_corpus`]
pub fn load_corpus(path: &Path) -> Result<TrainingCorpus> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
    let file: CorpusFile = serde_json::from_str(&json).context("Failed to parse corpus JSON")?;

    if file.schema_version != SCHEMA_VERSION {
        anyhow::bail!("Unsupported schema version: {}", file.schema_version);
    }
    if file.layout_version != FEATURE_LAYOUT_VERSION {
        anyhow::bail!(
            "Corpus feature layout v{} does not match v{}",
            file.layout_version,
            FEATURE_LAYOUT_VERSION
        );
    }
    Ok(file.corpus)
}

/// Pipeline config from the shared CLI flags
pub fn pipeline_config(samples: usize, seed: u64, epochs: Option<usize>) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.corpus.num_samples = samples;
    config.trainer.seed = seed;
    if let Some(epochs) = epochs {
        config.trainer.max_epochs = epochs;
    }
    config
}

/// Validate the geometry and simulate one wafer
pub fn simulate(config: &PipelineConfig, diameter_mm: f64, die_size_mm2: f64, pattern: &str, seed: u64) -> Result<WaferGrid> {
    let spec = WaferSpec::checked(diameter_mm, die_size_mm2, &config.wafer).context("Invalid wafer geometry")?;
    let selector = FieldSelector::from_label(pattern);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(simulate_wafer(spec, selector, &config.outcome, &mut rng)?)
}

/// ASCII wafer map followed by tier counts
pub fn render_wafer(grid: &WaferGrid) -> String {
    let mut out = String::new();
    for row in grid.status_rows() {
        let _ = writeln!(out, "   {}", row);
    }

    let tiers = grid.tier_counts();
    let _ = writeln!(out);
    for status in DieStatus::ALL {
        let _ = writeln!(out, "   {} {:<9} {:>5}", status.glyph(), status.as_str(), tiers.get(status));
    }
    let _ = writeln!(
        out,
        "   {} dies, {} defective, failure rate {:.1}%",
        grid.len(),
        grid.defect_count(),
        tiers.failure_rate() * 100.0
    );
    out
}

/// Ranked prediction lines
pub fn render_prediction(result: &PredictionResult) -> String {
    let mut out = String::new();
    for (rank, entry) in result.top_k.iter().enumerate() {
        let _ = writeln!(out, "   {}. {:<34} {:>6.2}%", rank + 1, entry.label.as_str(), entry.probability * 100.0);
    }
    out
}
