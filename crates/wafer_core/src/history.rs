//! In-memory case history
//!
//! Stores analysed wafers and finds past cases whose feature vectors point
//! the same way. Persistence is up to the host; records move in and out as
//! JSON strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ConfigError, Result};
use crate::features::{offsets, FeatureVector, FEATURE_LAYOUT_VERSION, FEATURE_LEN};
use crate::wafer::{TierCounts, WaferSpec};

/// Default number of records kept
pub const DEFAULT_CAPACITY: usize = 500;
/// Cosine similarity a past case must exceed to count as similar
pub const SIMILARITY_THRESHOLD: f64 = 0.3;
/// Statistics below this many cases are reported as insufficient
pub const MIN_CASES_FOR_INSIGHTS: usize = 5;
/// Edge-zone share of the radial density above which a case counts as an edge pattern
pub const EDGE_SHARE_THRESHOLD: f64 = 0.6;
/// Center-zone share above which a case counts as a center pattern
pub const CENTER_SHARE_THRESHOLD: f64 = 0.5;

/// Case as handed over by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    pub spec: WaferSpec,
    pub tiers: TierCounts,
    pub features: FeatureVector,
    /// Label the wafer was simulated or diagnosed with
    pub diagnosis: String,
    pub predicted: Option<String>,
    pub confidence: Option<f64>,
}

/// Stored case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub layout_version: u32,
    #[serde(flatten)]
    pub case: NewCase,
}

/// Past case ranked by similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCase<'a> {
    pub record: &'a CaseRecord,
    pub similarity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityDistribution {
    /// failure rate < 0.2
    pub low: usize,
    /// < 0.4
    pub moderate: usize,
    /// < 0.6
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub fn from_failure_rate(rate: f64) -> Self {
        if rate < 0.2 {
            Severity::Low
        } else if rate < 0.4 {
            Severity::Moderate
        } else if rate < 0.6 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisCount {
    pub diagnosis: String,
    pub count: usize,
    /// Share of all records, in [0, 1]
    pub share: f64,
}

/// Where the defects of a stored case sit, read back from its feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialSignature {
    /// Outermost radial zone density over the sum of all zone densities
    pub edge_share: f64,
    /// Innermost radial zone density over the sum of all zone densities
    pub center_share: f64,
    /// One quadrant carries at least half of the quadrant density
    pub clustered: bool,
}

impl SpatialSignature {
    pub fn from_features(features: &FeatureVector) -> Self {
        let v = features.as_slice();
        let zones = v.get(offsets::ZONES..offsets::ZONES + 5).unwrap_or(&[]);
        let quads = v.get(offsets::QUADRANTS..offsets::QUADRANTS + 4).unwrap_or(&[]);

        let zone_total: f64 = zones.iter().map(|&z| z as f64).sum();
        let share = |z: Option<&f32>| match z {
            Some(&z) if zone_total > 0.0 => z as f64 / zone_total,
            _ => 0.0,
        };

        let quad_total: f64 = quads.iter().map(|&q| q as f64).sum();
        let quad_max = quads.iter().fold(0.0f64, |m, &q| m.max(q as f64));

        Self {
            edge_share: share(zones.last()),
            center_share: share(zones.first()),
            clustered: quad_total > 0.0 && quad_max >= 0.5 * quad_total,
        }
    }

    pub fn is_edge(&self) -> bool {
        self.edge_share > EDGE_SHARE_THRESHOLD
    }

    pub fn is_center(&self) -> bool {
        self.center_share > CENTER_SHARE_THRESHOLD
    }

    /// Two spatial signatures at once, on looser thresholds
    pub fn is_hybrid(&self) -> bool {
        let edge = self.edge_share > 0.5;
        let center = self.center_share > 0.3;
        (edge && center) || (edge && self.clustered) || (center && self.clustered)
    }
}

/// Cases sharing one spatial signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternBreakdown {
    pub seen: usize,
    /// Share of all records, in [0, 1]
    pub share: f64,
    /// Diagnoses within this group; shares relative to `seen`
    pub causes: Vec<DiagnosisCount>,
}

/// Aggregate view over the whole history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryInsights {
    pub total_cases: usize,
    pub edge: PatternBreakdown,
    pub center: PatternBreakdown,
    pub cluster: PatternBreakdown,
    pub hybrid: PatternBreakdown,
    pub severity: SeverityDistribution,
    pub common_diagnoses: Vec<DiagnosisCount>,
}

/// Most frequent diagnoses; ties broken alphabetically
fn rank_diagnoses<'a>(records: impl Iterator<Item = &'a CaseRecord>, n: usize) -> Vec<DiagnosisCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for record in records {
        *counts.entry(record.case.diagnosis.as_str()).or_default() += 1;
        total += 1;
    }
    let total = total.max(1) as f64;
    let mut ranked: Vec<DiagnosisCount> = counts
        .into_iter()
        .map(|(diagnosis, count)| DiagnosisCount {
            diagnosis: diagnosis.to_string(),
            count,
            share: count as f64 / total,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.diagnosis.cmp(&b.diagnosis)));
    ranked.truncate(n);
    ranked
}

#[derive(Serialize, Deserialize)]
struct HistoryExport {
    layout_version: u32,
    cases: Vec<CaseRecord>,
}

/// Cosine similarity over the common prefix; 0 when either side has no magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut mag_a, mut mag_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }
    let magnitude = mag_a.sqrt() * mag_b.sqrt();
    if magnitude == 0.0 {
        0.0
    } else {
        dot / magnitude
    }
}

#[derive(Debug, Clone)]
pub struct CaseHistory {
    records: VecDeque<CaseRecord>,
    capacity: usize,
}

impl Default for CaseHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CaseHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { records: VecDeque::new(), capacity: capacity.max(1) }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &CaseRecord> {
        self.records.iter()
    }

    pub fn get(&self, id: Uuid) -> Option<&CaseRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    fn push(&mut self, record: CaseRecord) {
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            if let Some(dropped) = self.records.pop_front() {
                debug!(id = %dropped.id, "History full, dropping oldest case");
            }
        }
    }

    /// Store a case and return its id
    pub fn record(&mut self, case: NewCase) -> Uuid {
        let id = Uuid::new_v4();
        self.push(CaseRecord { id, recorded_at: Utc::now(), layout_version: FEATURE_LAYOUT_VERSION, case });
        id
    }

    /// Most similar past cases above [`SIMILARITY_THRESHOLD`], best first
    pub fn find_similar(&self, features: &FeatureVector, top_k: usize) -> Vec<SimilarCase<'_>> {
        let mut similar: Vec<SimilarCase<'_>> = self
            .records
            .iter()
            .map(|record| SimilarCase {
                record,
                similarity: cosine_similarity(features.as_slice(), record.case.features.as_slice()),
            })
            .filter(|s| s.similarity > SIMILARITY_THRESHOLD)
            .collect();
        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar.truncate(top_k);
        similar
    }

    pub fn severity_distribution(&self) -> SeverityDistribution {
        let mut dist = SeverityDistribution::default();
        for record in self.records.iter().filter(|r| r.case.tiers.total() > 0) {
            match Severity::from_failure_rate(record.case.tiers.failure_rate()) {
                Severity::Low => dist.low += 1,
                Severity::Moderate => dist.moderate += 1,
                Severity::High => dist.high += 1,
                Severity::Critical => dist.critical += 1,
            }
        }
        dist
    }

    /// Most frequent diagnoses; ties broken alphabetically
    pub fn common_diagnoses(&self, n: usize) -> Vec<DiagnosisCount> {
        rank_diagnoses(self.records.iter(), n)
    }

    /// Records whose spatial signature matches `filter`, with their diagnoses
    pub fn pattern_breakdown(&self, filter: impl Fn(&SpatialSignature) -> bool) -> PatternBreakdown {
        let matching: Vec<&CaseRecord> = self
            .records
            .iter()
            .filter(|r| filter(&SpatialSignature::from_features(&r.case.features)))
            .collect();
        PatternBreakdown {
            seen: matching.len(),
            share: matching.len() as f64 / self.records.len().max(1) as f64,
            causes: rank_diagnoses(matching.into_iter(), usize::MAX),
        }
    }

    /// `None` until [`MIN_CASES_FOR_INSIGHTS`] cases exist
    pub fn insights(&self) -> Option<HistoryInsights> {
        if self.records.len() < MIN_CASES_FOR_INSIGHTS {
            return None;
        }
        Some(HistoryInsights {
            total_cases: self.records.len(),
            edge: self.pattern_breakdown(SpatialSignature::is_edge),
            center: self.pattern_breakdown(SpatialSignature::is_center),
            cluster: self.pattern_breakdown(|s| s.clustered),
            hybrid: self.pattern_breakdown(SpatialSignature::is_hybrid),
            severity: self.severity_distribution(),
            common_diagnoses: self.common_diagnoses(5),
        })
    }

    pub fn export_json(&self) -> Result<String> {
        let export = HistoryExport {
            layout_version: FEATURE_LAYOUT_VERSION,
            cases: self.records.iter().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Merge exported records, skipping ids already present. Returns the
    /// number of records added.
    ///
    /// # Errors
    /// The whole import is rejected, adding nothing, when the export or any
    /// record was written with another feature layout or carries a vector
    /// that is not [`FEATURE_LEN`] long.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let export: HistoryExport = serde_json::from_str(json)?;
        let mut versions = std::iter::once(export.layout_version).chain(export.cases.iter().map(|r| r.layout_version));
        if let Some(found) = versions.find(|&v| v != FEATURE_LAYOUT_VERSION) {
            return Err(ConfigError::LayoutVersion { expected: FEATURE_LAYOUT_VERSION, found }.into());
        }
        if let Some(bad) = export.cases.iter().find(|r| r.case.features.len() != FEATURE_LEN) {
            return Err(ConfigError::FeatureLength { expected: FEATURE_LEN, found: bad.case.features.len() }.into());
        }

        let known: HashSet<Uuid> = self.records.iter().map(|r| r.id).collect();
        let mut added = 0;
        for record in export.cases {
            if known.contains(&record.id) {
                continue;
            }
            self.push(record);
            added += 1;
        }
        info!(added, total = self.records.len(), "Imported case history");
        Ok(added)
    }
}
