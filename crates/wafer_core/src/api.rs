//! JSON boundary for host applications
//!
//! Requests and responses carry `schema_version`; only [`SCHEMA_VERSION`] is
//! accepted. Pattern labels arrive as free text and resolve through
//! [`FieldSelector::from_label`], so unknown labels simulate on the fallback
//! field and come back with `label_recognized = false`.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::classifier::ModelState;
use crate::config::PipelineConfig;
use crate::error::{Result, WaferError};
use crate::features::{extract, FeatureVector};
use crate::prediction::{PredictionResult, PredictionService};
use crate::wafer::{simulate_wafer, FieldSelector, TierCounts, WaferGrid, WaferSpec};
use crate::SCHEMA_VERSION;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SimulateRequest {
    pub schema_version: u8,
    pub diameter_mm: f64,
    pub die_size_mm2: f64,
    /// Pattern label; unknown labels use the fallback field
    pub pattern: String,
    pub seed: u64,
    #[serde(default)]
    pub include_status_map: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SimulateResponse {
    pub schema_version: u8,
    pub pattern: String,
    pub label_recognized: bool,
    pub total_dies: usize,
    pub defect_count: usize,
    pub tiers: TierCounts,
    pub features: FeatureVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_map: Option<Vec<String>>,
}

/// What to classify
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum ClassifyInput {
    /// A precomputed feature vector
    Features { features: Vec<f32> },
    /// Simulate a wafer first
    Simulate { diameter_mm: f64, die_size_mm2: f64, pattern: String, seed: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifyRequest {
    pub schema_version: u8,
    pub input: ClassifyInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifyResponse {
    pub schema_version: u8,
    pub prediction: PredictionResult,
    /// Present for simulated input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_recognized: Option<bool>,
}

fn check_version(version: u8) -> Result<()> {
    if version != SCHEMA_VERSION {
        return Err(WaferError::SchemaVersion(version));
    }
    Ok(())
}

fn simulate(
    config: &PipelineConfig,
    diameter_mm: f64,
    die_size_mm2: f64,
    pattern: &str,
    seed: u64,
) -> Result<(WaferGrid, FieldSelector)> {
    let spec = WaferSpec::checked(diameter_mm, die_size_mm2, &config.wafer)?;
    let selector = FieldSelector::from_label(pattern);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let grid = simulate_wafer(spec, selector, &config.outcome, &mut rng)?;
    Ok((grid, selector))
}

/// Simulate one wafer from a JSON request
pub fn simulate_wafer_json(request_json: &str) -> Result<String> {
    simulate_wafer_json_with(&PipelineConfig::default(), request_json)
}

pub fn simulate_wafer_json_with(config: &PipelineConfig, request_json: &str) -> Result<String> {
    let request: SimulateRequest = serde_json::from_str(request_json)?;
    check_version(request.schema_version)?;

    let (grid, selector) = simulate(
        config,
        request.diameter_mm,
        request.die_size_mm2,
        &request.pattern,
        request.seed,
    )?;
    let response = SimulateResponse {
        schema_version: SCHEMA_VERSION,
        pattern: selector.to_string(),
        label_recognized: selector.is_recognized(),
        total_dies: grid.len(),
        defect_count: grid.defect_count(),
        tiers: grid.tier_counts(),
        features: extract(&grid),
        status_map: request.include_status_map.then(|| grid.status_rows()),
    };
    Ok(serde_json::to_string(&response)?)
}

/// Classify a feature vector or a freshly simulated wafer
pub fn classify_wafer_json(state: &mut ModelState, service: &PredictionService, request_json: &str) -> Result<String> {
    let request: ClassifyRequest = serde_json::from_str(request_json)?;
    check_version(request.schema_version)?;

    let (features, label_recognized) = match request.input {
        ClassifyInput::Features { features } => (FeatureVector::new(features), None),
        ClassifyInput::Simulate { diameter_mm, die_size_mm2, pattern, seed } => {
            let (grid, selector) = simulate(service.config(), diameter_mm, die_size_mm2, &pattern, seed)?;
            (extract(&grid), Some(selector.is_recognized()))
        }
    };

    let prediction = service.predict(state, &features)?;
    let response = ClassifyResponse { schema_version: SCHEMA_VERSION, prediction, label_recognized };
    Ok(serde_json::to_string(&response)?)
}

/// JSON schemas of the request types, keyed by type name
pub fn request_schemas() -> Result<String> {
    let schemas = serde_json::json!({
        "SimulateRequest": schema_for!(SimulateRequest),
        "ClassifyRequest": schema_for!(ClassifyRequest),
    });
    Ok(serde_json::to_string_pretty(&schemas)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_LEN;
    use crate::prediction::AutoTrain;

    fn quick_service() -> PredictionService {
        let mut cfg = PipelineConfig::default();
        cfg.corpus.num_samples = 210;
        cfg.trainer.max_epochs = 2;
        PredictionService::new(cfg)
    }

    #[test]
    fn test_simulate_roundtrip() {
        let json = r#"{"schema_version":1,"diameter_mm":300,"die_size_mm2":100,"pattern":"Edge Die Failure","seed":7,"include_status_map":true}"#;
        let response: SimulateResponse = serde_json::from_str(&simulate_wafer_json(json).unwrap()).unwrap();
        assert!(response.label_recognized);
        assert_eq!(response.pattern, "Edge Die Failure");
        assert_eq!(response.tiers.total(), response.total_dies);
        assert_eq!(response.features.len(), FEATURE_LEN);
        let map = response.status_map.unwrap();
        assert_eq!(map.len(), 30);
    }

    #[test]
    fn test_unknown_label_is_reported_not_rejected() {
        let json = r#"{"schema_version":1,"diameter_mm":200,"die_size_mm2":50,"pattern":"Edge Die Failure + Scratch Pattern","seed":1}"#;
        let response: SimulateResponse = serde_json::from_str(&simulate_wafer_json(json).unwrap()).unwrap();
        assert!(!response.label_recognized);
        assert!(response.status_map.is_none());
    }

    #[test]
    fn test_schema_version_and_geometry_checked() {
        let wrong_version = r#"{"schema_version":2,"diameter_mm":300,"die_size_mm2":100,"pattern":"Perfect Run","seed":1}"#;
        assert!(matches!(simulate_wafer_json(wrong_version), Err(WaferError::SchemaVersion(2))));

        let bad_diameter = r#"{"schema_version":1,"diameter_mm":250,"die_size_mm2":100,"pattern":"Perfect Run","seed":1}"#;
        assert!(simulate_wafer_json(bad_diameter).unwrap_err().is_configuration());

        assert!(matches!(simulate_wafer_json("{"), Err(WaferError::Serialization(_))));
    }

    #[test]
    fn test_classify_feature_length_checked_before_training() {
        let mut state = ModelState::default();
        let json = r#"{"schema_version":1,"input":{"type":"Features","features":[0.1,0.2]}}"#;
        assert!(classify_wafer_json(&mut state, &quick_service(), json).unwrap_err().is_configuration());
        assert!(!state.is_trained());
    }

    #[test]
    fn test_classify_simulated_wafer() {
        let mut state = ModelState::default();
        let json = r#"{"schema_version":1,"input":{"type":"Simulate","diameter_mm":300,"die_size_mm2":100,"pattern":"Cluster Failure","seed":3}}"#;
        let response: ClassifyResponse =
            serde_json::from_str(&classify_wafer_json(&mut state, &quick_service(), json).unwrap()).unwrap();
        assert_eq!(response.label_recognized, Some(true));
        assert_eq!(response.prediction.top_k.len(), 3);
        assert!(state.is_trained());
    }

    #[test]
    fn test_classify_without_auto_train() {
        let mut state = ModelState::default();
        let service = quick_service().with_auto_train(AutoTrain::Disabled);
        let features = vec![0.0f32; FEATURE_LEN];
        let json = serde_json::json!({"schema_version": 1, "input": {"type": "Features", "features": features}});
        let err = classify_wafer_json(&mut state, &service, &json.to_string()).unwrap_err();
        assert!(matches!(err, WaferError::UntrainedModel));
    }

    #[test]
    fn test_request_schemas_export() {
        let schemas: serde_json::Value = serde_json::from_str(&request_schemas().unwrap()).unwrap();
        assert!(schemas.get("SimulateRequest").is_some());
        assert!(schemas["ClassifyRequest"]["properties"].get("schema_version").is_some());
    }
}
