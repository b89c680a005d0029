//! Model registry: load-once, read-only table of model entries
//!
//! Every model is loaded independently at startup. A bundle that fails to
//! load marks only its own model Unavailable; the rest of the registry is
//! unaffected and the process keeps running. After construction the registry
//! is never mutated, so it is shared across request handlers without locks.

use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::{
    ArtifactError, ClassLabel, Classifier, LabelEncoder, OnnxClassifier, OnnxScaler, Scaler,
};
use crate::error::LoadError;
use crate::model_id::{ModelId, PredictionMode};
use crate::preprocess::Preprocessor;
use crate::schema::{FeatureSchema, CLASS_ENCODER};

/// Bundle layout version this build understands
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Manifest file inside a bundle directory
pub const MANIFEST_FILE: &str = "bundle.json";

/// Classifier graph used when the manifest names none
pub const DEFAULT_CLASSIFIER_FILE: &str = "classifier.onnx";

// ============================================================================
// Model entry
// ============================================================================

/// One loaded model: classifier plus the preprocessing it was trained with
pub struct ModelEntry {
    model_id: ModelId,
    classifier: Box<dyn Classifier>,
    scaler: Option<Box<dyn Scaler>>,
    encoders: HashMap<String, LabelEncoder>,
    /// `None` only for free-form models without declared columns
    schema: Option<FeatureSchema>,
    version: Option<String>,
    fingerprint: Option<String>,
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("model_id", &self.model_id)
            .field("classes", &self.classifier.classes())
            .field("scaler", &self.scaler.is_some())
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("schema_len", &self.schema.as_ref().map(FeatureSchema::len))
            .field("version", &self.version)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl ModelEntry {
    pub fn builder(model_id: ModelId, classifier: impl Classifier + 'static) -> ModelEntryBuilder {
        ModelEntryBuilder {
            model_id,
            classifier: Box::new(classifier),
            scaler: None,
            encoders: HashMap::new(),
            feature_names: None,
            version: None,
            fingerprint: None,
        }
    }

    /// Load and validate the bundle directory `dir` for `model_id`
    ///
    /// The fingerprint covers the manifest followed by every graph it names,
    /// in load order.
    pub fn from_bundle_dir(model_id: ModelId, dir: &Path) -> Result<Self, LoadError> {
        let manifest_bytes = read_file(&dir.join(MANIFEST_FILE))?;
        let manifest = BundleManifest::parse(model_id, &manifest_bytes)?;
        let mut hasher = Sha256::new();
        hasher.update(&manifest_bytes);

        let bytes = read_file(&dir.join(&manifest.classifier))?;
        hasher.update(&bytes);
        let classifier = OnnxClassifier::from_bytes(&bytes, manifest.classes).map_err(|source| {
            LoadError::InvalidComponent {
                component: "classifier".to_string(),
                source,
            }
        })?;
        let mut builder = ModelEntry::builder(model_id, classifier);

        if let Some(file) = &manifest.scaler {
            let bytes = read_file(&dir.join(file))?;
            hasher.update(&bytes);
            let scaler = OnnxScaler::from_bytes(&bytes).map_err(|source| {
                LoadError::InvalidComponent {
                    component: "scaler".to_string(),
                    source,
                }
            })?;
            builder = builder.scaler(scaler);
        }
        for (name, encoder) in manifest.encoders {
            builder = builder.encoder(name, encoder);
        }
        if let Some(names) = manifest.feature_names {
            builder = builder.feature_names(names);
        }
        if let Some(version) = manifest.version {
            builder = builder.version(version);
        }
        builder.fingerprint(format!("{:x}", hasher.finalize())).build()
    }

    pub fn model_id(&self) -> ModelId {
        self.model_id
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn scaler(&self) -> Option<&dyn Scaler> {
        self.scaler.as_deref()
    }

    pub fn encoder(&self, name: &str) -> Option<&LabelEncoder> {
        self.encoders.get(name)
    }

    /// Encoder mapping predicted codes back to labels, for models that have one
    pub fn class_encoder(&self) -> Option<&LabelEncoder> {
        class_encoder_name(self.model_id).and_then(|name| self.encoders.get(name))
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// SHA-256 of the bundle files, hex encoded
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Column layout for `input`
    ///
    /// Fixed for every model with declared columns; otherwise derived from
    /// the input keys.
    pub fn schema_for(&self, input: &Map<String, Value>) -> Cow<'_, FeatureSchema> {
        match &self.schema {
            Some(schema) => Cow::Borrowed(schema),
            None => Cow::Owned(FeatureSchema::from_input_keys(input)),
        }
    }

    pub fn preprocessor(&self) -> Preprocessor<'_> {
        Preprocessor::new(&self.encoders, self.scaler.as_deref())
    }
}

/// Name of the encoder that maps a model's predicted codes to labels
fn class_encoder_name(model_id: ModelId) -> Option<&'static str> {
    match model_id {
        ModelId::DiabetesPrediction => Some(CLASS_ENCODER),
        ModelId::HeartDisease
        | ModelId::MedicalCondition
        | ModelId::CancerPrediction
        | ModelId::KidneyStoneDetection => None,
    }
}

fn requires_scaler(model_id: ModelId) -> bool {
    !matches!(model_id, ModelId::MedicalCondition)
}

fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Assembles a [`ModelEntry`] and checks it is complete and consistent
pub struct ModelEntryBuilder {
    model_id: ModelId,
    classifier: Box<dyn Classifier>,
    scaler: Option<Box<dyn Scaler>>,
    encoders: HashMap<String, LabelEncoder>,
    feature_names: Option<Vec<String>>,
    version: Option<String>,
    fingerprint: Option<String>,
}

impl ModelEntryBuilder {
    pub fn scaler(mut self, scaler: impl Scaler + 'static) -> Self {
        self.scaler = Some(Box::new(scaler));
        self
    }

    pub fn encoder(mut self, name: impl Into<String>, encoder: LabelEncoder) -> Self {
        self.encoders.insert(name.into(), encoder);
        self
    }

    /// Declared column order, used by models without a fixed schema
    pub fn feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn build(self) -> Result<ModelEntry, LoadError> {
        let model_id = self.model_id;

        for (name, encoder) in &self.encoders {
            encoder
                .validate()
                .map_err(|source| LoadError::InvalidComponent {
                    component: format!("'{}' encoder", name),
                    source,
                })?;
        }

        let schema = FeatureSchema::for_model(model_id).or_else(|| {
            self.feature_names
                .as_deref()
                .map(|names| FeatureSchema::from_feature_names(names, &self.encoders))
        });

        // Required components
        if requires_scaler(model_id) && self.scaler.is_none() {
            return Err(LoadError::MissingComponent("scaler".to_string()));
        }
        let mut required: Vec<&str> = Vec::new();
        if let Some(schema) = &schema {
            required.extend(schema.required_encoders());
        }
        if let Some(name) = class_encoder_name(model_id) {
            required.push(name);
        }
        for name in required {
            if !self.encoders.contains_key(name) {
                return Err(LoadError::MissingComponent(format!("'{}' encoder", name)));
            }
        }
        if model_id.prediction_mode() == PredictionMode::BinaryRisk
            && self.classifier.classes().len() != 2
        {
            return Err(LoadError::InvalidComponent {
                component: "classifier".to_string(),
                source: ArtifactError::InvalidParameters(format!(
                    "binary risk model needs exactly two classes, got {:?}",
                    self.classifier.classes()
                )),
            });
        }

        // Declared graph input widths against the column layout, when it is
        // known up front
        if let Some(schema) = &schema {
            if let Some(scaler) = &self.scaler {
                check_width("scaler", schema.len(), scaler.n_features())?;
            }
            if let Some(width) = self.classifier.n_features() {
                check_width("classifier", schema.len(), width)?;
            }
        } else if let (Some(scaler), Some(width)) = (&self.scaler, self.classifier.n_features()) {
            check_width("classifier", scaler.n_features(), width)?;
        }

        Ok(ModelEntry {
            model_id,
            classifier: self.classifier,
            scaler: self.scaler,
            encoders: self.encoders,
            schema,
            version: self.version,
            fingerprint: self.fingerprint,
        })
    }
}

fn check_width(component: &'static str, expected: usize, actual: usize) -> Result<(), LoadError> {
    if expected != actual {
        return Err(LoadError::DimensionMismatch {
            component,
            expected,
            actual,
        });
    }
    Ok(())
}

// ============================================================================
// Bundle format
// ============================================================================

#[derive(Debug, Deserialize)]
struct BundleHeader {
    format_version: u32,
}

/// `bundle.json`: everything about a model except its graphs
#[derive(Debug, Deserialize)]
struct BundleManifest {
    model_id: ModelId,
    #[serde(default)]
    version: Option<String>,
    /// Class label of each probability column, in graph output order
    classes: Vec<ClassLabel>,
    #[serde(default = "default_classifier_file")]
    classifier: String,
    #[serde(default)]
    scaler: Option<String>,
    #[serde(default)]
    encoders: HashMap<String, LabelEncoder>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

fn default_classifier_file() -> String {
    DEFAULT_CLASSIFIER_FILE.to_string()
}

impl BundleManifest {
    fn parse(model_id: ModelId, bytes: &[u8]) -> Result<Self, LoadError> {
        // Version first, so a future layout reports a mismatch rather than a parse error
        let header: BundleHeader = serde_json::from_slice(bytes)?;
        if header.format_version != BUNDLE_FORMAT_VERSION {
            return Err(LoadError::VersionMismatch {
                found: header.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }

        let manifest: BundleManifest = serde_json::from_slice(bytes)?;
        if manifest.model_id != model_id {
            return Err(LoadError::ModelMismatch {
                expected: model_id,
                found: manifest.model_id,
            });
        }
        for file in std::iter::once(&manifest.classifier).chain(manifest.scaler.as_ref()) {
            if !is_plain_relative(file) {
                return Err(LoadError::InvalidManifest(format!(
                    "graph path '{}' must stay inside the bundle directory",
                    file
                )));
            }
        }
        Ok(manifest)
    }
}

fn is_plain_relative(file: &str) -> bool {
    let path = Path::new(file);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Source of model entries, consulted once per model at startup
pub trait ModelLoader {
    fn load(&self, model_id: ModelId) -> Result<ModelEntry, LoadError>;
}

/// Loads `<models_dir>/<model_id>/bundle.json` and the graphs it names
#[derive(Debug, Clone)]
pub struct FsModelLoader {
    models_dir: PathBuf,
}

impl FsModelLoader {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn bundle_dir(&self, model_id: ModelId) -> PathBuf {
        self.models_dir.join(model_id.bundle_dir_name())
    }
}

impl ModelLoader for FsModelLoader {
    fn load(&self, model_id: ModelId) -> Result<ModelEntry, LoadError> {
        ModelEntry::from_bundle_dir(model_id, &self.bundle_dir(model_id))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Load outcome of one model, fixed for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Loaded,
    Unavailable { reason: String },
}

/// Returned by [`ModelRegistry::get`] for a model that did not load
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{model_id} is unavailable: {reason}")]
pub struct ModelUnavailable {
    pub model_id: ModelId,
    pub reason: String,
}

/// Snapshot of one registry slot for status reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStatus {
    pub model_id: ModelId,
    pub availability: Availability,
    pub version: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug)]
enum Slot {
    Loaded(ModelEntry),
    Unavailable(String),
}

/// Immutable table of every known model
#[derive(Debug)]
pub struct ModelRegistry {
    slots: BTreeMap<ModelId, Slot>,
}

impl ModelRegistry {
    /// Load every model through `loader`, logging the outcome of each
    pub fn load(loader: &dyn ModelLoader) -> Self {
        let slots = ModelId::ALL
            .into_iter()
            .map(|model_id| {
                let slot = match loader.load(model_id) {
                    Ok(entry) => {
                        info!(
                            model_id = %model_id,
                            version = entry.version().unwrap_or("unversioned"),
                            sha256 = entry.fingerprint().unwrap_or("-"),
                            "✓ Model loaded"
                        );
                        Slot::Loaded(entry)
                    }
                    Err(e) => {
                        warn!(model_id = %model_id, reason = %e, "Model unavailable");
                        Slot::Unavailable(e.to_string())
                    }
                };
                (model_id, slot)
            })
            .collect();
        Self { slots }
    }

    /// Load every model from bundles in `models_dir`
    pub fn load_from_dir(models_dir: impl Into<PathBuf>) -> Self {
        Self::load(&FsModelLoader::new(models_dir))
    }

    /// Registry holding `entries`; models without an entry are Unavailable
    pub fn from_entries(entries: impl IntoIterator<Item = ModelEntry>) -> Self {
        let mut slots: BTreeMap<ModelId, Slot> = ModelId::ALL
            .into_iter()
            .map(|id| (id, Slot::Unavailable("no bundle provided".to_string())))
            .collect();
        for entry in entries {
            slots.insert(entry.model_id(), Slot::Loaded(entry));
        }
        Self { slots }
    }

    /// Loaded entry for `model_id`
    pub fn get(&self, model_id: ModelId) -> Result<&ModelEntry, ModelUnavailable> {
        match self.slots.get(&model_id) {
            Some(Slot::Loaded(entry)) => Ok(entry),
            Some(Slot::Unavailable(reason)) => Err(ModelUnavailable {
                model_id,
                reason: reason.clone(),
            }),
            None => Err(ModelUnavailable {
                model_id,
                reason: "not registered".to_string(),
            }),
        }
    }

    pub fn availability(&self, model_id: ModelId) -> Availability {
        match self.get(model_id) {
            Ok(_) => Availability::Loaded,
            Err(e) => Availability::Unavailable { reason: e.reason },
        }
    }

    pub fn loaded_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Loaded(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Status of every model, in model order
    pub fn statuses(&self) -> Vec<ModelStatus> {
        self.slots
            .iter()
            .map(|(&model_id, slot)| match slot {
                Slot::Loaded(entry) => ModelStatus {
                    model_id,
                    availability: Availability::Loaded,
                    version: entry.version().map(str::to_string),
                    fingerprint: entry.fingerprint().map(str::to_string),
                },
                Slot::Unavailable(reason) => ModelStatus {
                    model_id,
                    availability: Availability::Unavailable {
                        reason: reason.clone(),
                    },
                    version: None,
                    fingerprint: None,
                },
            })
            .collect()
    }
}
