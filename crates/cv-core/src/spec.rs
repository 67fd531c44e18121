//! Spec compilation boundary

use std::hash::{Hash, Hasher};

use ahash::AHasher;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ChartError;

/// Inputs that feed spec compilation.
///
/// Any change here changes the compiled fingerprint and therefore forces a
/// rebuild of the live view; data-only changes never pass through this
/// struct.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub use_container_width: bool,
    pub theme: String,
    pub selection_mode: Vec<String>,
    /// Surface dimensions, set while fullscreen sizing is in effect
    pub surface_size: Option<(u32, u32)>,
}

/// A compiled spec document plus the fingerprint driving rebuild decisions
#[derive(Clone, Debug)]
pub struct CompiledSpec {
    doc: Value,
    fingerprint: u64,
    inline_data: bool,
}

impl CompiledSpec {
    pub fn doc(&self) -> &Value {
        &self.doc
    }

    /// Stable hash over the compiled document; equal fingerprints mean the
    /// live view can be kept and patched in place
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Whether the raw spec declared its own inline data entry
    pub fn declares_inline_data(&self) -> bool {
        self.inline_data
    }
}

/// Compiles raw declarative specs; deterministic for identical inputs
pub trait SpecCompiler: Send + Sync {
    fn compile(&self, raw: &str, options: &RenderOptions) -> Result<CompiledSpec, ChartError>;
}

/// Minimal reference compiler.
///
/// Parses the raw JSON, enforces the dataset-injection contract and folds
/// the render options into the document so the fingerprint covers every
/// rebuild trigger. Theme post-processing proper is the embedding
/// renderer's concern.
#[derive(Debug, Default)]
pub struct BasicSpecCompiler;

impl SpecCompiler for BasicSpecCompiler {
    fn compile(&self, raw: &str, options: &RenderOptions) -> Result<CompiledSpec, ChartError> {
        let parsed: Value = serde_json::from_str(raw)?;
        let Value::Object(mut doc) = parsed else {
            return Err(ChartError::InvalidSpec(
                "spec must be a JSON object".to_string(),
            ));
        };

        // Datasets are injected through the view, never embedded in the spec.
        if doc.contains_key("datasets") {
            return Err(ChartError::SpecConflict(
                "spec embeds a 'datasets' entry".to_string(),
            ));
        }

        let inline_data = doc.contains_key("data");

        let usermeta = doc
            .entry("usermeta".to_string())
            .or_insert_with(|| json!({}));
        if let Some(meta) = usermeta.as_object_mut() {
            meta.insert("render".to_string(), serde_json::to_value(options)?);
        }

        let doc = Value::Object(doc);
        let fingerprint = fingerprint_of(&doc);
        Ok(CompiledSpec {
            doc,
            fingerprint,
            inline_data,
        })
    }
}

fn fingerprint_of(doc: &Value) -> u64 {
    // serde_json maps are sorted, so the serialization is canonical.
    let mut hasher = AHasher::default();
    doc.to_string().hash(&mut hasher);
    hasher.finish()
}
