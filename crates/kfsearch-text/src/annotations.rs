//! Per-keyframe annotations produced by the captioning, OCR and detection
//! pipelines, and the detection catalog derived from them.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use kfsearch_core::traits::ObjectLookup;
use kfsearch_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
	pub label: String,
	/// Grounding prompt the detector was run with, when it differs from the label.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub prompt: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeAnnotation {
	pub path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub caption: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ocr: Option<String>,
	#[serde(default)]
	pub objects: Vec<DetectedObject>,
}

impl KeyframeAnnotation {
	/// Labels and prompts as one searchable string.
	pub fn objects_text(&self) -> String {
		let mut parts = Vec::with_capacity(self.objects.len());
		for obj in &self.objects {
			parts.push(obj.label.as_str());
			if let Some(prompt) = obj.prompt.as_deref() {
				parts.push(prompt);
			}
		}
		parts.join(" ")
	}
}

pub fn load_annotations(path: &Path) -> Result<Vec<KeyframeAnnotation>> {
	let bytes = std::fs::read(path).map_err(|e| Error::index_load(path, e))?;
	let annotations: Vec<KeyframeAnnotation> = serde_json::from_slice(&bytes).map_err(|e| Error::index_load(path, e))?;
	if let Some(bad) = annotations.iter().position(|a| a.path.trim().is_empty()) {
		return Err(Error::index_load(path, format!("annotation #{} has an empty path", bad)));
	}
	Ok(annotations)
}

/// Path → lower-cased detected labels.
#[derive(Debug, Clone, Default)]
pub struct DetectionCatalog {
	labels: HashMap<String, Vec<String>>,
}

impl DetectionCatalog {
	pub fn from_annotations(annotations: &[KeyframeAnnotation]) -> Self {
		let mut labels: HashMap<String, Vec<String>> = HashMap::new();
		for a in annotations {
			let entry = labels.entry(a.path.clone()).or_default();
			for obj in &a.objects {
				let label = obj.label.trim().to_lowercase();
				if !label.is_empty() && !entry.contains(&label) {
					entry.push(label);
				}
			}
		}
		Self { labels }
	}

	pub fn load(path: &Path) -> Result<Self> {
		let catalog = Self::from_annotations(&load_annotations(path)?);
		info!(keyframes = catalog.len(), path = %path.display(), "loaded detection catalog");
		Ok(catalog)
	}

	pub fn len(&self) -> usize { self.labels.len() }

	pub fn is_empty(&self) -> bool { self.labels.is_empty() }
}

impl ObjectLookup for DetectionCatalog {
	fn objects_for(&self, path: &str) -> Option<&[String]> {
		self.labels.get(path).map(Vec::as_slice)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_minimal_and_full_records() {
		let json = r#"[
			{"path": "kf/001.jpg"},
			{"path": "kf/002.jpg", "caption": "a boat", "ocr": "HTV9", "objects": [{"label": "Boat", "prompt": "ship", "score": 0.91}]}
		]"#;
		let parsed: Vec<KeyframeAnnotation> = serde_json::from_str(json).unwrap();
		assert!(parsed[0].objects.is_empty());
		assert_eq!(parsed[1].objects_text(), "Boat ship");
	}

	#[test]
	fn catalog_lowercases_and_dedups_labels() {
		let a = KeyframeAnnotation {
			path: "kf/1.jpg".into(),
			caption: None,
			ocr: None,
			objects: vec![
				DetectedObject { label: "Car".into(), prompt: None, score: None },
				DetectedObject { label: "car ".into(), prompt: None, score: Some(0.4) },
			],
		};
		let catalog = DetectionCatalog::from_annotations(&[a]);
		assert_eq!(catalog.objects_for("kf/1.jpg"), Some(&["car".to_string()][..]));
		assert!(catalog.matches_any("kf/1.jpg", &["CAR".into()]));
		assert!(!catalog.matches_any("kf/2.jpg", &["car".into()]));
	}
}
