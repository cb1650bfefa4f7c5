//! Weight documents for saving and loading networks
//!
//! One document per network instance: the declared architecture followed by
//! every layer in a fixed order. Files ending in `.json` are written as
//! pretty JSON, anything else as bincode.

use std::{fmt, io::Write, path::Path};

use serde::{Deserialize, Serialize};

use super::layer::DenseLayer;
use crate::{config::NetworkKind, error::PersistenceError};

/// Declared shape of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Which network family the document belongs to
    pub kind: NetworkKind,
    /// Observation length
    pub input_size: usize,
    /// Hidden widths (two for feedforward, one for recurrent)
    pub hidden_sizes: Vec<usize>,
    /// Action length
    pub output_size: usize,
    /// Whether critic layers follow the actor layers
    pub has_critic: bool,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            NetworkKind::Feedforward => "feedforward",
            NetworkKind::Recurrent => "recurrent",
        };
        write!(f, "{} {}→{:?}→{}", kind, self.input_size, self.hidden_sizes, self.output_size)?;
        if self.has_critic {
            write!(f, " +critic")?;
        }
        Ok(())
    }
}

/// One stored layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Layer name, e.g. `actor.fc1` or `gate.forget`
    pub name: String,
    /// Input dimension
    pub in_features: usize,
    /// Output dimension
    pub out_features: usize,
    /// Weight matrix (flattened, row-major)
    pub weights: Vec<f32>,
    /// Bias vector
    pub biases: Vec<f32>,
}

impl LayerRecord {
    /// Capture a layer under the given name
    pub fn from_layer(name: &str, layer: &DenseLayer) -> Self {
        Self {
            name: name.to_string(),
            in_features: layer.in_features,
            out_features: layer.out_features,
            weights: layer.weights.clone(),
            biases: layer.biases.clone(),
        }
    }
}

/// Serialized form of a whole network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    /// Declared shape
    pub architecture: Architecture,
    /// Layers in the network's fixed order
    pub layers: Vec<LayerRecord>,
}

/// Expected name and dimensions of one layer
#[derive(Debug, Clone, Copy)]
pub struct LayerSpec {
    /// Layer name stored in the document
    pub name: &'static str,
    /// Input width
    pub in_features: usize,
    /// Output width
    pub out_features: usize,
}

impl NetworkDocument {
    /// Save document; format picked from the file extension
    ///
    /// The bytes go to a temporary file in the target directory which is
    /// renamed into place, so a failed write never leaves a partial file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        let bytes = if is_json(path) {
            serde_json::to_vec_pretty(self)?
        } else {
            bincode::serialize(self)?
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| PersistenceError::Io(e.error))?;
        Ok(())
    }

    /// Load document; format picked from the file extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let document = if is_json(path) {
            serde_json::from_slice(&bytes)?
        } else {
            bincode::deserialize(&bytes)?
        };
        Ok(document)
    }

    /// Validate against the live architecture and extract layers in order
    ///
    /// Nothing is returned unless every layer checks out, so callers can swap
    /// their weights in one step.
    pub fn into_layers(
        self,
        expected: &Architecture,
        specs: &[LayerSpec],
    ) -> Result<Vec<DenseLayer>, PersistenceError> {
        if &self.architecture != expected {
            return Err(PersistenceError::SchemaMismatch {
                expected: expected.to_string(),
                found: self.architecture.to_string(),
            });
        }
        if self.layers.len() != specs.len() {
            return Err(PersistenceError::SchemaMismatch {
                expected: format!("{} ({} layers)", expected, specs.len()),
                found: format!("{} ({} layers)", self.architecture, self.layers.len()),
            });
        }

        self.layers
            .into_iter()
            .zip(specs)
            .map(|(record, spec)| {
                if record.name != spec.name {
                    return Err(PersistenceError::MalformedLayer {
                        layer: record.name,
                        reason: format!("expected layer '{}' at this position", spec.name),
                    });
                }
                if record.in_features != spec.in_features || record.out_features != spec.out_features
                {
                    return Err(PersistenceError::MalformedLayer {
                        reason: format!(
                            "declared {}x{}, expected {}x{}",
                            record.in_features, record.out_features, spec.in_features, spec.out_features
                        ),
                        layer: record.name,
                    });
                }
                let layer = DenseLayer {
                    weights: record.weights,
                    biases: record.biases,
                    in_features: record.in_features,
                    out_features: record.out_features,
                };
                if !layer.is_consistent() {
                    return Err(PersistenceError::MalformedLayer {
                        layer: record.name,
                        reason: "array lengths disagree with dimensions".to_string(),
                    });
                }
                if layer.weights.iter().chain(&layer.biases).any(|v| !v.is_finite()) {
                    return Err(PersistenceError::MalformedLayer {
                        layer: record.name,
                        reason: "non-finite value".to_string(),
                    });
                }
                Ok(layer)
            })
            .collect()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|ext| ext.eq_ignore_ascii_case("json")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn tiny_architecture() -> Architecture {
        Architecture {
            kind: NetworkKind::Feedforward,
            input_size: 2,
            hidden_sizes: vec![2, 2],
            output_size: 1,
            has_critic: false,
        }
    }

    fn tiny_document() -> NetworkDocument {
        let layer = DenseLayer {
            weights: vec![1.0, 0.0, 0.0, 1.0],
            biases: vec![0.0, 0.5],
            in_features: 2,
            out_features: 2,
        };
        NetworkDocument {
            architecture: tiny_architecture(),
            layers: vec![LayerRecord::from_layer("actor.fc1", &layer)],
        }
    }

    const SPECS: [LayerSpec; 1] = [LayerSpec { name: "actor.fc1", in_features: 2, out_features: 2 }];

    #[test]
    fn test_json_and_bincode_files() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let document = tiny_document();

        for name in ["net.json", "net.bin"] {
            let path = dir.path().join(name);
            document.save(&path)?;
            let loaded = NetworkDocument::load(&path)?;
            assert_eq!(loaded, document);
        }
        Ok(())
    }

    #[test]
    fn test_schema_mismatch() {
        let mut expected = tiny_architecture();
        expected.input_size = 3;

        let err = tiny_document().into_layers(&expected, &SPECS).unwrap_err();
        assert!(matches!(err, PersistenceError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_truncated_layer_rejected() {
        let mut document = tiny_document();
        document.layers[0].weights.pop();

        let err = document.into_layers(&tiny_architecture(), &SPECS).unwrap_err();
        assert!(matches!(err, PersistenceError::MalformedLayer { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = NetworkDocument::load("/nonexistent/arena/net.json").unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
