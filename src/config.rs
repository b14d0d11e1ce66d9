//! JSON configuration: ray-marcher constants and operator manifests.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::registry::OperatorDef;
use crate::types::{IoType, Literal};

/// Constants baked into the fragment shader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RayMarchConfig {
    pub max_distance: f32,
    pub max_iterations: u32,
    pub epsilon: f32,
    pub surface_color: [f32; 3],
    pub sky_color: [f32; 3],
    pub light_direction: [f32; 3],
}

impl Default for RayMarchConfig {
    fn default() -> Self {
        Self {
            max_distance: 256.0,
            max_iterations: 256,
            epsilon: 0.01,
            surface_color: [0.9, 0.9, 0.9],
            sky_color: [0.3, 0.3, 0.3],
            light_direction: [-0.1, 0.6, -0.3],
        }
    }
}

impl RayMarchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            bail!("maxDistance must be a positive number, got {}", self.max_distance);
        }
        if self.max_iterations == 0 {
            bail!("maxIterations must be at least 1");
        }
        // Baked into a GLSL `int` constant.
        if self.max_iterations > i32::MAX as u32 {
            bail!("maxIterations {} does not fit a GLSL int", self.max_iterations);
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            bail!("epsilon must be a positive number, got {}", self.epsilon);
        }
        let vectors = [
            ("surfaceColor", self.surface_color),
            ("skyColor", self.sky_color),
            ("lightDirection", self.light_direction),
        ];
        for (key, v) in vectors {
            if v.iter().any(|c| !c.is_finite()) {
                bail!("{key} must only contain finite numbers");
            }
        }
        if self.light_direction.iter().all(|c| *c == 0.0) {
            bail!("lightDirection must not be the zero vector");
        }
        Ok(())
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<RayMarchConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config json at {}", path.display()))?;
    parse_config(&text).with_context(|| format!("invalid config in {}", path.display()))
}

pub fn parse_config(text: &str) -> Result<RayMarchConfig> {
    let config: RayMarchConfig = serde_json::from_str(text).context("failed to parse config json")?;
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperatorManifest {
    pub operators: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestEntry {
    pub inputs: Vec<IoType>,
    pub output: IoType,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub code_file: Option<PathBuf>,
    #[serde(default)]
    pub defaults: Vec<Option<DefaultValue>>,
}

/// A default literal as written in JSON: a bare number or 2 to 4 numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl DefaultValue {
    fn to_literal(&self) -> Option<Literal> {
        match self {
            DefaultValue::Scalar(x) => Some(Literal::scalar(*x)),
            DefaultValue::Vector(v) if v.len() >= 2 => Literal::from_slice(v),
            DefaultValue::Vector(_) => None,
        }
    }
}

impl OperatorManifest {
    /// Resolve code files relative to `base_dir` and produce registry definitions.
    pub fn into_defs(self, base_dir: &Path) -> Result<Vec<OperatorDef>> {
        self.operators
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| {
                entry
                    .into_def(base_dir)
                    .with_context(|| format!("operator manifest entry {idx}"))
            })
            .collect()
    }
}

impl ManifestEntry {
    fn into_def(self, base_dir: &Path) -> Result<OperatorDef> {
        let code = match (self.code, self.code_file) {
            (Some(code), None) => code,
            (None, Some(file)) => {
                let path = if file.is_absolute() {
                    file
                } else {
                    base_dir.join(file)
                };
                std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read operator code at {}", path.display()))?
            }
            (Some(_), Some(_)) => bail!("`code` and `codeFile` are mutually exclusive"),
            (None, None) => bail!("one of `code` or `codeFile` is required"),
        };

        let defaults = if self.defaults.is_empty() {
            vec![None; self.inputs.len()]
        } else {
            self.defaults
                .iter()
                .enumerate()
                .map(|(i, d)| match d {
                    None => Ok(None),
                    Some(v) => v
                        .to_literal()
                        .map(Some)
                        .ok_or_else(|| anyhow!("default {i} must be a number or 2 to 4 numbers")),
                })
                .collect::<Result<Vec<_>>>()?
        };

        Ok(OperatorDef {
            inputs: self.inputs,
            output: self.output,
            code,
            defaults,
        })
    }
}

pub fn load_operator_manifest(path: impl AsRef<Path>) -> Result<Vec<OperatorDef>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read operator manifest at {}", path.display()))?;
    let manifest: OperatorManifest = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse operator manifest {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.into_defs(base_dir)
}
