// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Pipeline configuration loaded from TOML files or constructed programmatically.
//!
//! Every key is optional; missing keys take the [`Default`] values.
//!
//! # TOML Format
//! ```toml
//! model = "resnet18_v1"
//! classes = 1000
//! image_url = "https://github.com/dmlc/mxnet.js/blob/master/data/cat.png?raw=true"
//! weights_url = "https://example.org/resnet18_v1.safetensors"
//! output_dir = "./out"
//!
//! [files]
//! image = "cat.png"
//! graph = "from_mxnet.json"
//! ```

use crate::PipelineError;
use std::path::{Path, PathBuf};

/// Sample image classified by the pipeline.
pub const DEFAULT_IMAGE_URL: &str =
    "https://github.com/dmlc/mxnet.js/blob/master/data/cat.png?raw=true";

/// ImageNet class index → human-readable label, as a Python dict literal.
pub const DEFAULT_SYNSET_URL: &str = concat!(
    "https://gist.githubusercontent.com/zhreshold/",
    "4d0b62f3d01426887599d4f7ede23ee5/raw/",
    "596b27d23537e5a1b5751d2b0481ef172f58b539/",
    "imagenet1000_clsid_to_human.txt"
);

/// File names of the downloaded assets and written artifacts.
///
/// All names are resolved against [`PipelineConfig::output_dir`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub image: String,
    pub synset: String,
    pub weights: String,
    pub params: String,
    pub graph: String,
    pub input: String,
    pub library: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            image: "cat.png".into(),
            synset: "synset.txt".into(),
            weights: "weights.safetensors".into(),
            params: "from_mxnet.params".into(),
            graph: "from_mxnet.json".into(),
            input: "cat.bin".into(),
            library: "from_mxnet.so".into(),
        }
    }
}

/// Configuration for one pipeline run.
///
/// The build target is deliberately absent: it is resolved from the command
/// line and passed to [`crate::Pipeline::run`] alongside this struct.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model zoo name.
    pub model: String,
    /// Number of output classes.
    pub classes: usize,
    /// SafeTensors file with pretrained weights. When absent the model keeps
    /// its seeded initialisation.
    pub weights_url: Option<String>,
    pub image_url: String,
    pub synset_url: String,
    /// Directory receiving downloads and artifacts.
    pub output_dir: PathBuf,
    pub files: ArtifactNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "resnet18_v1".into(),
            classes: 1000,
            weights_url: None,
            image_url: DEFAULT_IMAGE_URL.into(),
            synset_url: DEFAULT_SYNSET_URL.into(),
            output_dir: PathBuf::from("."),
            files: ArtifactNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| PipelineError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("TOML serialise error: {e}")))
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.classes == 0 {
            return Err(PipelineError::Config("classes must be at least 1".into()));
        }
        let names = &self.files;
        for (key, name) in [
            ("image", &names.image),
            ("synset", &names.synset),
            ("weights", &names.weights),
            ("params", &names.params),
            ("graph", &names.graph),
            ("input", &names.input),
            ("library", &names.library),
        ] {
            if name.is_empty() {
                return Err(PipelineError::Config(format!("files.{key} is empty")));
            }
        }
        Ok(())
    }

    /// `output_dir` joined with `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = PipelineConfig::default();
        assert_eq!(c.model, "resnet18_v1");
        assert_eq!(c.classes, 1000);
        assert!(c.weights_url.is_none());
        assert_eq!(c.path(&c.files.library), PathBuf::from("./from_mxnet.so"));
        assert_eq!(c.files.input, "cat.bin");
        assert!(c.synset_url.ends_with("imagenet1000_clsid_to_human.txt"));
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
model = "resnet34_v1"
output_dir = "/tmp/deploy"

[files]
graph = "deploy.json"
"#;
        let c = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(c.model, "resnet34_v1");
        assert_eq!(c.output_dir, PathBuf::from("/tmp/deploy"));
        assert_eq!(c.files.graph, "deploy.json");
        assert_eq!(c.files.params, "from_mxnet.params");
        assert_eq!(c.image_url, DEFAULT_IMAGE_URL);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = PipelineConfig {
            weights_url: Some("https://example.org/w.safetensors".into()),
            ..Default::default()
        };
        let back = PipelineConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(PipelineConfig::from_toml("classes = 0").is_err());
        assert!(PipelineConfig::from_toml("[files]\nlibrary = \"\"").is_err());
        assert!(PipelineConfig::from_toml("model = [").is_err());
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            PipelineConfig::from_file(Path::new("/nonexistent/pipeline.toml")),
            Err(PipelineError::Config(_))
        ));
    }
}
