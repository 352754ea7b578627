//! Manifest documents and their conversion into composition requests.

use crate::error::ManifestError;
use mixweave_kernel::{CompositionRequest, IntroducedVisibility, MixinRequest, TypeName};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_SCHEMA: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema: u32,
    #[serde(default, rename = "composition")]
    pub compositions: Vec<CompositionEntry>,
}

/// One composed class: a target, its mixins, and required interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionEntry {
    pub target: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default, rename = "mixin")]
    pub mixins: Vec<MixinEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinEntry {
    #[serde(rename = "type")]
    pub mixin_type: String,
    #[serde(default)]
    pub visibility: IntroducedVisibility,
    /// Mixins this one is ordered after.
    #[serde(default)]
    pub after: Vec<String>,
}

const INLINE: &str = "<inline>";

impl Manifest {
    pub fn from_toml_str(text: &str) -> Result<Self, ManifestError> {
        parse_toml(text, INLINE)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ManifestError> {
        parse_json(text, INLINE)
    }

    /// Load a manifest file; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let display = path.display().to_string();
        let parse = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => parse_toml,
            Some("json") => parse_json,
            _ => return Err(ManifestError::UnsupportedFormat { path: display }),
        };
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::ReadFile {
            path: display.clone(),
            source,
        })?;
        parse(&text, &display)
    }

    pub fn requests(&self) -> Vec<CompositionRequest> {
        self.compositions.iter().map(CompositionEntry::request).collect()
    }
}

impl CompositionEntry {
    /// The request as written; ordering and de-duplication happen on
    /// normalization.
    pub fn request(&self) -> CompositionRequest {
        let mut request = CompositionRequest::new(self.target.as_str());
        for mixin in &self.mixins {
            request = request.with(MixinRequest {
                mixin: TypeName::new(mixin.mixin_type.as_str()),
                introduced_visibility: mixin.visibility,
                dependencies: mixin.after.iter().map(|name| TypeName::new(name.as_str())).collect(),
            });
        }
        for interface in &self.interfaces {
            request = request.requires(interface.as_str());
        }
        request
    }
}

fn parse_toml(text: &str, path: &str) -> Result<Manifest, ManifestError> {
    toml::from_str(text).map_err(|source| ManifestError::ParseToml {
        path: path.to_string(),
        source,
    })
}

fn parse_json(text: &str, path: &str) -> Result<Manifest, ManifestError> {
    serde_json::from_str(text).map_err(|source| ManifestError::ParseJson {
        path: path.to_string(),
        source,
    })
}
