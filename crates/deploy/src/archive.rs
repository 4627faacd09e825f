//! Stripped package archives.
//!
//! A client that compiles its own source packages needs the type
//! information of every dependency, but not the dependency's code. The
//! stripped archive keeps exactly that: export data plus the name and
//! blocking flag of each declaration.

use serde::{Deserialize, Serialize};

use crate::compiler::PackageArtifact;
use crate::error::DeployError;

/// Declaration metadata kept in a stripped archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationSummary {
    pub full_name: String,
    pub blocking: bool,
}

/// A package archive without declaration bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrippedArchive {
    pub import_path: String,
    pub name: String,
    pub imports: Vec<String>,
    #[serde(with = "base64_bytes")]
    pub export_data: Vec<u8>,
    pub declarations: Vec<DeclarationSummary>,
    pub minified: bool,
}

impl StrippedArchive {
    pub fn strip(package: &PackageArtifact) -> Self {
        Self {
            import_path: package.import_path.clone(),
            name: package.name.clone(),
            imports: package.imports.clone(),
            export_data: package.export_data.clone(),
            declarations: package
                .declarations
                .iter()
                .map(|d| DeclarationSummary {
                    full_name: d.full_name.clone(),
                    blocking: d.blocking,
                })
                .collect(),
            minified: package.minified,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DeployError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self, DeployError> {
        Ok(serde_json::from_slice(data)?)
    }
}

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
