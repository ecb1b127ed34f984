//! Stack manifest loading.
//!
//! A YAML manifest can supply the stack name, template, parameters, and
//! upsert options for `up -f`, so repeated deploys do not re-type the
//! whole command line. Environment variables are loaded from `.env`
//! before the CLI resolves profile and region.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::cfn::types::Parameter;
use crate::error::{ConfigError, Result};
use crate::reconciler::UpsertOptions;

/// A declarative stack manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackManifest {
    /// Stack name.
    pub stack: String,
    /// Template path or URL.
    pub template: String,
    /// Stack parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Create a preview change set before applying.
    #[serde(default)]
    pub review: bool,
    /// Staging bucket for local templates.
    #[serde(default)]
    pub s3_bucket: Option<String>,
    /// Key prefix for staged templates.
    #[serde(default)]
    pub s3_prefix: Option<String>,
    /// Whether the template carries transforms; omitted means inferred.
    #[serde(default)]
    pub contains_transforms: Option<bool>,
}

impl StackManifest {
    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or does not parse.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading stack manifest from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        Self::parse_yaml(&content)
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(content: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
            }
        })?;

        debug!("Parsed manifest for stack: {}", manifest.stack);
        Ok(manifest)
    }

    /// The manifest's parameters as provider parameters.
    #[must_use]
    pub fn parameters(&self) -> Vec<Parameter> {
        self.parameters
            .iter()
            .map(|(key, value)| Parameter::new(key, value))
            .collect()
    }

    /// The manifest's upsert options.
    #[must_use]
    pub fn options(&self) -> UpsertOptions {
        UpsertOptions {
            review: self.review,
            s3_bucket: self.s3_bucket.clone(),
            s3_prefix: self.s3_prefix.clone(),
            contains_transforms: self.contains_transforms,
        }
    }
}

/// Parses a `KEY=VALUE` command-line parameter.
///
/// # Errors
///
/// Returns an error if the input has no `=` or an empty key.
pub fn parse_parameter(input: &str) -> Result<Parameter> {
    let (key, value) = input.split_once('=').ok_or_else(|| {
        ConfigError::invalid(format!("expected KEY=VALUE, got '{input}'"))
    })?;

    if key.is_empty() {
        return Err(ConfigError::invalid(format!("empty parameter key in '{input}'")).into());
    }

    Ok(Parameter::new(key, value))
}

/// Loads environment variables from a `.env` file, if one exists.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from: {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MANIFEST: &str = r"
stack: app-stack
template: template.json
parameters:
  Stage: prod
  Memory: '512'
review: true
s3_bucket: staging-bucket
";

    #[test]
    fn parses_a_full_manifest() {
        let manifest = StackManifest::parse_yaml(MANIFEST).expect("parse failed");

        assert_eq!(manifest.stack, "app-stack");
        assert_eq!(manifest.template, "template.json");
        assert!(manifest.review);
        assert_eq!(manifest.s3_bucket.as_deref(), Some("staging-bucket"));
        assert_eq!(manifest.contains_transforms, None);

        let params = manifest.parameters();
        assert_eq!(params.len(), 2);
        assert!(params.contains(&Parameter::new("Stage", "prod")));
    }

    #[test]
    fn defaults_are_applied_for_omitted_fields() {
        let manifest =
            StackManifest::parse_yaml("stack: s\ntemplate: t.json\n").expect("parse failed");

        assert!(!manifest.review);
        assert!(manifest.parameters.is_empty());
        assert!(manifest.options().s3_bucket.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StackManifest::parse_yaml("stack: s\ntemplate: t\nbogus: 1\n")
            .expect_err("unknown field must fail");
        assert!(matches!(
            err,
            crate::error::StackPilotError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn missing_manifest_file_is_an_error() {
        let err = StackManifest::load_file("/missing/manifest.yaml")
            .expect_err("missing file must fail");
        assert!(matches!(
            err,
            crate::error::StackPilotError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn loads_a_manifest_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{MANIFEST}").expect("write");

        let manifest = StackManifest::load_file(file.path()).expect("load failed");
        assert_eq!(manifest.stack, "app-stack");
    }

    #[test]
    fn parses_key_value_parameters() {
        let param = parse_parameter("Stage=prod").expect("parse failed");
        assert_eq!(param, Parameter::new("Stage", "prod"));

        // Values may themselves contain '='.
        let param = parse_parameter("Token=a=b").expect("parse failed");
        assert_eq!(param.value, "a=b");
    }

    #[test]
    fn rejects_malformed_parameters() {
        assert!(parse_parameter("no-equals").is_err());
        assert!(parse_parameter("=value").is_err());
    }
}
