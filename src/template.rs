//! Template source resolution and staging.
//!
//! Templates are opaque payloads: this module never parses them beyond
//! a substring scan for the serverless transform marker. A local path is
//! checked before any remote call so a typo fails fast, and an optional
//! staging step uploads the body to S3 so large templates can be passed
//! by URL instead of inline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::cfn::types::TemplateLocation;
use crate::error::{Result, TemplateError};
use crate::store::ObjectStore;

/// Marker that flags a template as requiring transform handling.
///
/// Templates carrying a serverless-application transform cannot be
/// processed by the plain create/update API and must go through a
/// change set (or the external CLI).
const TRANSFORM_MARKER: &str = "AWS::Serverless";

/// Where a template comes from, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Local file path.
    Path(PathBuf),
    /// Remote template URL.
    Url(String),
    /// Inline template body.
    Body(String),
}

impl TemplateSource {
    /// Classifies a user-supplied template argument: remote URL by
    /// prefix match, local path otherwise.
    #[must_use]
    pub fn from_input(input: &str) -> Self {
        if input.starts_with("https://") || input.starts_with("http://") {
            Self::Url(input.to_string())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }

    /// Whether the template is already remote.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// Reads the template body.
    ///
    /// Only local paths and inline bodies can be read; a remote URL
    /// returns `None` (the scan that needs the body is carried forward
    /// instead of repeated against a remote resource).
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] if a local path does not
    /// resolve to an existing file, before any API call is made.
    pub fn read_body(&self) -> Result<Option<String>> {
        match self {
            Self::Path(path) => read_template_file(path).map(Some),
            Self::Body(body) => Ok(Some(body.clone())),
            Self::Url(_) => Ok(None),
        }
    }

    /// Resolves the source into the location passed to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NotFound`] for a missing local file.
    pub fn resolve(&self) -> Result<TemplateLocation> {
        match self {
            Self::Path(path) => Ok(TemplateLocation::Body(read_template_file(path)?)),
            Self::Body(body) => Ok(TemplateLocation::Body(body.clone())),
            Self::Url(url) => Ok(TemplateLocation::Url(url.clone())),
        }
    }
}

/// Reads a local template, failing fast when the path does not exist.
fn read_template_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(TemplateError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    std::fs::read_to_string(path).map_err(|e| {
        TemplateError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
        .into()
    })
}

/// Whether a template body declares a serverless transform.
#[must_use]
pub fn contains_transforms(body: &str) -> bool {
    body.contains(TRANSFORM_MARKER)
}

/// Uploads template bodies to a staging bucket.
pub struct TemplateStager {
    /// Object store.
    store: Arc<dyn ObjectStore>,
}

impl TemplateStager {
    /// Creates a stager.
    #[must_use]
    pub const fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Uploads a template body and returns its remote URL.
    ///
    /// The key is `<prefix>/<stack>-<uuid>.template`; the uuid keeps
    /// staged templates from successive reconciles from colliding.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub async fn stage(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        stack_name: &str,
        body: &str,
    ) -> Result<String> {
        let key = staging_key(prefix, stack_name);
        debug!("Staging template for {stack_name} at s3://{bucket}/{key}");

        self.store
            .put_object(bucket, &key, body.as_bytes().to_vec())
            .await?;

        let url = format!("https://{bucket}.s3.amazonaws.com/{key}");
        info!("Template staged: {url}");
        Ok(url)
    }
}

/// Builds the staging key, normalizing the optional prefix.
fn staging_key(prefix: Option<&str>, stack_name: &str) -> String {
    let file = format!("{stack_name}-{}.template", Uuid::new_v4());
    match prefix {
        Some(prefix) if !prefix.is_empty() => {
            format!("{}/{file}", prefix.trim_matches('/'))
        }
        _ => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeObjectStore;
    use std::io::Write;

    #[test]
    fn url_input_is_classified_as_remote() {
        let source = TemplateSource::from_input("https://bucket.s3.amazonaws.com/t.json");
        assert!(source.is_remote());

        let source = TemplateSource::from_input("template.json");
        assert_eq!(source, TemplateSource::Path(PathBuf::from("template.json")));
    }

    #[test]
    fn missing_local_template_fails_fast() {
        let source = TemplateSource::Path(PathBuf::from("/nonexistent/template.json"));
        let err = source.resolve().expect_err("missing file must fail");
        assert!(matches!(
            err,
            crate::error::StackPilotError::Template(TemplateError::NotFound { .. })
        ));
    }

    #[test]
    fn local_template_resolves_to_inline_body() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{\"Resources\": {{}}}}").expect("write");

        let source = TemplateSource::Path(file.path().to_path_buf());
        let location = source.resolve().expect("resolve failed");
        assert_eq!(
            location,
            TemplateLocation::Body(String::from("{\"Resources\": {}}"))
        );
    }

    #[test]
    fn remote_source_has_no_readable_body() {
        let source = TemplateSource::Url(String::from("https://example.com/t.json"));
        assert!(source.read_body().expect("read failed").is_none());
    }

    #[test]
    fn transform_marker_is_detected() {
        let body = r#"{"Transform": "AWS::Serverless-2016-10-31", "Resources": {}}"#;
        assert!(contains_transforms(body));
        assert!(!contains_transforms(r#"{"Resources": {}}"#));
    }

    #[test]
    fn staging_key_normalizes_prefix() {
        let key = staging_key(Some("/templates/"), "app-stack");
        assert!(key.starts_with("templates/app-stack-"));
        assert!(key.ends_with(".template"));

        let key = staging_key(None, "app-stack");
        assert!(key.starts_with("app-stack-"));
    }

    #[tokio::test]
    async fn stage_uploads_and_returns_url() {
        let store = std::sync::Arc::new(FakeObjectStore::new());
        let stager = TemplateStager::new(store.clone());

        let url = stager
            .stage("staging-bucket", Some("templates"), "app-stack", "{}")
            .await
            .expect("stage failed");

        assert!(url.starts_with("https://staging-bucket.s3.amazonaws.com/templates/app-stack-"));
        assert_eq!(store.put_calls().len(), 1);
        assert_eq!(store.put_calls()[0].0, "staging-bucket");
    }
}
