//! Bootstrap configuration.
//!
//! The process environment is read once into a [`BootstrapConfig`] and
//! validated before anything touches the filesystem or network.

use std::env::VarError;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root of the Go workspace; the clone destination is derived from it.
pub const BASE_PATH_VAR: &str = "GOPATH";
/// Owner of the repository to clone (set by Prow).
pub const REPO_OWNER_VAR: &str = "REPO_OWNER";
/// Name of the repository to clone (set by Prow).
pub const REPO_NAME_VAR: &str = "REPO_NAME";
/// Head commit of the pull request under test (presubmit).
pub const PULL_SHA_VAR: &str = "PULL_PULL_SHA";
/// Base branch commit (postsubmit).
pub const BASE_SHA_VAR: &str = "PULL_BASE_SHA";
/// Refs under test, recorded in `started.json`.
pub const PULL_REFS_VAR: &str = "PULL_REFS";
/// Directory receiving `started.json`; nothing is written when unset.
pub const ARTIFACTS_DIR_VAR: &str = "ARTIFACTS_DIR";
/// Optional TOML file overriding [`Layout`] fields.
pub const LAYOUT_FILE_VAR: &str = "E2E_BOOTSTRAP_CONFIG";

/// Every variable the bootstrap reads.
pub const BOOTSTRAP_VARS: &[&str] = &[
    BASE_PATH_VAR,
    REPO_OWNER_VAR,
    REPO_NAME_VAR,
    PULL_SHA_VAR,
    BASE_SHA_VAR,
    PULL_REFS_VAR,
    ARTIFACTS_DIR_VAR,
    LAYOUT_FILE_VAR,
];

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

/// Where the source tree comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutSource {
    /// Code is already mounted at the layout destination.
    PreCloned,
    /// Clone `https://github.com/{owner}/{name}.git` into the layout destination.
    CloneRequest { owner: String, name: String },
}

impl CheckoutSource {
    /// Builds the checkout source from the optional owner/name pair.
    ///
    /// Fails unless both or neither are present.
    pub fn from_pair(owner: Option<String>, name: Option<String>) -> Result<Self> {
        match (owner, name) {
            (Some(owner), Some(name)) => Ok(Self::CloneRequest { owner, name }),
            (None, None) => Ok(Self::PreCloned),
            _ => Err(Error::Config(format!(
                "Either set both environment variables {} and {} or set neither.",
                REPO_OWNER_VAR, REPO_NAME_VAR
            ))),
        }
    }
}

/// Fixed on-disk layout and the commands run against the checkout.
///
/// The destination is `<base>/src/github.com/<owner>/<name>`, matching the Go
/// import path of the project regardless of which fork is cloned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Owner segment of the destination path.
    pub owner: String,
    /// Name segment of the destination path.
    pub name: String,
    /// Dependency install command, run inside the checkout.
    pub install_command: String,
    /// Nested vendor directory removed after install, relative to the checkout.
    pub prune_path: PathBuf,
    /// Program that executes the runner script.
    pub runner_program: String,
    /// Runner script, relative to the checkout.
    pub runner_script: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            owner: "jlewi".to_string(),
            name: "mlkube.io".to_string(),
            install_command: "glide install".to_string(),
            prune_path: PathBuf::from("vendor/k8s.io/apiextensions-apiserver/vendor"),
            runner_program: "python".to_string(),
            runner_script: PathBuf::from("test-infra/runner.py"),
        }
    }
}

impl Layout {
    /// Loads layout overrides from a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parses layout overrides from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::InvalidLayout(e.to_string()))
    }

    /// Directory holding the checkout: `<base>/src/github.com/<owner>`.
    pub fn parent_dir(&self, base: &Path) -> PathBuf {
        base.join("src").join("github.com").join(&self.owner)
    }

    /// The checkout itself: `<base>/src/github.com/<owner>/<name>`.
    pub fn destination(&self, base: &Path) -> PathBuf {
        self.parent_dir(base).join(&self.name)
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('/')
}

impl Validate for Layout {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !is_plain_segment(&self.owner) {
            result.add_error(format!("layout owner '{}' is not a path segment", self.owner));
        }
        if !is_plain_segment(&self.name) {
            result.add_error(format!("layout name '{}' is not a path segment", self.name));
        }

        if self.install_command.trim().is_empty() {
            result.add_error("install_command cannot be empty");
        }
        if self.runner_program.trim().is_empty() {
            result.add_error("runner_program cannot be empty");
        }

        // The prune target must stay inside the checkout
        if self.prune_path.as_os_str().is_empty() {
            result.add_error("prune_path cannot be empty");
        } else if self
            .prune_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            result.add_error(format!(
                "prune_path '{}' must be a relative path inside the checkout",
                self.prune_path.display()
            ));
        }

        if self.runner_script.is_absolute() {
            result.add_warning(format!(
                "runner_script '{}' is absolute and will not be resolved against the checkout",
                self.runner_script.display()
            ));
        }

        result
    }
}

/// Fully resolved bootstrap configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Root under which the checkout lives.
    pub base_path: PathBuf,
    /// Whether to clone, and from where.
    pub source: CheckoutSource,
    /// Presubmit revision.
    pub pull_sha: Option<String>,
    /// Postsubmit revision.
    pub base_sha: Option<String>,
    /// Refs under test, informational.
    pub pull_refs: Option<String>,
    /// Where to write `started.json`.
    pub artifacts_dir: Option<PathBuf>,
    /// Destination layout and commands.
    pub layout: Layout,
}

impl BootstrapConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key))
    }

    /// Reads the configuration through `lookup`, which behaves like
    /// [`std::env::var`].
    ///
    /// Empty values are treated as unset; values that are not valid UTF-8
    /// are a configuration error. The owner/name pair is checked first so an
    /// inconsistent environment fails before anything else.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, VarError>,
    {
        let var = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                Ok(value) if value.is_empty() => Ok(None),
                Ok(value) => Ok(Some(value)),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(raw)) => Err(Error::Config(format!(
                    "{} is not valid UTF-8: '{}'",
                    key,
                    raw.to_string_lossy()
                ))),
            }
        };

        let source = CheckoutSource::from_pair(var(REPO_OWNER_VAR)?, var(REPO_NAME_VAR)?)?;

        let base_path = var(BASE_PATH_VAR)?
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config(format!("{} must be set", BASE_PATH_VAR)))?;

        let layout = match var(LAYOUT_FILE_VAR)? {
            Some(path) => Layout::from_file(Path::new(&path))?,
            None => Layout::default(),
        };

        let config = Self {
            base_path,
            source,
            pull_sha: var(PULL_SHA_VAR)?,
            base_sha: var(BASE_SHA_VAR)?,
            pull_refs: var(PULL_REFS_VAR)?,
            artifacts_dir: var(ARTIFACTS_DIR_VAR)?.map(PathBuf::from),
            layout,
        };

        for warning in config.validate().into_result()? {
            tracing::warn!("{}", warning);
        }

        Ok(config)
    }

    /// The checkout directory for this configuration.
    pub fn destination(&self) -> PathBuf {
        self.layout.destination(&self.base_path)
    }
}

impl Validate for BootstrapConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        result.merge(self.layout.validate());

        if self.base_path.is_relative() {
            result.add_warning(format!(
                "{} '{}' is relative; the checkout path depends on the working directory",
                BASE_PATH_VAR,
                self.base_path.display()
            ));
        }

        // A leading dash would be parsed by git as an option
        for (var, sha) in [(PULL_SHA_VAR, &self.pull_sha), (BASE_SHA_VAR, &self.base_sha)] {
            if let Some(sha) = sha {
                if sha.starts_with('-') || sha.chars().any(char::is_whitespace) {
                    result.add_error(format!("{} '{}' is not a valid revision", var, sha));
                }
            }
        }

        if let CheckoutSource::CloneRequest { owner, name } = &self.source {
            if !is_plain_segment(owner) || !is_plain_segment(name) {
                result.add_error(format!(
                    "{}/{} '{}/{}' does not name a GitHub repository",
                    REPO_OWNER_VAR, REPO_NAME_VAR, owner, name
                ));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> std::result::Result<String, VarError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(VarError::NotPresent)
    }

    #[test]
    fn only_owner_set_is_config_error() {
        let err = BootstrapConfig::from_lookup(lookup(&[("GOPATH", "/go"), ("REPO_OWNER", "acme")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("set both"));
    }

    #[test]
    fn only_name_set_is_config_error() {
        let err =
            BootstrapConfig::from_lookup(lookup(&[("GOPATH", "/go"), ("REPO_NAME", "widgets")]))
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn pair_is_checked_before_base_path() {
        let err = BootstrapConfig::from_lookup(lookup(&[("REPO_NAME", "widgets")])).unwrap_err();
        assert!(err.to_string().contains(REPO_OWNER_VAR));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = BootstrapConfig::from_lookup(lookup(&[
            ("GOPATH", "/go"),
            ("REPO_OWNER", ""),
            ("REPO_NAME", "widgets"),
        ]));
        assert!(config.is_err());

        let config = BootstrapConfig::from_lookup(lookup(&[
            ("GOPATH", "/go"),
            ("REPO_OWNER", ""),
            ("REPO_NAME", ""),
            ("PULL_PULL_SHA", ""),
        ]))
        .unwrap();
        assert_eq!(config.source, CheckoutSource::PreCloned);
        assert!(config.pull_sha.is_none());
    }

    #[test]
    fn both_set_is_clone_request() {
        let config = BootstrapConfig::from_lookup(lookup(&[
            ("GOPATH", "/go"),
            ("REPO_OWNER", "acme"),
            ("REPO_NAME", "widgets"),
            ("PULL_PULL_SHA", "abc123"),
            ("PULL_BASE_SHA", "def456"),
        ]))
        .unwrap();
        assert_eq!(
            config.source,
            CheckoutSource::CloneRequest {
                owner: "acme".to_string(),
                name: "widgets".to_string()
            }
        );
        assert_eq!(config.pull_sha.as_deref(), Some("abc123"));
        assert_eq!(config.base_sha.as_deref(), Some("def456"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_base_path_is_reported_as_such() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let err = BootstrapConfig::from_lookup(|key| match key {
            "GOPATH" => Err(VarError::NotUnicode(OsString::from_vec(vec![b'/', 0xff, 0xfe]))),
            _ => Err(VarError::NotPresent),
        })
        .unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        let msg = err.to_string();
        assert!(msg.contains("GOPATH is not valid UTF-8"), "{msg}");
        assert!(!msg.contains("must be set"));
    }

    #[test]
    fn layout_errors_merge_with_config_errors() {
        let config = BootstrapConfig {
            base_path: PathBuf::from("/go"),
            source: CheckoutSource::PreCloned,
            pull_sha: Some("-x".to_string()),
            base_sha: None,
            pull_refs: None,
            artifacts_dir: None,
            layout: Layout {
                install_command: String::new(),
                ..Default::default()
            },
        };

        let result = config.validate();
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("install_command"));
        assert!(result.errors[1].contains(PULL_SHA_VAR));
    }

    #[test]
    fn missing_base_path_is_config_error() {
        let err = BootstrapConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("GOPATH"));
    }

    #[test]
    fn destination_uses_layout_not_clone_owner() {
        let config = BootstrapConfig::from_lookup(lookup(&[
            ("GOPATH", "/go"),
            ("REPO_OWNER", "acme"),
            ("REPO_NAME", "widgets"),
        ]))
        .unwrap();
        assert_eq!(
            config.destination(),
            PathBuf::from("/go/src/github.com/jlewi/mlkube.io")
        );
    }

    #[test]
    fn revision_with_leading_dash_is_rejected() {
        let err = BootstrapConfig::from_lookup(lookup(&[
            ("GOPATH", "/go"),
            ("REPO_OWNER", "acme"),
            ("REPO_NAME", "widgets"),
            ("PULL_PULL_SHA", "--upload-pack=evil"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(PULL_SHA_VAR));
    }

    #[test]
    fn layout_toml_overrides_are_partial() {
        let layout = Layout::from_toml(
            r#"
owner = "kubeflow"
name = "tf-operator"
install_command = "dep ensure"
"#,
        )
        .unwrap();
        assert_eq!(layout.owner, "kubeflow");
        assert_eq!(layout.name, "tf-operator");
        assert_eq!(layout.install_command, "dep ensure");
        assert_eq!(layout.runner_program, "python");
        assert_eq!(layout.prune_path, Layout::default().prune_path);
    }

    #[test]
    fn layout_toml_rejects_unknown_keys() {
        let err = Layout::from_toml("ownr = \"typo\"").unwrap_err();
        assert!(matches!(err, Error::InvalidLayout(_)));
    }

    #[test]
    fn layout_prune_path_must_stay_inside_checkout() {
        let layout = Layout {
            prune_path: PathBuf::from("../outside"),
            ..Default::default()
        };
        assert!(!layout.validate().is_valid());

        let layout = Layout {
            prune_path: PathBuf::from("/vendor"),
            ..Default::default()
        };
        assert!(!layout.validate().is_valid());
    }

    #[test]
    fn default_layout_is_valid() {
        let result = Layout::default().validate();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn absolute_runner_script_is_a_warning() {
        let layout = Layout {
            runner_script: PathBuf::from("/opt/runner.py"),
            ..Default::default()
        };
        let result = layout.validate();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn validation_result_merges_and_fails_on_errors() {
        let mut result = ValidationResult::default();
        result.add_warning("first");
        let mut other = ValidationResult::default();
        other.add_error("broken");
        result.merge(other);
        assert!(!result.is_valid());
        assert!(matches!(result.into_result(), Err(Error::Config(msg)) if msg == "broken"));
    }
}
