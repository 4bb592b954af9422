use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::CfdiError;

/// Directory holding the CFDI 4.0 schema family, relative to the working directory.
pub const DEFAULT_SCHEMA_DIR: &str = "XSD/CFD/4";

/// Optional wrapper schema that imports `cfdv40.xsd` together with the stamp schema.
pub const DEFAULT_MAIN_SCHEMA: &str = "schema_cfdi40_con_timbre.xsd";

/// Published CFDI 4.0 schema.
pub const DEFAULT_FALLBACK_SCHEMA: &str = "cfdv40.xsd";

/// Upper bound on schema violations reported per document.
pub const DEFAULT_MAX_REPORTED_ERRORS: usize = 25;

/// Environment variable overriding [`ValidatorConfig::schema_dir`].
pub const ENV_SCHEMA_DIR: &str = "CFDI_XSD_DIR";

/// Environment variable overriding [`ValidatorConfig::main_schema`].
pub const ENV_MAIN_SCHEMA: &str = "CFDI_XSD_MAIN";

/// Settings for the validation pipeline.
///
/// ```
/// use cfdi_check::core::ValidatorConfig;
///
/// let cfg = ValidatorConfig::from_toml_str(r#"
///     schema_dir = "/srv/xsd/cfd/4"
///     max_reported_errors = 10
/// "#).unwrap();
/// assert_eq!(cfg.fallback_schema, "cfdv40.xsd");
/// assert_eq!(cfg.max_reported_errors, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Root of the local schema tree. Imports are resolved only inside it.
    pub schema_dir: PathBuf,
    /// Preferred entry schema, used when it exists.
    pub main_schema: String,
    /// Entry schema used when `main_schema` is absent.
    pub fallback_schema: String,
    /// Maximum number of schema violations attached to a checklist.
    pub max_reported_errors: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
            main_schema: DEFAULT_MAIN_SCHEMA.to_string(),
            fallback_schema: DEFAULT_FALLBACK_SCHEMA.to_string(),
            max_reported_errors: DEFAULT_MAX_REPORTED_ERRORS,
        }
    }
}

impl ValidatorConfig {
    /// Configuration pointing at a specific schema directory, other values default.
    pub fn with_schema_dir(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, CfdiError> {
        let cfg: Self = toml::from_str(s).map_err(|e| CfdiError::Config(e.to_string()))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CfdiError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CfdiError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `CFDI_XSD_DIR` / `CFDI_XSD_MAIN` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env_value(ENV_SCHEMA_DIR) {
            self.schema_dir = PathBuf::from(dir);
        }
        if let Some(main) = env_value(ENV_MAIN_SCHEMA) {
            self.main_schema = main;
        }
        self
    }

    /// Pick the entry schema: the wrapper, then `cfdv40.xsd`, then the first
    /// `.xsd` file (by name) directly inside `schema_dir`.
    pub fn main_schema_path(&self) -> Result<PathBuf, CfdiError> {
        for name in [&self.main_schema, &self.fallback_schema] {
            if name.is_empty() {
                continue;
            }
            let candidate = self.schema_dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        let not_found = || CfdiError::SchemaNotFound {
            dir: self.schema_dir.clone(),
        };
        let entries = std::fs::read_dir(&self.schema_dir).map_err(|_| not_found())?;
        let mut schemas: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("xsd"))
            })
            .collect();
        schemas.sort();
        schemas.into_iter().next().ok_or_else(not_found)
    }

    fn check(&self) -> Result<(), CfdiError> {
        if self.max_reported_errors == 0 {
            return Err(CfdiError::Config(
                "max_reported_errors must be at least 1".into(),
            ));
        }
        if self.schema_dir.as_os_str().is_empty() {
            return Err(CfdiError::Config("schema_dir must not be empty".into()));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
