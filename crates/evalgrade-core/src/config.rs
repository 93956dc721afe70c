//! Course configuration loaded from TOML.
//!
//! A configuration file names the course and its type, carries the saved
//! part weights of each CA component and may override entries of the
//! built-in scale registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Component, CourseType};
use crate::scale::{ComponentScale, ScaleRegistry};
use crate::weights::WeightConfig;

/// Environment variable that overrides the configured course type.
pub const COURSE_TYPE_ENV: &str = "EVALGRADE_COURSE_TYPE";

/// Intermediate TOML structure for parsing configuration files.
#[derive(Debug, Deserialize)]
struct TomlConfigFile {
    course: TomlCourse,
    #[serde(default)]
    weights: BTreeMap<String, WeightConfig>,
    #[serde(default)]
    scales: Vec<TomlScale>,
    #[serde(default)]
    totals: BTreeMap<String, f64>,
    #[serde(default)]
    flush: TomlFlush,
}

#[derive(Debug, Deserialize)]
struct TomlCourse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    course_type: String,
    #[serde(default = "default_academic_year")]
    academic_year: String,
}

fn default_academic_year() -> String {
    "current".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlScale {
    course_type: String,
    component: String,
    max_marks: f64,
    passing_marks: f64,
    #[serde(default)]
    conversion_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TomlFlush {
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
}

impl Default for TomlFlush {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1500
}

/// Everything the engine needs to score one course.
#[derive(Debug, Clone)]
pub struct CourseConfig {
    pub course_id: String,
    pub name: String,
    pub course_type: CourseType,
    pub academic_year: String,
    /// Saved part weights per CA component.
    pub weights: BTreeMap<Component, WeightConfig>,
    pub registry: ScaleRegistry,
    /// Quiet period before pending score changes are written.
    pub debounce: Duration,
}

impl CourseConfig {
    /// A course using the built-in registry and no configured weights.
    pub fn new(course_id: impl Into<String>, course_type: CourseType) -> Self {
        Self {
            course_id: course_id.into(),
            name: String::new(),
            course_type,
            academic_year: default_academic_year(),
            weights: BTreeMap::new(),
            registry: ScaleRegistry::builtin(),
            debounce: Duration::from_millis(default_debounce_ms()),
        }
    }

    pub fn with_academic_year(mut self, academic_year: impl Into<String>) -> Self {
        self.academic_year = academic_year.into();
        self
    }

    pub fn with_weights(mut self, component: Component, config: WeightConfig) -> Self {
        self.weights.insert(component, config);
        self
    }
}

/// Parse a single TOML configuration file.
pub fn parse_config(path: &Path) -> Result<CourseConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    parse_config_str(&content, path)
}

/// Parse a TOML string into a `CourseConfig` (useful for testing).
pub fn parse_config_str(content: &str, source_path: &Path) -> Result<CourseConfig> {
    let parsed: TomlConfigFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let course_type: CourseType = parsed.course.course_type.parse()?;

    let weights = parsed
        .weights
        .into_iter()
        .map(|(name, config)| Ok((name.parse::<Component>()?, config)))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let mut registry = ScaleRegistry::builtin();
    for scale in parsed.scales {
        let override_type: CourseType = scale.course_type.parse()?;
        let component: Component = scale.component.parse()?;
        let mut entry = ComponentScale::new(component, scale.max_marks, scale.passing_marks);
        entry.conversion_factor = scale.conversion_factor;
        registry = registry
            .with_override(override_type, entry)
            .with_context(|| format!("invalid [[scales]] entry in {}", source_path.display()))?;
    }
    for (name, marks) in parsed.totals {
        registry = registry.with_total_passing(name.parse()?, marks);
    }

    Ok(CourseConfig {
        course_id: parsed.course.id,
        name: parsed.course.name,
        course_type,
        academic_year: parsed.course.academic_year,
        weights,
        registry,
        debounce: Duration::from_millis(parsed.flush.debounce_ms),
    })
}

/// Load the configuration from an explicit path, or search the default
/// locations.
///
/// Search order:
/// 1. `evalgrade.toml` in the current directory
/// 2. `~/.config/evalgrade/config.toml`
///
/// `EVALGRADE_COURSE_TYPE` overrides the course type of whatever was loaded.
pub fn load_config_from(path: Option<&Path>) -> Result<CourseConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            p.to_path_buf()
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("evalgrade.toml");
        let global = dirs_path().map(|home| home.join("config.toml"));
        match global {
            _ if local.exists() => local,
            Some(global) if global.exists() => global,
            _ => anyhow::bail!("no evalgrade.toml found; run `evalgrade init` or pass --config"),
        }
    };

    let mut config = parse_config(&config_path)?;

    if let Ok(value) = std::env::var(COURSE_TYPE_ENV) {
        let course_type: CourseType = value
            .parse()
            .with_context(|| format!("invalid {COURSE_TYPE_ENV}"))?;
        tracing::info!(%course_type, "course type overridden from environment");
        config.course_type = course_type;
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("evalgrade"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A problem found while validating a configuration.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// The component concerned (if applicable).
    pub component: Option<Component>,
    pub message: String,
}

/// Validate a configuration for common issues.
///
/// Over-allocated or negative weights are errors. Unconfigured CA
/// components, weights for components the course does not have and missing
/// conversion factors are warnings. Under-allocated weights are fine.
pub fn validate_config(config: &CourseConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let scheme = config.registry.evaluation_scheme(config.course_type);

    if !config.registry.knows(config.course_type) {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            component: None,
            message: format!(
                "no scales registered for {}, fallback scales will be used",
                config.course_type
            ),
        });
    }

    for (component, weights) in &config.weights {
        if !scheme.supports(*component) || !component.is_ca() {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                component: Some(*component),
                message: format!(
                    "part weights configured for {component}, which {} courses do not use",
                    config.course_type
                ),
            });
            continue;
        }
        if let Err(e) = weights.parts.validate() {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                component: Some(*component),
                message: e.to_string(),
            });
        }
    }

    for component in scheme.ca_components() {
        let configured = config
            .weights
            .get(&component)
            .is_some_and(|w| w.configured);
        if !configured {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                component: Some(component),
                message: "part weights not configured; score entry is blocked".into(),
            });
        }
    }

    for gap in config_gaps(config) {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            component: None,
            message: gap,
        });
    }

    issues
}

/// CA components whose scale has no conversion factor and therefore score
/// with the fallback factor.
pub fn config_gaps(config: &CourseConfig) -> Vec<String> {
    let scheme = config.registry.evaluation_scheme(config.course_type);
    scheme
        .ca_components()
        .filter(|c| {
            config
                .registry
                .component_scale(config.course_type, *c)
                .conversion_factor
                .is_none()
        })
        .map(|c| {
            format!(
                "{c} has no conversion factor for {} courses; the fallback factor is used",
                config.course_type
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Question;

    const VALID_TOML: &str = r#"
[course]
id = "CS201"
name = "Data Structures"
type = "UG-Integrated"
academic_year = "2024-25"

[weights.CA1]
configured = true

[weights.CA1.parts]
Ia = 2.5
Ib = 2.5
Ic = 2.5
Id = 2.5
IIa = 5
IIb = 5

[weights.CA2]
configured = false

[[scales]]
course_type = "UG-Integrated"
component = "LAB"
max_marks = 40
passing_marks = 20

[totals]
"UG-Integrated" = 45

[flush]
debounce_ms = 250
"#;

    #[test]
    fn parse_valid_toml() {
        let config = parse_config_str(VALID_TOML, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(config.course_id, "CS201");
        assert_eq!(config.course_type, CourseType::UgIntegrated);
        assert_eq!(config.academic_year, "2024-25");
        assert_eq!(config.debounce, Duration::from_millis(250));

        let ca1 = &config.weights[&Component::Ca1];
        assert!(ca1.configured);
        assert_eq!(ca1.parts.question_total(Question::II), 10.0);
        assert_eq!(ca1.parts.total(), 20.0);
        assert!(!config.weights[&Component::Ca2].configured);

        let lab = config
            .registry
            .component_scale(CourseType::UgIntegrated, Component::Lab);
        assert_eq!(lab.max_marks, 40.0);
        assert_eq!(
            config
                .registry
                .course_total_passing_marks(CourseType::UgIntegrated),
            45.0
        );
    }

    #[test]
    fn parse_minimal_uses_defaults() {
        let toml = r#"
[course]
id = "MA101"
type = "pg"
"#;
        let config = parse_config_str(toml, &PathBuf::from("test.toml")).unwrap();
        assert_eq!(config.course_type, CourseType::Pg);
        assert_eq!(config.academic_year, "current");
        assert!(config.weights.is_empty());
        assert_eq!(config.debounce, Duration::from_millis(1500));
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let bad_type = "[course]\nid = \"X\"\ntype = \"MBA\"\n";
        assert!(parse_config_str(bad_type, &PathBuf::from("t.toml")).is_err());

        let bad_component = "[course]\nid = \"X\"\ntype = \"UG\"\n[weights.QUIZ]\nconfigured = true\n";
        assert!(parse_config_str(bad_component, &PathBuf::from("t.toml")).is_err());

        let bad_part = "[course]\nid = \"X\"\ntype = \"UG\"\n[weights.CA1.parts]\nVIa = 1\n";
        assert!(parse_config_str(bad_part, &PathBuf::from("t.toml")).is_err());
    }

    #[test]
    fn parse_rejects_passing_above_max() {
        let toml = r#"
[course]
id = "X"
type = "UG"

[[scales]]
course_type = "UG"
component = "ASSIGNMENT"
max_marks = 10
passing_marks = 11
"#;
        let err = parse_config_str(toml, &PathBuf::from("t.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("passing marks"));
    }

    #[test]
    fn parse_malformed_toml() {
        let bad = "this is not [valid toml }{";
        assert!(parse_config_str(bad, &PathBuf::from("bad.toml")).is_err());
    }

    #[test]
    fn validate_flags_over_allocation_and_unconfigured() {
        let mut config = parse_config_str(VALID_TOML, &PathBuf::from("t.toml")).unwrap();
        let mut heavy = config.weights[&Component::Ca1].parts;
        heavy.distribute_evenly(Question::V, 40.0);
        config.weights.get_mut(&Component::Ca1).unwrap().parts = heavy;

        let issues = validate_config(&config);
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("exceeds")));
        assert!(issues
            .iter()
            .any(|i| i.component == Some(Component::Ca2) && i.message.contains("not configured")));
        assert!(issues
            .iter()
            .any(|i| i.component == Some(Component::Ca3) && i.message.contains("not configured")));
    }

    #[test]
    fn validate_is_silent_on_under_allocation() {
        let config = parse_config_str(VALID_TOML, &PathBuf::from("t.toml")).unwrap();
        let issues = validate_config(&config);
        assert!(!issues
            .iter()
            .any(|i| i.component == Some(Component::Ca1)));
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn validate_warns_on_weights_for_missing_component() {
        let config = CourseConfig::new("LAB1", CourseType::UgLabOnly)
            .with_weights(Component::Ca1, WeightConfig::default());
        let issues = validate_config(&config);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("do not use"));
    }

    #[test]
    fn missing_conversion_factor_is_a_config_gap() {
        let mut config = CourseConfig::new("X", CourseType::Ug);
        config.registry = config
            .registry
            .with_override(CourseType::Ug, ComponentScale::new(Component::Ca3, 25.0, 10.0))
            .unwrap();
        let gaps = config_gaps(&config);
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].starts_with("CA3"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evalgrade.toml");
        std::fs::write(&path, VALID_TOML).unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.course_id, "CS201");

        let missing = dir.path().join("missing.toml");
        assert!(load_config_from(Some(&missing)).is_err());
    }
}
