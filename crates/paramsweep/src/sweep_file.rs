//! Sweep description files
//!
//! A sweep file is a YAML or JSON mapping. Nested mappings become branches,
//! lists become sweep axes and a mapping whose only key is `variants` (a list
//! of mappings each carrying a `name`) becomes a variant axis.

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, eyre};
use paramsweep_core::{ConfigTree, ParameterOptions, Value};

/// Document syntax of a sweep file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepFormat {
    Json,
    Yaml,
}

impl SweepFormat {
    /// Pick the syntax from the file extension, defaulting to YAML.
    ///
    /// JSON documents are valid YAML, so the fallback still reads them.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SweepFormat::Json,
            _ => SweepFormat::Yaml,
        }
    }
}

/// Parse a sweep document into a [`Value`].
pub fn parse_sweep(content: &str, format: SweepFormat) -> Result<Value> {
    let document: serde_json::Value = match format {
        SweepFormat::Json => serde_json::from_str(content).wrap_err("invalid JSON sweep file")?,
        SweepFormat::Yaml => serde_saphyr::from_str(content).wrap_err("invalid YAML sweep file")?,
    };
    Value::from_json(document).ok_or_else(|| eyre!("sweep files may not contain null values"))
}

/// Read a sweep file into a configuration tree.
///
/// The tree is named `name`, or after the file stem when `name` is `None`.
pub fn load_sweep(path: &Path, name: Option<&str>) -> Result<ConfigTree> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read sweep file {}", path.display()))?;
    let value = parse_sweep(&content, SweepFormat::from_path(path))
        .wrap_err_with(|| format!("failed to parse {}", path.display()))?;

    let name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| eyre!("cannot derive a sweep name from {}", path.display()))?
            .to_string(),
    };

    let tree = ConfigTree::from_value(name, value, ParameterOptions::default())?;
    tracing::debug!(
        name = tree.name(),
        leaves = tree.len(),
        "loaded sweep file {}",
        path.display()
    );
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramsweep_core::ConfigNode;

    const YAML_SWEEP: &str = r#"
dynamics:
  variants:
    - name: ising
      coupling: [0.5, 1.0, 1.5]
    - name: sis
      infection_prob: [0.2, 0.4]
      recovery_prob: 0.1
graph:
  size: [10, 20, 40, 80]
  kind: er
"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SweepFormat::from_path(Path::new("a.json")), SweepFormat::Json);
        assert_eq!(SweepFormat::from_path(Path::new("a.JSON")), SweepFormat::Json);
        assert_eq!(SweepFormat::from_path(Path::new("a.yml")), SweepFormat::Yaml);
        assert_eq!(SweepFormat::from_path(Path::new("sweep")), SweepFormat::Yaml);
    }

    #[test]
    fn test_yaml_sweep_builds_variant_axis() {
        let value = parse_sweep(YAML_SWEEP, SweepFormat::Yaml).unwrap();
        let tree = ConfigTree::from_value("test", value, ParameterOptions::default()).unwrap();

        assert!(matches!(tree.get("dynamics"), Some(ConfigNode::Variants(_))));
        assert_eq!(tree.len(), (3 + 2) * 4);
        let labels: Vec<String> = tree.variants().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["test.ising", "test.sis"]);
        assert_eq!(tree.value("graph.kind"), Some(&Value::from("er")));
    }

    #[test]
    fn test_json_keeps_key_order() {
        let value = parse_sweep(r#"{"b": [1, 2], "a": [3, 4, 5]}"#, SweepFormat::Json).unwrap();
        let tree = ConfigTree::from_value("test", value, ParameterOptions::default()).unwrap();
        assert_eq!(tree.shape(), Some(vec![2, 3]));
    }

    #[test]
    fn test_null_is_rejected() {
        assert!(parse_sweep(r#"{"a": null}"#, SweepFormat::Json).is_err());
    }

    #[test]
    fn test_load_sweep_names_tree_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phase.yaml");
        std::fs::write(&path, "n: [1, 2, 3]\nseed_count: 10\n").unwrap();

        let tree = load_sweep(&path, None).unwrap();
        assert_eq!(tree.name(), "phase");
        assert_eq!(tree.len(), 3);

        let renamed = load_sweep(&path, Some("other")).unwrap();
        assert_eq!(renamed.name(), "other");
    }

    #[test]
    fn test_load_sweep_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_sweep(&dir.path().join("missing.json"), None).unwrap_err();
        assert!(err.to_string().contains("failed to read sweep file"));
    }
}
