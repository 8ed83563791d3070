use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// TOML-backed application configuration loaded from disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub data: DataConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Taxonomy TOML. The bundled taxonomy is used when absent.
    #[serde(default)]
    pub taxonomy: Option<PathBuf>,
    /// Catalogue JSON (array of entries).
    pub catalogue: PathBuf,
}

/// How many picks each selection mode aims for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub primary_picks: usize,
    pub adjacent_picks: usize,
    pub wildcard_adjacent_picks: usize,
    pub care_picks: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            primary_picks: 2,
            adjacent_picks: 1,
            wildcard_adjacent_picks: 2,
            care_picks: 3,
        }
    }
}

impl FileConfig {
    /// Resolve relative data paths against the directory holding the config file.
    pub fn resolve_paths(mut self, config_dir: &Path) -> Self {
        if self.data.catalogue.is_relative() {
            self.data.catalogue = config_dir.join(&self.data.catalogue);
        }
        if let Some(taxonomy) = self.data.taxonomy.as_mut() {
            if taxonomy.is_relative() {
                *taxonomy = config_dir.join(&*taxonomy);
            }
        }
        self
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn selection_defaults_apply_when_section_missing() {
        let config: FileConfig = toml::from_str(
            r#"
            [data]
            catalogue = "catalogue.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.selection, SelectionConfig::default());
        assert!(config.data.taxonomy.is_none());
    }

    #[test]
    fn unknown_root_keys_are_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str(
            r#"
            [data]
            catalogue = "catalogue.json"
            [server]
            port = 3000
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn load_config_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lark.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[data]\ntaxonomy = \"taxonomy.toml\"\ncatalogue = \"catalogue.json\"\n[selection]\ncare_picks = 2"
        )
        .unwrap();

        let config = load_config(&path).unwrap().resolve_paths(dir.path());
        assert_eq!(config.data.catalogue, dir.path().join("catalogue.json"));
        assert_eq!(config.data.taxonomy, Some(dir.path().join("taxonomy.toml")));
        assert_eq!(config.selection.care_picks, 2);
        assert_eq!(config.selection.primary_picks, 2);
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/lark.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
