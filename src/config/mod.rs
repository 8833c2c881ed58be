use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::layout::LayoutConfig;

pub const PROJECT_CONFIG_FILE: &str = ".rapport.project.yml";
pub const DEFAULT_CONTACTS_FILE: &str = "contacts.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverChoice {
    Disabled,
    Lexical,
    Command(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub contacts: String,
    pub resolver: ResolverChoice,
    pub layout: LayoutConfig,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            contacts: DEFAULT_CONTACTS_FILE.to_string(),
            resolver: ResolverChoice::Lexical,
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    contacts: Option<String>,
    #[serde(default)]
    resolver: Option<RawResolver>,
    #[serde(default)]
    layout: Option<RawLayout>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResolver {
    kind: String,
    #[serde(default)]
    command: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayout {
    width: Option<f32>,
    height: Option<f32>,
    iterations: Option<usize>,
    link_distance: Option<f32>,
    collision_radius: Option<f32>,
}

impl RawResolver {
    fn into_choice(self) -> Result<ResolverChoice, ConfigError> {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "disabled" => Ok(ResolverChoice::Disabled),
            "lexical" => Ok(ResolverChoice::Lexical),
            "command" => {
                if self.command.is_empty() {
                    Err(ConfigError::MissingResolverCommand)
                } else {
                    Ok(ResolverChoice::Command(self.command))
                }
            }
            _ => Err(ConfigError::InvalidResolver(self.kind)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown resolver kind `{0}`")]
    InvalidResolver(String),
    #[error("resolver kind `command` needs a non-empty `command` list")]
    MissingResolverCommand,
    #[error("layout.{0} must be positive")]
    InvalidLayout(&'static str),
}

#[derive(Debug, Default)]
struct ConfigLayer {
    contacts: Option<String>,
    resolver: Option<ResolverChoice>,
    layout: RawLayout,
}

/// Merges the user config, the nearest project config above `cwd`, and the
/// workspace config, in that order. Later layers win per setting.
pub fn load_effective_config(
    cwd: &Path,
    workspace_config: Option<&Path>,
    user_config: Option<&Path>,
) -> Result<EffectiveConfig, ConfigError> {
    let mut merged = EffectiveConfig::default();

    if let Some(path) = user_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?)?;
    }

    if let Some(path) = find_nearest_project_config(cwd) {
        merge_layer(&mut merged, load_config_layer(&path)?)?;
    }

    if let Some(path) = workspace_config.filter(|path| path.exists()) {
        merge_layer(&mut merged, load_config_layer(path)?)?;
    }

    Ok(merged)
}

pub fn find_nearest_project_config(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(PROJECT_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn merge_layer(merged: &mut EffectiveConfig, layer: ConfigLayer) -> Result<(), ConfigError> {
    if let Some(contacts) = layer.contacts {
        merged.contacts = contacts;
    }
    if let Some(resolver) = layer.resolver {
        merged.resolver = resolver;
    }

    let layout = &mut merged.layout;
    if let Some(width) = layer.layout.width {
        layout.width = positive(width, "width")?;
    }
    if let Some(height) = layer.layout.height {
        layout.height = positive(height, "height")?;
    }
    if let Some(iterations) = layer.layout.iterations {
        if iterations == 0 {
            return Err(ConfigError::InvalidLayout("iterations"));
        }
        layout.iterations = iterations;
    }
    if let Some(distance) = layer.layout.link_distance {
        layout.link_distance = positive(distance, "link_distance")?;
    }
    if let Some(radius) = layer.layout.collision_radius {
        layout.collision_radius = positive(radius, "collision_radius")?;
    }
    Ok(())
}

fn positive(value: f32, field: &'static str) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidLayout(field))
    }
}

fn load_config_layer(path: &Path) -> Result<ConfigLayer, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_layer(&content)
}

fn parse_config_layer(content: &str) -> Result<ConfigLayer, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ConfigLayer::default());
    }
    let raw: RawConfig = serde_yaml::from_str(content)?;
    Ok(ConfigLayer {
        contacts: raw.contacts,
        resolver: raw.resolver.map(RawResolver::into_choice).transpose()?,
        layout: raw.layout.unwrap_or_default(),
    })
}

pub fn load_config_file(path: &Path) -> Result<EffectiveConfig, ConfigError> {
    let mut config = EffectiveConfig::default();
    merge_layer(&mut config, load_config_layer(path)?)?;
    Ok(config)
}

pub fn default_config_yaml() -> String {
    r#"contacts: contacts.yml
resolver:
  kind: lexical
layout:
  width: 1000
  height: 800
  iterations: 300
"#
    .to_string()
}

pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Absolute location of the contact snapshot; relative paths are taken from
/// the working directory.
pub fn resolve_contacts_path(config: &EffectiveConfig, cwd: &Path, home: &Path) -> PathBuf {
    let expanded = expand_tilde(config.contacts.trim(), home);
    if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    }
}
