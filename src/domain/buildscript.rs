//! Static build-tool configuration: plugin coordinates and repositories.
//!
//! These are consumed by an external resolver; nothing here resolves or
//! downloads anything.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::DomainError;

static COORDINATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_.\-]+):([A-Za-z0-9_.\-]+):([A-Za-z0-9_.+\-]+)$").expect("static regex")
});

/// A `group:artifact:version` plugin dependency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PluginDependency {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl FromStr for PluginDependency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = COORDINATE
            .captures(s.trim())
            .ok_or_else(|| DomainError::InvalidCoordinate(s.to_string()))?;
        Ok(Self {
            group: caps[1].to_string(),
            artifact: caps[2].to_string(),
            version: caps[3].to_string(),
        })
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Package repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repository {
    Google,
    MavenCentral,
    GradlePluginPortal,
    MavenLocal,
    Maven { url: String },
}

impl FromStr for Repository {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "google" => Ok(Self::Google),
            "mavenCentral" => Ok(Self::MavenCentral),
            "gradlePluginPortal" => Ok(Self::GradlePluginPortal),
            "mavenLocal" => Ok(Self::MavenLocal),
            url if url.starts_with("https://") || url.starts_with("http://") || url.starts_with("file://") => {
                Ok(Self::Maven {
                    url: url.to_string(),
                })
            }
            _ => Err(DomainError::InvalidRepository(s.to_string())),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
            Self::MavenCentral => write!(f, "mavenCentral"),
            Self::GradlePluginPortal => write!(f, "gradlePluginPortal"),
            Self::MavenLocal => write!(f, "mavenLocal"),
            Self::Maven { url } => write!(f, "maven({url})"),
        }
    }
}

/// Build-tool dependencies plus the repositories shared by all modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildScript {
    /// Repositories used to resolve `plugins`
    pub plugin_repositories: Vec<Repository>,
    /// Build-tool classpath
    pub plugins: Vec<PluginDependency>,
    /// Repositories every module resolves its own dependencies from
    pub repositories: Vec<Repository>,
}

impl BuildScript {
    pub fn parse(
        plugin_repositories: &[String],
        plugins: &[String],
        repositories: &[String],
    ) -> Result<Self, DomainError> {
        Ok(Self {
            plugin_repositories: parse_all(plugin_repositories)?,
            plugins: parse_all(plugins)?,
            repositories: parse_all(repositories)?,
        })
    }
}

fn parse_all<T: FromStr<Err = DomainError>>(items: &[String]) -> Result<Vec<T>, DomainError> {
    items.iter().map(|s| s.parse()).collect()
}
