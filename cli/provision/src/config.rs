//! `provision.toml` project configuration.
//!
//! Every field has a default, so a project without the file behaves as if
//! an empty one were present in the current directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use provision_sync::{Aria2Downloader, Destinations, SyncOptions};

pub const CONFIG_FILE: &str = "provision.toml";

/// Legacy plain-text node list, used when the YAML registry is absent.
const LEGACY_NODES_REGISTRY: &str = "setup/nodes.txt";

/// The top-level configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Where registries live and where assets land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub models_dir: PathBuf,
    pub nodes_dir: PathBuf,
    pub models_registry: PathBuf,
    pub nodes_registry: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            models_dir: PathBuf::from("data/models"),
            nodes_dir: PathBuf::from("data/custom_nodes"),
            models_registry: PathBuf::from("setup/models.yaml"),
            nodes_registry: PathBuf::from("setup/nodes.yaml"),
        }
    }
}

/// Node synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent git operations.
    pub concurrency: usize,
    /// Per-repository clone/pull timeout in seconds. Unset means no limit.
    pub git_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            concurrency: provision_sync::driver::DEFAULT_CONCURRENCY,
            git_timeout_secs: None,
        }
    }
}

/// Downloader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub program: String,
    pub connections: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let downloader = Aria2Downloader::default();
        DownloadConfig {
            program: downloader.program,
            connections: downloader.connections,
        }
    }
}

/// GPU probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            timeout_secs: provision_probe::DEFAULT_PROBE_TIMEOUT.as_secs(),
        }
    }
}

/// Configuration together with the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ProjectConfig,
    pub root: PathBuf,
    /// The file the configuration came from, if any.
    pub source: Option<PathBuf>,
}

impl ProjectConfig {
    /// Search upward from `start_dir` for `provision.toml`, parse and return
    /// it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let config = ProjectConfig::parse(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((config, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl Project {
    /// Discover the project from `cwd`, falling back to defaults rooted there.
    pub fn discover(cwd: &Path) -> Result<Self> {
        Ok(match ProjectConfig::find_and_load(cwd)? {
            Some((config, root)) => {
                tracing::debug!(root = %root.display(), "loaded {CONFIG_FILE}");
                Project {
                    source: Some(root.join(CONFIG_FILE)),
                    config,
                    root,
                }
            }
            None => Project {
                config: ProjectConfig::default(),
                root: cwd.to_path_buf(),
                source: None,
            },
        })
    }

    /// Resolve `path` against the project root unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn models_registry(&self) -> PathBuf {
        self.resolve(&self.config.paths.models_registry)
    }

    /// The node registry, falling back to the legacy text list when the
    /// configured default does not exist but the legacy file does.
    pub fn nodes_registry(&self) -> PathBuf {
        let configured = self.resolve(&self.config.paths.nodes_registry);
        if configured.exists() || self.config.paths.nodes_registry != PathsConfig::default().nodes_registry {
            return configured;
        }
        let legacy = self.resolve(Path::new(LEGACY_NODES_REGISTRY));
        if legacy.is_file() {
            tracing::debug!(path = %legacy.display(), "using legacy node list");
            legacy
        } else {
            configured
        }
    }

    pub fn destinations(&self) -> Destinations {
        Destinations {
            models_dir: self.resolve(&self.config.paths.models_dir),
            nodes_dir: self.resolve(&self.config.paths.nodes_dir),
        }
    }

    /// Engine options, with `jobs` overriding the configured concurrency.
    pub fn sync_options(&self, jobs: Option<usize>) -> SyncOptions {
        SyncOptions {
            concurrency: jobs.unwrap_or(self.config.sync.concurrency).max(1),
            git_timeout: self.config.sync.git_timeout_secs.map(Duration::from_secs),
            downloader: Aria2Downloader::new(
                self.config.download.program.clone(),
                self.config.download.connections,
            ),
            ..SyncOptions::default()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe.timeout_secs.max(1))
    }
}
