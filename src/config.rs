//! Optional `hshgen.toml` settings.
//!
//! ```toml
//! targets = ["glsl", "hlsl"]
//!
//! [compiler]
//! dxc = "/usr/bin/dxc"
//! args = ["-O3"]
//!
//! [frontend]
//! command = "hsh-frontend"
//! args = []
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::backend::DxcCompiler;
use crate::target::Target;

pub const CONFIG_FILE: &str = "hshgen.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Targets used when none are given on the command line.
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Path of the `dxc` executable; looked up on `PATH` when absent.
    pub dxc: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrontendConfig {
    /// Program that turns a C++ source file into a JSON translation unit.
    pub command: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config '{}': {}", .path.display(), .source)]
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Config {
    pub fn parse(text: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded {}", path.display());
        Ok(config)
    }

    /// An explicit path must exist; otherwise `hshgen.toml` in `dir` is
    /// used when present, else the defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Config::default())
        }
    }

    /// Command-line targets win over the file's list.
    pub fn resolve_targets(&self, cli: &[Target]) -> Vec<Target> {
        if cli.is_empty() {
            self.targets.clone()
        } else {
            cli.to_vec()
        }
    }

    pub fn shader_compiler(&self) -> DxcCompiler {
        let program = self
            .compiler
            .dxc
            .clone()
            .unwrap_or_else(|| PathBuf::from("dxc"));
        DxcCompiler::new(program, self.compiler.args.clone())
    }
}
