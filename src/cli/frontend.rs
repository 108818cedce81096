//! Getting a translation unit: read a serialized JSON tree directly, or run
//! the configured front-end command and parse its stdout.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use hshgen::ast::TranslationUnit;
use hshgen::config::FrontendConfig;

/// Defines that only steer profiling builds of the runtime.
const DROPPED_DEFINE: &str = "HSH_PROFILE_MODE";

#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error("cannot read '{}': {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("'{}' is not a JSON translation unit: {}", .path.display(), .source)]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("no front end configured for '{}'; set [frontend] command in hshgen.toml or pass a .json translation unit", .0.display())]
    NotConfigured(PathBuf),
    #[error("failed to run front end `{}`: {}", .program.display(), .source)]
    Spawn { program: PathBuf, source: io::Error },
    #[error("front end failed on '{}' ({}):\n{}", .path.display(), .status, .stderr)]
    Failed { path: PathBuf, status: String, stderr: String },
}

/// Front-end arguments: configured args, then includes and surviving defines.
pub fn arguments(
    config: &FrontendConfig,
    includes: &[PathBuf],
    defines: &[String],
    input: &Path,
) -> Vec<String> {
    let mut args = config.args.clone();
    for dir in includes {
        args.push(format!("-I{}", dir.display()));
    }
    for define in defines {
        let name = define.split('=').next().unwrap_or(define);
        if name == DROPPED_DEFINE {
            log::debug!("dropping -D{}", define);
            continue;
        }
        args.push(format!("-D{}", define));
    }
    args.push(input.display().to_string());
    args
}

pub fn load_unit(
    input: &Path,
    config: &FrontendConfig,
    includes: &[PathBuf],
    defines: &[String],
) -> Result<TranslationUnit, FrontendError> {
    let json = if input.extension().is_some_and(|e| e == "json") {
        std::fs::read_to_string(input).map_err(|source| FrontendError::Read {
            path: input.to_path_buf(),
            source,
        })?
    } else {
        let program = config
            .command
            .clone()
            .ok_or_else(|| FrontendError::NotConfigured(input.to_path_buf()))?;
        let mut cmd = Command::new(&program);
        cmd.args(arguments(config, includes, defines, input));
        log::debug!("running {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|source| FrontendError::Spawn { program, source })?;
        if !output.status.success() {
            return Err(FrontendError::Failed {
                path: input.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    serde_json::from_str(&json).map_err(|source| FrontendError::Json {
        path: input.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_mode_define_is_dropped() {
        let config = FrontendConfig {
            command: Some(PathBuf::from("hsh-frontend")),
            args: vec!["--std=c++20".to_string()],
        };
        let args = arguments(
            &config,
            &[PathBuf::from("include")],
            &[
                "HSH_PROFILE_MODE=1".to_string(),
                "NDEBUG".to_string(),
                "HSH_PROFILE_MODE".to_string(),
            ],
            Path::new("shaders.cpp"),
        );
        assert_eq!(args, vec!["--std=c++20", "-Iinclude", "-DNDEBUG", "shaders.cpp"]);
    }

    #[test]
    fn test_source_without_front_end() {
        let err = load_unit(Path::new("shaders.cpp"), &FrontendConfig::default(), &[], &[])
            .unwrap_err();
        assert!(matches!(err, FrontendError::NotConfigured(_)));
    }

    #[test]
    fn test_json_unit_is_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.json");
        std::fs::write(
            &path,
            r#"{"file_name": "a.cpp", "declarations": [], "pipelines": []}"#,
        )
        .unwrap();
        let unit = load_unit(&path, &FrontendConfig::default(), &[], &[]).unwrap();
        assert_eq!(unit.file_name, "a.cpp");
        assert!(unit.source.is_none());

        std::fs::write(&path, "{").unwrap();
        let err = load_unit(&path, &FrontendConfig::default(), &[], &[]).unwrap_err();
        assert!(matches!(err, FrontendError::Json { .. }));
    }
}
