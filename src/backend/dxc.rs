use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{BackendError, CompilerOutput, ShaderCompiler};

/// The DirectX shader compiler, run as an external process per stage.
#[derive(Clone, Debug)]
pub struct DxcCompiler {
    program: PathBuf,
    args: Vec<String>,
}

impl DxcCompiler {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    fn command(&self, input: &Path, output: &Path, profile: &str, spirv: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-T").arg(profile);
        if spirv {
            cmd.arg("-spirv");
        }
        cmd.arg("-E").arg("main").arg("-Fo").arg(output);
        cmd.args(&self.args);
        cmd.arg(input);
        cmd
    }
}

impl Default for DxcCompiler {
    fn default() -> Self {
        Self::new("dxc", Vec::new())
    }
}

impl ShaderCompiler for DxcCompiler {
    fn compile(&self, source: &str, profile: &str, spirv: bool) -> Result<CompilerOutput, BackendError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("stage.hlsl");
        let output = scratch.path().join("stage.bin");
        fs::File::create(&input)?.write_all(source.as_bytes())?;

        let mut cmd = self.command(&input, &output, profile, spirv);
        log::debug!("running {:?}", cmd);
        let result = cmd.output().map_err(|source| BackendError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // A failed run leaves no object behind; the caller reports it.
        let object = if result.status.success() {
            fs::read(&output).unwrap_or_default()
        } else {
            Vec::new()
        };
        let mut messages = String::from_utf8_lossy(&result.stderr).into_owned();
        messages.push_str(&String::from_utf8_lossy(&result.stdout));
        Ok(CompilerOutput { object, messages })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let dxc = DxcCompiler::new("/opt/dxc", vec!["-O3".to_string()]);
        let cmd = dxc.command(
            Path::new("in.hlsl"),
            Path::new("out.bin"),
            "ps_6_0",
            true,
        );
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "/opt/dxc");
        assert_eq!(
            args,
            vec!["-T", "ps_6_0", "-spirv", "-E", "main", "-Fo", "out.bin", "-O3", "in.hlsl"]
        );
    }

    #[test]
    fn test_missing_executable_is_a_spawn_error() {
        let dxc = DxcCompiler::new("/nonexistent/hshgen-dxc", Vec::new());
        let err = dxc.compile("void main() {}", "vs_6_0", false).unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }
}
