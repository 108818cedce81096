//! Turns printed stage sources into stage binaries.
//!
//! Text targets hand the source through with a NUL terminator. Bytecode
//! targets run an external compiler per stage. Every non-empty binary is
//! content hashed so the header writer can store identical blobs once.

mod dxc;

pub use dxc::DxcCompiler;

use std::io;
use std::path::PathBuf;

use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::hash::ContentHash;
use crate::print::StageSource;
use crate::span::Span;
use crate::stage::Stage;
use crate::target::{BackendMode, Target};

/// Output of one stage for one target.
#[derive(Clone, Debug)]
pub struct StageBinary {
    pub stage: Stage,
    pub data: Vec<u8>,
    /// `None` for an empty binary.
    pub hash: Option<ContentHash>,
}

impl StageBinary {
    pub fn new(stage: Stage, data: Vec<u8>) -> Self {
        let hash = (!data.is_empty()).then(|| ContentHash::of(&data));
        Self { stage, data, hash }
    }
}

/// What an external compiler produced for one stage.
#[derive(Clone, Debug, Default)]
pub struct CompilerOutput {
    /// Object bytes; empty when compilation failed.
    pub object: Vec<u8>,
    /// Diagnostic text the compiler printed.
    pub messages: String,
}

/// An external shader compiler process.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to run shader compiler `{program}`: {source}")]
    Spawn { program: PathBuf, source: io::Error },
    #[error("shader compiler scratch file: {0}")]
    Scratch(#[from] io::Error),
}

/// A compiler from HLSL text to bytecode.
pub trait ShaderCompiler {
    fn compile(
        &self,
        source: &str,
        profile: &str,
        spirv: bool,
    ) -> Result<CompilerOutput, BackendError>;
}

/// Binaries for every stage source, in the same order.
///
/// Returns the binaries plus any downgraded compiler warnings; a stage that
/// produced no object is an error.
pub fn compile_stages(
    target: Target,
    pipeline: &str,
    sources: &[StageSource],
    compiler: Option<&dyn ShaderCompiler>,
) -> Result<(Vec<StageBinary>, Vec<Diagnostic>), Diagnostic> {
    match target.backend() {
        BackendMode::Text => {
            let binaries = sources
                .iter()
                .map(|s| {
                    let mut data = s.text.clone().into_bytes();
                    data.push(0);
                    StageBinary::new(s.stage, data)
                })
                .collect();
            Ok((binaries, Vec::new()))
        }
        BackendMode::Compiled => {
            let Some(compiler) = compiler else {
                return Err(backend_error(format!(
                    "target {} requires a shader compiler but none is configured",
                    target
                )));
            };
            let mut binaries = Vec::with_capacity(sources.len());
            let mut warnings = Vec::new();
            for source in sources {
                let Some(profile) = target.profile(source.stage) else {
                    return Err(backend_error(format!(
                        "target {} has no profile for the {} stage",
                        target, source.stage
                    )));
                };
                let output = compiler
                    .compile(&source.text, &profile, target.emits_spirv())
                    .map_err(|e| backend_error(e.to_string()))?;
                let messages = output.messages.trim();
                if output.object.is_empty() {
                    let mut err = backend_error(format!(
                        "{}: {} stage failed to compile for {}",
                        pipeline, source.stage, target
                    ));
                    if !messages.is_empty() {
                        err = err.with_note(messages.to_string());
                    }
                    return Err(err.with_note(format!("stage source:\n{}", source.text)));
                }
                if !messages.is_empty() {
                    log::warn!("{}: {} {} compiler output: {}", pipeline, target, source.stage, messages);
                    warnings.push(
                        Diagnostic::warning(
                            format!("{}: {} stage compiled with warnings for {}", pipeline, source.stage, target),
                            Span::dummy(),
                        )
                        .with_kind(ErrorKind::Backend)
                        .with_note(messages.to_string()),
                    );
                }
                binaries.push(StageBinary::new(source.stage, output.object));
            }
            Ok((binaries, warnings))
        }
    }
}

fn backend_error(message: String) -> Diagnostic {
    Diagnostic::error(message, Span::dummy()).with_kind(ErrorKind::Backend)
}
