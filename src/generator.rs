//! The generation run: validate → build → trace → finalize → print →
//! compile → emit, once per pipeline function.
//!
//! The catalog is built once per translation unit. A fatal diagnostic in
//! one pipeline function drops that function from the header; the others
//! are still emitted.

use crate::ast::{DeclIndex, PipelineFn, TranslationUnit};
use crate::backend::{compile_stages, ShaderCompiler};
use crate::builtins::Catalog;
use crate::diagnostic::Diagnostic;
use crate::emit::{HeaderEmitter, TargetOutput};
use crate::print::create_policy;
use crate::span::Span;
use crate::stage::StageMask;
use crate::stages::{Stages, StagesBuilder};
use crate::target::Target;
use crate::trace::trace_outputs;
use crate::validate::validate;

/// Per-function outcome of a run.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub name: String,
    /// Active stages; empty when validation failed.
    pub mask: StageMask,
    pub emitted: bool,
}

/// Everything a run produced.
#[derive(Clone, Debug)]
pub struct GeneratedOutput {
    pub header: String,
    /// Distinct shader blobs written to the header.
    pub blobs: usize,
    pub pipelines: Vec<PipelineReport>,
    /// Errors of dropped functions plus backend warnings.
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Generator<'a> {
    unit: &'a TranslationUnit,
    catalog: Catalog,
    targets: Vec<Target>,
    compiler: Option<&'a dyn ShaderCompiler>,
}

impl<'a> Generator<'a> {
    /// Fails when no target is selected or the runtime declarations are incomplete.
    pub fn new(unit: &'a TranslationUnit, targets: &[Target]) -> Result<Self, Vec<Diagnostic>> {
        if targets.is_empty() {
            return Err(vec![Diagnostic::error(
                "No hsh targets specified!".to_string(),
                Span::dummy(),
            )]);
        }
        let mut targets = targets.to_vec();
        targets.sort_unstable();
        targets.dedup();

        let catalog = Catalog::build(&unit.declarations)?;
        log::debug!(
            "{}: catalog ready, {} declaration(s), {} pipeline function(s)",
            unit.file_name,
            unit.declarations.len(),
            unit.pipelines.len()
        );
        Ok(Self { unit, catalog, targets, compiler: None })
    }

    pub fn with_compiler(mut self, compiler: &'a dyn ShaderCompiler) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn run(&self) -> GeneratedOutput {
        let decls = DeclIndex::new(&self.unit.declarations);
        let mut emitter = HeaderEmitter::new(&self.catalog);
        let mut pipelines = Vec::new();
        let mut diagnostics = Vec::new();

        for func in &self.unit.pipelines {
            match self.pipeline(&decls, func) {
                Ok((stages, outputs, warnings)) => {
                    emitter.pipeline(&stages, &decls, &outputs);
                    diagnostics.extend(warnings);
                    pipelines.push(PipelineReport {
                        name: func.name.clone(),
                        mask: stages.mask,
                        emitted: true,
                    });
                }
                Err(errors) => {
                    log::info!("{}: dropped after {} error(s)", func.name, errors.len());
                    diagnostics.extend(errors);
                    pipelines.push(PipelineReport {
                        name: func.name.clone(),
                        mask: StageMask::empty(),
                        emitted: false,
                    });
                }
            }
        }

        if emitter.dedup_hits() > 0 {
            log::info!(
                "{}: {} blob(s), {} duplicate(s) shared",
                self.unit.file_name,
                emitter.blob_count(),
                emitter.dedup_hits()
            );
        }
        let blobs = emitter.blob_count();
        GeneratedOutput {
            header: emitter.finish(&self.unit.file_name),
            blobs,
            pipelines,
            diagnostics,
        }
    }

    /// All targets of one function, or the errors that drop it.
    fn pipeline(
        &self,
        decls: &DeclIndex<'_>,
        func: &PipelineFn,
    ) -> Result<(Stages, Vec<TargetOutput>, Vec<Diagnostic>), Vec<Diagnostic>> {
        let validated = validate(&self.catalog, decls, func)?;
        log::debug!("{}: stages {}", func.name, validated.mask);

        let mut builder = StagesBuilder::new(&self.catalog, decls, func, validated);
        trace_outputs(&mut builder).map_err(|e| vec![e])?;
        let stages = builder.finalize();

        let mut outputs = Vec::with_capacity(self.targets.len());
        let mut warnings = Vec::new();
        for &target in &self.targets {
            let policy = create_policy(target);
            let sources = stages.print(policy.as_ref(), &self.catalog).map_err(|e| vec![e])?;
            for source in &sources {
                log::debug!(
                    "{}: {} {} source, {} bytes",
                    func.name,
                    target,
                    source.stage,
                    source.text.len()
                );
            }
            let (binaries, notes) = compile_stages(target, &func.name, &sources, self.compiler)
                .map_err(|e| vec![e])?;
            warnings.extend(notes);
            outputs.push(TargetOutput { target, sources, binaries });
        }
        Ok((stages, outputs, warnings))
    }
}

/// Generate the header for a translation unit.
pub fn generate(
    unit: &TranslationUnit,
    targets: &[Target],
    compiler: Option<&dyn ShaderCompiler>,
) -> Result<GeneratedOutput, Vec<Diagnostic>> {
    let mut generator = Generator::new(unit, targets)?;
    if let Some(compiler) = compiler {
        generator = generator.with_compiler(compiler);
    }
    Ok(generator.run())
}
