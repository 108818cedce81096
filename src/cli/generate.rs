use std::path::Path;

use hshgen::config::Config;
use hshgen::diagnostic::{has_errors, render_diagnostics};
use hshgen::generate;

use super::{depfile, frontend};
use crate::Cli;

/// Run the generator for the parsed command line; `Err` is the exit code.
pub fn cmd_generate(cli: &Cli) -> Result<(), i32> {
    let config = Config::discover(cli.config.as_deref(), Path::new(".")).map_err(|e| {
        eprintln!("error: {}", e);
        1
    })?;

    let targets = config.resolve_targets(&cli.targets());
    if targets.is_empty() {
        eprintln!("error: No hsh targets specified!");
        return Err(1);
    }

    let unit = frontend::load_unit(&cli.input, &config.frontend, &cli.include, &cli.define)
        .map_err(|e| {
            eprintln!("error: {}", e);
            1
        })?;
    let filename = unit.file_name.clone();
    let source = unit.source.clone().unwrap_or_default();

    let compiler = config.shader_compiler();
    let output = match generate(&unit, &targets, Some(&compiler)) {
        Ok(output) => output,
        Err(errors) => {
            render_diagnostics(&errors, &filename, &source);
            return Err(1);
        }
    };
    render_diagnostics(&output.diagnostics, &filename, &source);
    log::info!(
        "{}: {} pipeline function(s), {} blob(s)",
        filename,
        output.pipelines.iter().filter(|p| p.emitted).count(),
        output.blobs
    );

    if let Err(e) = std::fs::write(&cli.output, &output.header) {
        eprintln!("error: cannot write '{}': {}", cli.output.display(), e);
        return Err(1);
    }

    if cli.depfile {
        let path = cli
            .depfile_path
            .clone()
            .unwrap_or_else(|| depfile::default_path(&cli.output));
        let target = cli
            .depfile_target
            .clone()
            .unwrap_or_else(|| cli.output.display().to_string());
        let input = cli.input.display().to_string();
        if let Err(e) = depfile::write(&path, &target, &input, &unit.dependencies) {
            eprintln!("error: cannot write '{}': {}", path.display(), e);
            return Err(1);
        }
    }

    if has_errors(&output.diagnostics) {
        return Err(1);
    }
    Ok(())
}
