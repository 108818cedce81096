use std::path::PathBuf;
use std::process;

use clap::Parser;
use hshgen::Target;

mod cli;

#[derive(Parser)]
#[command(
    name = "hshgen",
    version,
    about = "Split hsh pipeline functions into per-stage shaders and write the C++ header"
)]
pub struct Cli {
    /// Debug logging (otherwise RUST_LOG, default warn)
    #[arg(short, long)]
    pub verbose: bool,
    /// Include directory passed to the front end
    #[arg(short = 'I', value_name = "DIR")]
    pub include: Vec<PathBuf>,
    /// Macro definition passed to the front end
    #[arg(short = 'D', value_name = "MACRO=VALUE")]
    pub define: Vec<String>,
    /// Write a make-style dependency file
    #[arg(long = "MD")]
    pub depfile: bool,
    /// Dependency file path (default: <output>.d)
    #[arg(long = "MF", value_name = "FILE")]
    pub depfile_path: Option<PathBuf>,
    /// Dependency file target (default: the output path)
    #[arg(long = "MT", value_name = "TARGET")]
    pub depfile_target: Option<String>,
    /// Config file (default: ./hshgen.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub glsl: bool,
    #[arg(long)]
    pub hlsl: bool,
    #[arg(long)]
    pub dxbc: bool,
    #[arg(long)]
    pub dxil: bool,
    #[arg(long)]
    pub vulkan_spirv: bool,
    #[arg(long)]
    pub metal: bool,
    #[arg(long)]
    pub metal_bin_mac: bool,
    #[arg(long)]
    pub metal_bin_ios: bool,
    #[arg(long)]
    pub metal_bin_tvos: bool,
    /// C++ source, or a JSON translation unit
    pub input: PathBuf,
    /// Generated header
    pub output: PathBuf,
}

impl Cli {
    /// Targets selected by flag, in declaration order.
    pub fn targets(&self) -> Vec<Target> {
        let flags = [
            self.glsl,
            self.hlsl,
            self.dxbc,
            self.dxil,
            self.vulkan_spirv,
            self.metal,
            self.metal_bin_mac,
            self.metal_bin_ios,
            self.metal_bin_tvos,
        ];
        Target::ALL
            .into_iter()
            .zip(flags)
            .filter_map(|(target, on)| on.then_some(target))
            .collect()
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(level);
    let mut logger = env_logger::Builder::from_env(env);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if let Err(code) = cli::generate::cmd_generate(&cli) {
        process::exit(code);
    }
}
