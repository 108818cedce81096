//! Stage-partitioning shader generator.
//!
//! One pipeline function, written once for host and device, is split into
//! a host block plus one program per active device stage. Each program is
//! printed as GLSL, HLSL or Metal, optionally compiled, and embedded in a
//! generated C++ header.

pub mod ast;
pub mod backend;
pub mod builtins;
pub mod config;
pub mod diagnostic;
pub mod emit;
pub mod generator;
pub mod hash;
pub mod print;
pub mod span;
pub mod stage;
pub mod stages;
pub mod target;
pub mod trace;
pub mod validate;

pub use generator::{generate, GeneratedOutput, Generator, PipelineReport};
pub use target::Target;
