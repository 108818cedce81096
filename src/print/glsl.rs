use crate::ast::{Expr, InterfaceRef, Role, ScalarType, Side};
use crate::builtins::{BuiltinFunction, BuiltinType, Catalog};
use crate::stage::Stage;
use crate::stages::{slot_count, InterfaceRecord, Stages};
use crate::target::SourceLanguage;

use super::{attribute_name, interface_access, Dialect, Printer, ShaderPolicy};

const LANG: SourceLanguage = SourceLanguage::Glsl;

/// GLSL 4.50 for OpenGL and Vulkan GLSL consumers.
///
/// Host uniforms become anonymous uniform blocks, so their fields are read
/// bare. Varyings travel in named interface blocks.
pub struct GlslPolicy;

impl GlslPolicy {
    pub fn new() -> Self {
        Self
    }

    fn varying_block(&self, p: &Printer<'_>, record: &InterfaceRecord, input: bool) -> Vec<String> {
        if record.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::new();
        let (qualifier, var) = if input {
            ("in", record.consumer_var())
        } else {
            ("out", record.producer_var())
        };
        out.push(format!("{} {} {{", qualifier, record.name()));
        for field in record.fields() {
            let flat = if input && p.is_integer(&field.ty) { "flat " } else { "" };
            out.push(format!("    {}{} {};", flat, p.type_name(&field.ty), field.name));
        }
        out.push(format!("}} {};", var));
        out
    }
}

impl Default for GlslPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderPolicy for GlslPolicy {
    fn language(&self) -> SourceLanguage {
        LANG
    }

    fn print_stage(&self, stages: &Stages, catalog: &Catalog, stage: Stage) -> String {
        let p = Printer::new(stages, catalog, stage, self);
        let mut out = vec!["#version 450 core".to_string()];

        if let Some(record) = stages.host_record(stage).filter(|r| !r.is_empty()) {
            out.push(format!(
                "layout(binding = {}) uniform {} {{",
                p.uniform_binding(stage),
                record.name()
            ));
            for field in record.fields() {
                out.push(format!("    {} {};", p.type_name(&field.ty), field.name));
            }
            out.push("};".to_string());
        }

        if stage == Stage::Vertex {
            let mut location = 0;
            for attr in &stages.attributes {
                for field in &attr.fields {
                    out.push(format!(
                        "layout(location = {}) in {} {};",
                        location,
                        p.type_name(&field.ty),
                        attribute_name(attr, &field.name)
                    ));
                    location += slot_count(catalog, &field.ty);
                }
            }
        }

        if let Some(record) = stages.input_record(stage) {
            out.extend(self.varying_block(&p, record, true));
        }
        if let Some(record) = stages.output_record(stage) {
            out.extend(self.varying_block(&p, record, false));
        }

        for (binding, texture) in stages.stage_textures(stage) {
            let ty = &stages.params[texture.param].ty;
            out.push(format!(
                "layout(binding = {}) uniform {} {};",
                binding,
                p.type_name(ty),
                texture.name
            ));
        }

        if stage == Stage::Fragment {
            for target in &stages.color_targets {
                let ty = &stages.params[target.param].ty;
                out.push(format!(
                    "layout(location = {}) out {} {};",
                    target.index,
                    p.type_name(ty),
                    target.name
                ));
            }
        }

        out.push("void main() {".to_string());
        out.extend(p.varying_locals("    "));
        out.extend(p.body("    "));
        out.push("}".to_string());
        out.push(String::new());
        out.join("\n")
    }
}

impl Dialect for GlslPolicy {
    fn builtin_type(&self, ty: BuiltinType) -> String {
        ty.spelling(LANG).to_string()
    }

    fn scalar(&self, scalar: ScalarType) -> &'static str {
        match scalar {
            ScalarType::Bool => "bool",
            ScalarType::Int(_) => "int",
            ScalarType::UInt(_) => "uint",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    fn function(&self, func: BuiltinFunction) -> String {
        func.spelling(LANG).to_string()
    }

    fn param(&self, p: &Printer<'_>, index: usize) -> String {
        match p.stages.params.get(index).map(|param| param.role) {
            Some(Role::Position) => "gl_Position".to_string(),
            _ => p.param_name(index),
        }
    }

    fn interface(&self, r: &InterfaceRef) -> String {
        match (r.source, r.side) {
            (Stage::Host, Side::Consumer) => r.field_name(),
            _ => interface_access(r),
        }
    }

    fn sample(&self, p: &Printer<'_>, _call: &Expr, texture: &Expr, args: &[Expr]) -> String {
        let coord = args.first().map(|a| p.expr(a)).unwrap_or_default();
        format!("texture({}, {})", p.expr(texture), coord)
    }
}
