//! C++ header writer.
//!
//! Shader blobs are written once per run, ahead of the anonymous namespace
//! that holds one class per pipeline function. A class owns its host
//! uniform record structs, a constructor that fills and pushes them, and a
//! `_HshShaderData` specialization per target listing the shader objects
//! and the vertex input tables.

use std::collections::HashSet;

use crate::ast::{DeclIndex, Param};
use crate::backend::StageBinary;
use crate::builtins::Catalog;
use crate::hash::ContentHash;
use crate::print::host::{host_body, stage_enumerator};
use crate::print::StageSource;
use crate::stages::{InputRate, Stages, VertexFormat};
use crate::target::Target;

/// Printed sources and their binaries for one target, in stage order.
#[derive(Clone, Debug)]
pub struct TargetOutput {
    pub target: Target,
    pub sources: Vec<StageSource>,
    pub binaries: Vec<StageBinary>,
}

pub struct HeaderEmitter<'c> {
    catalog: &'c Catalog,
    /// Blob arrays and shader objects, outside the namespace.
    blobs: Vec<String>,
    /// Pipeline classes, inside the namespace.
    classes: Vec<String>,
    seen: HashSet<ContentHash>,
    dedup_hits: usize,
}

impl<'c> HeaderEmitter<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            blobs: Vec::new(),
            classes: Vec::new(),
            seen: HashSet::new(),
            dedup_hits: 0,
        }
    }

    /// Number of distinct blobs written so far.
    pub fn blob_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of binaries that reused an already written blob.
    pub fn dedup_hits(&self) -> usize {
        self.dedup_hits
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.classes.push(line.into());
    }

    /// Write the class of one pipeline function and any new blobs it uses.
    pub fn pipeline(&mut self, stages: &Stages, decls: &DeclIndex<'_>, outputs: &[TargetOutput]) {
        for output in outputs {
            for (source, binary) in output.sources.iter().zip(&output.binaries) {
                self.blob(output.target, source, binary);
            }
        }

        let name = stages.name.as_str();
        let base = self.catalog.runtime_name("_HshBase");
        let node = self.catalog.runtime_name("_HshGlobalListNode");
        let data = self.catalog.runtime_name("_HshShaderData");
        let (n_stages, n_bindings, n_attributes) = (
            stages.device_stages().count(),
            stages.vertex_bindings.len(),
            stages.vertex_attributes.len(),
        );

        self.emit(format!("class {} : public {}<{}> {{", name, base, name));
        self.emit("public:");
        let records: Vec<_> = stages.host_records().filter(|r| !r.is_empty()).collect();
        for record in records {
            self.emit(format!("  struct {} {{", record.name()));
            for field in record.fields() {
                self.emit(format!("    {} {};", decls.type_name(&field.ty), field.name));
            }
            self.emit("  };");
        }
        self.emit(format!("  static {} global;", node));

        let params: Vec<String> = stages
            .captures
            .iter()
            .filter_map(|&i| stages.params.get(i))
            .map(|p| self.capture_param(decls, p))
            .collect();
        self.emit(format!("  explicit {}({}) {{", name, params.join(", ")));
        let body = host_body(stages, self.catalog, "    ");
        self.classes.extend(body);
        self.emit("  }");
        self.emit(format!("  template <{} T>", self.catalog.runtime_name("Target")));
        self.emit(format!(
            "  static const {}<T, {}, {}, {}> data;",
            data, n_stages, n_bindings, n_attributes
        ));
        self.emit("};");
        self.emit(format!("{} {}::global{{&{}::global_build}};", node, name, name));
        self.emit("");

        for output in outputs {
            let target = self.target_enumerator(output.target);
            self.emit(format!(
                "template <> const {}<{}, {}, {}, {}> {}::data<{}>{{",
                data, target, n_stages, n_bindings, n_attributes, name, target
            ));
            for hash in output.binaries.iter().filter_map(|b| b.hash) {
                self.emit(format!("  _hsho_{},", hash.short_hex()));
            }
            for binding in &stages.vertex_bindings {
                self.emit(format!(
                    "  hsh::_HshVertexBinding{{{}, {}, {}}},",
                    binding.binding,
                    binding.stride,
                    self.rate_enumerator(binding.rate)
                ));
            }
            for attribute in &stages.vertex_attributes {
                self.emit(format!(
                    "  hsh::_HshVertexAttribute{{{}, {}, {}}},",
                    attribute.binding,
                    self.format_enumerator(attribute.format),
                    attribute.offset
                ));
            }
            self.emit("};");
        }

        let captures: Vec<&str> = stages
            .captures
            .iter()
            .filter_map(|&i| stages.params.get(i))
            .map(|p| p.name.as_str())
            .collect();
        self.emit(format!("#define {} ::{}({}); (void)", name, name, captures.join(", ")));
        self.emit("");
    }

    fn blob(&mut self, target: Target, source: &StageSource, binary: &StageBinary) {
        let Some(hash) = binary.hash else {
            return;
        };
        if !self.seen.insert(hash) {
            self.dedup_hits += 1;
            log::debug!("blob {} already emitted, reusing", hash);
            return;
        }
        let hex = hash.short_hex();
        self.blobs.push(format!("/* {} source targeting {}", source.stage, target));
        self.blobs.push(String::new());
        self.blobs.extend(source.text.lines().map(|l| l.replace("*/", "* /")));
        self.blobs.push("*/".to_string());
        self.blobs.push(format!("inline const unsigned char _hshs_{}[] = {{", hex));
        for chunk in binary.data.chunks(16) {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("0x{:02x}", b)).collect();
            self.blobs.push(format!("  {},", bytes.join(", ")));
        }
        self.blobs.push("};".to_string());
        let object = format!(
            "inline hsh::_HshShaderObject<{}> _hsho_{}{{{}, {{_hshs_{}, 0x{}}}}};",
            self.target_enumerator(target),
            hex,
            stage_enumerator(self.catalog, binary.stage),
            hex,
            hex
        );
        self.blobs.push(object);
        self.blobs.push(String::new());
    }

    /// POD captures by value, everything else by const reference.
    fn capture_param(&self, decls: &DeclIndex<'_>, param: &Param) -> String {
        let ty = decls.type_name(&param.ty);
        if self.catalog.is_value_type(&param.ty) {
            format!("{} {}", ty, param.name)
        } else {
            format!("const {}& {}", ty, param.name)
        }
    }

    fn target_enumerator(&self, target: Target) -> String {
        self.catalog
            .enumerator("Target", target.runtime_value())
            .unwrap_or_else(|| format!("{}::{}", self.catalog.runtime_name("Target"), target.runtime_name()))
    }

    fn rate_enumerator(&self, rate: InputRate) -> String {
        self.catalog
            .enumerator("_HshInputRate", rate.runtime_value())
            .unwrap_or_else(|| format!("hsh::{}", rate.name()))
    }

    fn format_enumerator(&self, format: VertexFormat) -> String {
        self.catalog
            .enumerator("_HshFormat", format.runtime_value())
            .unwrap_or_else(|| format!("hsh::{}", format.name()))
    }

    /// The complete header text.
    pub fn finish(self, file_name: &str) -> String {
        let mut out = vec![format!("/* Auto-generated hshhead for {} */", file_name), String::new()];
        out.extend(self.blobs);
        out.push("namespace {".to_string());
        out.push(String::new());
        out.extend(self.classes);
        out.push("}".to_string());
        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, Role};
    use crate::backend::compile_stages;
    use crate::print::create_policy;
    use crate::stages::StagesBuilder;
    use crate::trace::trace_outputs;
    use crate::validate::validate;

    fn capture_pipeline(b: &mut AstBuilder, name: &str) -> crate::ast::PipelineFn {
        let mat = b.ty("float4x4");
        let f3 = b.ty("float3");
        let f4 = b.ty("float4");
        let vert = b.record("Vert", &[("position", f3)]);
        let params = vec![
            b.param("transform", mat, Role::Captured),
            b.param("v", vert, Role::VertexBuffer { index: 0 }),
            b.param("position", f4, Role::Position),
        ];
        let transform = b.arg(&params, 0);
        let v = b.arg(&params, 1);
        let pos = b.member(v, "position");
        let one = b.float(1.0);
        let ctor = b.construct(f4, vec![pos, one]);
        let product = b.binary(crate::ast::BinaryOp::Mul, transform, ctor);
        let out = b.arg(&params, 2);
        let body = vec![b.assign(out, product)];
        b.pipeline(name, params, body)
    }

    fn stages_of(b: &AstBuilder, catalog: &Catalog, func: &crate::ast::PipelineFn) -> Stages {
        let decls = DeclIndex::new(b.declarations());
        let validated = validate(catalog, &decls, func).unwrap();
        let mut builder = StagesBuilder::new(catalog, &decls, func, validated);
        trace_outputs(&mut builder).unwrap();
        builder.finalize()
    }

    fn glsl_output(stages: &Stages, catalog: &Catalog) -> TargetOutput {
        let policy = create_policy(Target::Glsl);
        let sources = stages.print(policy.as_ref(), catalog).unwrap();
        let (binaries, _) = compile_stages(Target::Glsl, &stages.name, &sources, None).unwrap();
        TargetOutput { target: Target::Glsl, sources, binaries }
    }

    #[test]
    fn test_class_layout() {
        let mut b = AstBuilder::with_runtime();
        let func = capture_pipeline(&mut b, "hsh_Draw");
        let catalog = Catalog::build(b.declarations()).unwrap();
        let decls = DeclIndex::new(b.declarations());
        let stages = stages_of(&b, &catalog, &func);
        let output = glsl_output(&stages, &catalog);
        let hash = output.binaries[0].hash.unwrap().short_hex();

        let mut emitter = HeaderEmitter::new(&catalog);
        emitter.pipeline(&stages, &decls, &[output]);
        let header = emitter.finish("draw.cpp");
        let lines: Vec<&str> = header.lines().collect();

        assert_eq!(lines[0], "/* Auto-generated hshhead for draw.cpp */");
        assert!(lines.contains(&"/* vertex source targeting glsl"));
        assert!(lines.contains(&format!("inline const unsigned char _hshs_{}[] = {{", hash).as_str()));
        assert!(lines.contains(
            &format!(
                "inline hsh::_HshShaderObject<hsh::Target::GLSL> _hsho_{0}{{hsh::Stage::Vertex, {{_hshs_{0}, 0x{0}}}}};",
                hash
            )
            .as_str()
        ));
        assert!(lines.contains(&"class hsh_Draw : public hsh::_HshBase<hsh_Draw> {"));
        assert!(lines.contains(&"  struct host_to_vertex {"));
        assert!(lines.contains(&"    hsh::float4x4 _hv0;"));
        assert!(lines.contains(&"  explicit hsh_Draw(hsh::float4x4 transform) {"));
        assert!(lines.contains(&"    push_uniform<hsh::Stage::Vertex>(_to_vertex);"));
        assert!(lines.contains(
            &"template <> const hsh::_HshShaderData<hsh::Target::GLSL, 1, 1, 1> hsh_Draw::data<hsh::Target::GLSL>{"
        ));
        assert!(lines.contains(&format!("  _hsho_{},", hash).as_str()));
        assert!(lines.contains(&"  hsh::_HshVertexBinding{0, 16, hsh::PerVertex},"));
        assert!(lines.contains(&"  hsh::_HshVertexAttribute{0, hsh::RGB32_SFLOAT, 0},"));
        assert!(lines.contains(&"#define hsh_Draw ::hsh_Draw(transform); (void)"));
        assert_eq!(*lines.last().unwrap(), "}");

        // Blobs precede the namespace.
        let ns = lines.iter().position(|l| *l == "namespace {").unwrap();
        let blob = lines.iter().position(|l| l.starts_with("inline const unsigned char")).unwrap();
        assert!(blob < ns);
    }

    #[test_log::test]
    fn test_identical_binaries_are_written_once() {
        let mut b = AstBuilder::with_runtime();
        let first = capture_pipeline(&mut b, "hsh_A");
        let second = capture_pipeline(&mut b, "hsh_B");
        let catalog = Catalog::build(b.declarations()).unwrap();
        let decls = DeclIndex::new(b.declarations());

        let mut emitter = HeaderEmitter::new(&catalog);
        for func in [&first, &second] {
            let stages = stages_of(&b, &catalog, func);
            let output = glsl_output(&stages, &catalog);
            emitter.pipeline(&stages, &decls, &[output]);
        }
        assert_eq!(emitter.blob_count(), 1);
        assert_eq!(emitter.dedup_hits(), 1);

        let header = emitter.finish("twice.cpp");
        assert_eq!(header.matches("inline const unsigned char _hshs_").count(), 1);
        assert_eq!(header.matches("  _hsho_").count(), 2);
    }

    #[test]
    fn test_comment_terminators_in_sources_are_broken() {
        let mut b = AstBuilder::with_runtime();
        let func = capture_pipeline(&mut b, "hsh_C");
        let catalog = Catalog::build(b.declarations()).unwrap();
        let decls = DeclIndex::new(b.declarations());
        let stages = stages_of(&b, &catalog, &func);
        let mut output = glsl_output(&stages, &catalog);
        output.sources[0].text.push_str("\n/* trailing */");

        let mut emitter = HeaderEmitter::new(&catalog);
        emitter.pipeline(&stages, &decls, &[output]);
        let header = emitter.finish("c.cpp");
        assert!(header.contains("/* trailing * /"));
    }
}
