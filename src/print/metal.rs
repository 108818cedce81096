use crate::ast::{Expr, Role, ScalarType, Type};
use crate::builtins::{BuiltinFunction, BuiltinType, Catalog, TypeClass};
use crate::stage::Stage;
use crate::stages::{slot_count, AttributeRecord, InterfaceRecord, Stages};
use crate::target::SourceLanguage;

use super::{attribute_name, Dialect, Printer, ShaderPolicy};

const LANG: SourceLanguage = SourceLanguage::Metal;

/// Metal Shading Language. Only vertex and fragment functions exist.
pub struct MetalPolicy;

impl MetalPolicy {
    pub fn new() -> Self {
        Self
    }

    fn output_names(stages: &Stages, stage: Stage) -> (String, String) {
        match stages.output_record(stage) {
            Some(record) => (record.name(), record.producer_var()),
            None => (format!("{}_out", stage), "_out".to_string()),
        }
    }

    fn varying_struct(p: &Printer<'_>, name: &str, record: Option<&InterfaceRecord>) -> Vec<String> {
        let mut out = vec![format!("struct {} {{", name)];
        out.push("    float4 _position [[position]];".to_string());
        for field in record.map(InterfaceRecord::fields).unwrap_or_default() {
            let flat = if p.is_integer(&field.ty) { " [[flat]]" } else { "" };
            out.push(format!("    {} {}{};", p.type_name(&field.ty), field.name, flat));
        }
        out.push("};".to_string());
        out
    }
}

impl Default for MetalPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderPolicy for MetalPolicy {
    fn language(&self) -> SourceLanguage {
        LANG
    }

    fn supports_stage(&self, stage: Stage) -> bool {
        matches!(stage, Stage::Vertex | Stage::Fragment)
    }

    fn print_stage(&self, stages: &Stages, catalog: &Catalog, stage: Stage) -> String {
        let p = Printer::new(stages, catalog, stage, self);
        let mut out = vec![
            "#include <metal_stdlib>".to_string(),
            "using namespace metal;".to_string(),
        ];
        let mut params = Vec::new();

        if stage == Stage::Vertex && !stages.attributes.is_empty() {
            out.push("struct host_vert_data {".to_string());
            let mut location = 0;
            for attr in &stages.attributes {
                for field in &attr.fields {
                    let name = attribute_name(attr, &field.name);
                    match column_type(catalog, &field.ty) {
                        // One attribute per matrix column.
                        Some((column, dim)) => {
                            for k in 0..dim {
                                out.push(format!(
                                    "    {} {}_{} [[attribute({})]];",
                                    column,
                                    name,
                                    k,
                                    location + k
                                ));
                            }
                        }
                        None => out.push(format!(
                            "    {} {} [[attribute({})]];",
                            p.type_name(&field.ty),
                            name,
                            location
                        )),
                    }
                    location += slot_count(catalog, &field.ty);
                }
            }
            out.push("};".to_string());
            params.push("host_vert_data _vert_data [[stage_in]]".to_string());
        }

        if let Some(record) = stages.input_record(stage) {
            out.extend(Self::varying_struct(&p, &record.name(), Some(record)));
            params.push(format!("{} {} [[stage_in]]", record.name(), record.consumer_var()));
        }

        if let Some(record) = stages.host_record(stage).filter(|r| !r.is_empty()) {
            out.push(format!("struct {} {{", record.name()));
            for field in record.fields() {
                out.push(format!("    {} {};", p.type_name(&field.ty), field.name));
            }
            out.push("};".to_string());
            params.push(format!(
                "constant {}& {} [[buffer({})]]",
                record.name(),
                record.consumer_var(),
                p.uniform_binding(stage)
            ));
        }

        let (ret_ty, ret_var) = if stage == Stage::Fragment {
            out.push("struct color_targets_out {".to_string());
            for target in &stages.color_targets {
                let ty = &stages.params[target.param].ty;
                out.push(format!(
                    "    {} {} [[color({})]];",
                    p.type_name(ty),
                    target.name,
                    target.index
                ));
            }
            out.push("};".to_string());
            ("color_targets_out".to_string(), "_targets_out".to_string())
        } else {
            let (name, var) = Self::output_names(stages, stage);
            out.extend(Self::varying_struct(&p, &name, stages.output_record(stage)));
            (name, var)
        };

        for (binding, texture) in stages.stage_textures(stage) {
            let ty = &stages.params[texture.param].ty;
            params.push(format!("{} {} [[texture({})]]", p.type_name(ty), texture.name, binding));
        }
        for (binding, _) in stages.stage_samplers(stage) {
            params.push(format!("sampler _sampler{0} [[sampler({0})]]", binding));
        }

        let qualifier = if stage == Stage::Vertex { "vertex" } else { "fragment" };
        out.push(format!("{} {} main0({}) {{", qualifier, ret_ty, params.join(", ")));
        out.push(format!("    {} {};", ret_ty, ret_var));
        out.extend(p.varying_locals("    "));
        out.extend(p.body("    "));
        out.push(format!("    return {};", ret_var));
        out.push("}".to_string());
        out.push(String::new());
        out.join("\n")
    }
}

/// Column vector spelling and count of a matrix type.
fn column_type(catalog: &Catalog, ty: &Type) -> Option<(&'static str, u32)> {
    match catalog.identify_type(ty)?.class() {
        TypeClass::Matrix { dim: 3 } => Some(("float3", 3)),
        TypeClass::Matrix { dim } => Some(("float4", dim as u32)),
        _ => None,
    }
}

impl Dialect for MetalPolicy {
    fn builtin_type(&self, ty: BuiltinType) -> String {
        ty.spelling(LANG).to_string()
    }

    fn scalar(&self, scalar: ScalarType) -> &'static str {
        match scalar {
            ScalarType::Bool => "bool",
            ScalarType::Int(_) => "int",
            ScalarType::UInt(_) => "uint",
            // No double precision in MSL.
            ScalarType::Float | ScalarType::Double => "float",
        }
    }

    fn function(&self, func: BuiltinFunction) -> String {
        func.spelling(LANG).to_string()
    }

    fn param(&self, p: &Printer<'_>, index: usize) -> String {
        let Some(param) = p.stages.params.get(index) else {
            return p.param_name(index);
        };
        match param.role {
            Role::Position => {
                let (_, var) = Self::output_names(p.stages, p.stage);
                format!("{}._position", var)
            }
            Role::ColorTarget { .. } => format!("_targets_out.{}", param.name),
            _ => param.name.clone(),
        }
    }

    fn vertex_field(&self, p: &Printer<'_>, attr: &AttributeRecord, field: &str, ty: &Type) -> String {
        let name = attribute_name(attr, field);
        match column_type(p.catalog, ty) {
            Some((_, dim)) => {
                let columns: Vec<String> =
                    (0..dim).map(|k| format!("_vert_data.{}_{}", name, k)).collect();
                format!("{}({})", p.type_name(ty), columns.join(", "))
            }
            None => format!("_vert_data.{}", name),
        }
    }

    fn construct(&self, p: &Printer<'_>, ty: &Type, args: &[Expr]) -> String {
        if let [source] = args {
            let narrowing = p.catalog.identify_type(ty).and_then(BuiltinType::matrix_rows) == Some(3)
                && p.catalog.identify_type(&source.ty).and_then(BuiltinType::matrix_rows) == Some(4);
            if narrowing {
                let m = p.operand(source);
                return format!("float3x3({0}[0].xyz, {0}[1].xyz, {0}[2].xyz)", m);
            }
        }
        format!("{}({})", p.type_name(ty), p.args(args))
    }

    fn sample(&self, p: &Printer<'_>, call: &Expr, texture: &Expr, args: &[Expr]) -> String {
        let sampler = p.sampler_of(call);
        let Some(coord) = args.first() else {
            return format!("{}.sample(_sampler{})", p.operand(texture), sampler);
        };
        let array = matches!(
            p.catalog.identify_type(&texture.ty).map(BuiltinType::class),
            Some(TypeClass::Texture { array: true, .. })
        );
        if array {
            let c = p.operand(coord);
            format!(
                "{0}.sample(_sampler{1}, {2}.xy, uint({2}.z))",
                p.operand(texture),
                sampler,
                c
            )
        } else {
            format!("{}.sample(_sampler{}, {})", p.operand(texture), sampler, p.expr(coord))
        }
    }
}
