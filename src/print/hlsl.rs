use crate::ast::{BinaryOp, Expr, InterfaceRef, Role, ScalarType, Side, Type};
use crate::builtins::{BuiltinFunction, BuiltinType, Catalog};
use crate::stage::Stage;
use crate::stages::{slot_count, AttributeRecord, InterfaceRecord, Stages};
use crate::target::SourceLanguage;

use super::{attribute_name, interface_access, Dialect, Printer, ShaderPolicy};

const LANG: SourceLanguage = SourceLanguage::Hlsl;

const MATRIX_DOWNCAST: &str = "float3x3 float4x4_to_float3x3(float4x4 m) {\n    \
    return float3x3(m[0].xyz, m[1].xyz, m[2].xyz);\n}";

/// HLSL for the DXBC, DXIL and SPIR-V targets; also the plain `hlsl` target.
pub struct HlslPolicy {
    /// Annotate vertex inputs with explicit Vulkan locations.
    vulkan: bool,
}

impl HlslPolicy {
    pub fn new(vulkan: bool) -> Self {
        Self { vulkan }
    }

    /// Output struct of a stage and the variable it is written through.
    fn output_names(stages: &Stages, stage: Stage) -> (String, String) {
        match stages.output_record(stage) {
            Some(record) => (record.name(), record.producer_var()),
            None => (format!("{}_out", stage), "_out".to_string()),
        }
    }

    fn varying_struct(p: &Printer<'_>, name: &str, record: Option<&InterfaceRecord>) -> Vec<String> {
        let mut out = vec![format!("struct {} {{", name)];
        out.push("    float4 _position : SV_Position;".to_string());
        for (i, field) in record.map(InterfaceRecord::fields).unwrap_or_default().iter().enumerate() {
            let flat = if p.is_integer(&field.ty) { "nointerpolation " } else { "" };
            out.push(format!(
                "    {}{} {} : VAR{};",
                flat,
                p.type_name(&field.ty),
                field.name,
                i
            ));
        }
        out.push("};".to_string());
        out
    }
}

impl ShaderPolicy for HlslPolicy {
    fn language(&self) -> SourceLanguage {
        LANG
    }

    fn print_stage(&self, stages: &Stages, catalog: &Catalog, stage: Stage) -> String {
        let p = Printer::new(stages, catalog, stage, self);
        let mut out = vec![MATRIX_DOWNCAST.to_string()];

        if let Some(record) = stages.host_record(stage).filter(|r| !r.is_empty()) {
            out.push(format!(
                "cbuffer {} : register(b{}) {{",
                record.name(),
                p.uniform_binding(stage)
            ));
            for field in record.fields() {
                out.push(format!("    {} {};", p.type_name(&field.ty), field.name));
            }
            out.push("};".to_string());
        }

        let mut params = Vec::new();
        if stage == Stage::Vertex && !stages.attributes.is_empty() {
            out.push("struct host_vert_data {".to_string());
            let mut location = 0;
            for attr in &stages.attributes {
                for field in &attr.fields {
                    let vk = if self.vulkan {
                        format!("[[vk::location({})]] ", location)
                    } else {
                        String::new()
                    };
                    out.push(format!(
                        "    {}{} {} : ATTR{};",
                        vk,
                        p.type_name(&field.ty),
                        attribute_name(attr, &field.name),
                        location
                    ));
                    location += slot_count(catalog, &field.ty);
                }
            }
            out.push("};".to_string());
            params.push("in host_vert_data _vert_data".to_string());
        }

        if let Some(record) = stages.input_record(stage) {
            out.extend(Self::varying_struct(&p, &record.name(), Some(record)));
            params.push(format!("in {} {}", record.name(), record.consumer_var()));
        }

        let (ret_ty, ret_var) = if stage == Stage::Fragment {
            out.push("struct color_targets_out {".to_string());
            for target in &stages.color_targets {
                let ty = &stages.params[target.param].ty;
                out.push(format!(
                    "    {} {} : SV_Target{};",
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
            out.push(format!(
                "{} {} : register(t{});",
                p.type_name(ty),
                texture.name,
                binding
            ));
        }
        for (binding, _) in stages.stage_samplers(stage) {
            out.push(format!("SamplerState _sampler{0} : register(s{0});", binding));
        }

        out.push(format!("{} main({}) {{", ret_ty, params.join(", ")));
        out.push(format!("    {} {};", ret_ty, ret_var));
        out.extend(p.varying_locals("    "));
        out.extend(p.body("    "));
        out.push(format!("    return {};", ret_var));
        out.push("}".to_string());
        out.push(String::new());
        out.join("\n")
    }
}

impl Dialect for HlslPolicy {
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

    fn vertex_field(&self, _p: &Printer<'_>, attr: &AttributeRecord, field: &str, _ty: &Type) -> String {
        format!("_vert_data.{}", attribute_name(attr, field))
    }

    fn interface(&self, r: &InterfaceRef) -> String {
        match (r.source, r.side) {
            (Stage::Host, Side::Consumer) => r.field_name(),
            _ => interface_access(r),
        }
    }

    fn binary(&self, p: &Printer<'_>, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> String {
        let matrix = p.catalog.is_matrix(&lhs.ty) || p.catalog.is_matrix(&rhs.ty);
        match op {
            BinaryOp::Mul if matrix => format!("mul({}, {})", p.expr(lhs), p.expr(rhs)),
            BinaryOp::MulAssign if matrix => {
                let target = p.expr(lhs);
                format!("{0} = mul({0}, {1})", target, p.expr(rhs))
            }
            _ => p.infix(op, lhs, rhs),
        }
    }

    fn construct(&self, p: &Printer<'_>, ty: &Type, args: &[Expr]) -> String {
        if let [source] = args {
            let narrowing = p.catalog.identify_type(ty).and_then(BuiltinType::matrix_rows) == Some(3)
                && p.catalog.identify_type(&source.ty).and_then(BuiltinType::matrix_rows) == Some(4);
            if narrowing {
                return format!("float4x4_to_float3x3({})", p.expr(source));
            }
        }
        format!("{}({})", p.type_name(ty), p.args(args))
    }

    fn sample(&self, p: &Printer<'_>, call: &Expr, texture: &Expr, args: &[Expr]) -> String {
        let coord = args.first().map(|a| p.expr(a)).unwrap_or_default();
        format!(
            "{}.Sample(_sampler{}, {})",
            p.operand(texture),
            p.sampler_of(call),
            coord
        )
    }
}

