//! Printing: turns finalized stages into shading-language source.
//!
//! Each target language implements `ShaderPolicy` to lay out a stage's
//! interface blocks, resources and entry point, and `Dialect` to control
//! how expressions are spelled. The expression walk itself is shared in
//! `Printer`.

mod glsl;
pub(crate) mod host;
mod hlsl;
mod metal;
#[cfg(test)]
mod tests;

pub use glsl::GlslPolicy;
pub use hlsl::HlslPolicy;
pub use metal::MetalPolicy;

use crate::ast::{BinaryOp, ConstValue, Expr, ExprKind, InterfaceRef, Literal, ScalarType, Side, Type};
use crate::builtins::{BuiltinFunction, BuiltinType, Catalog, ElemKind, TypeClass};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::stage::Stage;
use crate::stages::{AttributeRecord, StageStmt, Stages};
use crate::target::{SourceLanguage, Target};

/// Generated source of one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageSource {
    pub stage: Stage,
    pub text: String,
}

/// Lays out complete stage programs for one shading language.
pub trait ShaderPolicy {
    fn language(&self) -> SourceLanguage;

    fn supports_stage(&self, _stage: Stage) -> bool {
        true
    }

    /// Source text of `stage`.
    fn print_stage(&self, stages: &Stages, catalog: &Catalog, stage: Stage) -> String;
}

/// Create the printing policy for a target.
pub fn create_policy(target: Target) -> Box<dyn ShaderPolicy> {
    match target.language() {
        SourceLanguage::Glsl => Box::new(GlslPolicy::new()),
        SourceLanguage::Hlsl => Box::new(HlslPolicy::new(target == Target::VulkanSpirv)),
        SourceLanguage::Metal => Box::new(MetalPolicy::new()),
    }
}

impl Stages {
    /// Print every active device stage in pipeline order.
    pub fn print(
        &self,
        policy: &dyn ShaderPolicy,
        catalog: &Catalog,
    ) -> Result<Vec<StageSource>, Diagnostic> {
        let mut sources = Vec::new();
        for stage in self.device_stages() {
            if !policy.supports_stage(stage) {
                return Err(Diagnostic::error(
                    format!(
                        "{} does not support the {} stage",
                        policy.language().name(),
                        stage
                    ),
                    crate::span::Span::dummy(),
                )
                .with_kind(ErrorKind::Structural));
            }
            let text = policy.print_stage(self, catalog, stage);
            log::debug!(
                "{}: {} {} source, {} bytes",
                self.name,
                stage,
                policy.language().name(),
                text.len()
            );
            sources.push(StageSource { stage, text });
        }
        Ok(sources)
    }
}

// ─── Expression spelling ───────────────────────────────────────────

/// Per-language spelling hooks used by [`Printer`].
pub(crate) trait Dialect {
    fn builtin_type(&self, ty: BuiltinType) -> String;
    fn scalar(&self, scalar: ScalarType) -> &'static str;
    fn function(&self, func: BuiltinFunction) -> String;

    fn param(&self, p: &Printer<'_>, index: usize) -> String {
        p.param_name(index)
    }

    /// Access to a field of a vertex or instance buffer.
    fn vertex_field(&self, _p: &Printer<'_>, attr: &AttributeRecord, field: &str, _ty: &Type) -> String {
        attribute_name(attr, field)
    }

    fn interface(&self, r: &InterfaceRef) -> String {
        interface_access(r)
    }

    fn binary(&self, p: &Printer<'_>, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> String {
        p.infix(op, lhs, rhs)
    }

    fn construct(&self, p: &Printer<'_>, ty: &Type, args: &[Expr]) -> String {
        format!("{}({})", p.type_name(ty), p.args(args))
    }

    fn init_list(&self, p: &Printer<'_>, ty: &Type, items: &[Expr]) -> String {
        self.construct(p, ty, items)
    }

    fn swizzle(&self, p: &Printer<'_>, object: &Expr, name: &str) -> String {
        format!("{}.{}", p.operand(object), name)
    }

    fn sample(&self, p: &Printer<'_>, call: &Expr, texture: &Expr, args: &[Expr]) -> String;

    fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Int(v) => v.to_string(),
            Literal::UInt(v) => format!("{}u", v),
            Literal::Float(v) => float_literal(*v),
            Literal::Bool(v) => v.to_string(),
        }
    }

    /// Host-only statements; shader dialects print nothing for them.
    fn host_statement(&self, _p: &Printer<'_>, _stmt: &StageStmt) -> Option<String> {
        None
    }
}

/// Shared expression and statement writer for one stage.
pub(crate) struct Printer<'p> {
    pub stages: &'p Stages,
    pub catalog: &'p Catalog,
    pub stage: Stage,
    dialect: &'p dyn Dialect,
}

impl<'p> Printer<'p> {
    pub fn new(stages: &'p Stages, catalog: &'p Catalog, stage: Stage, dialect: &'p dyn Dialect) -> Self {
        Self { stages, catalog, stage, dialect }
    }

    pub fn param_name(&self, index: usize) -> String {
        self.stages
            .params
            .get(index)
            .map_or_else(|| format!("__param{}", index), |p| p.name.clone())
    }

    pub fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Scalar(s) => self.dialect.scalar(*s).to_string(),
            Type::Decl(id) => match self.catalog.identify_type(ty) {
                Some(builtin) => self.dialect.builtin_type(builtin),
                None => format!("__decl{}", id.0),
            },
        }
    }

    pub fn expr(&self, expr: &Expr) -> String {
        let d = self.dialect;
        match &expr.kind {
            ExprKind::Literal(literal) => d.literal(literal),
            ExprKind::Constant(value) => self.constant(value),
            ExprKind::Param(index) => d.param(self, *index),
            ExprKind::Local { name, .. } => name.clone(),
            ExprKind::Binary { op, lhs, rhs } => d.binary(self, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => format!("{}{}", op.as_str(), self.operand(operand)),
            ExprKind::Construct(args) => d.construct(self, &expr.ty, args),
            ExprKind::Cast(operand) => format!("{}({})", self.type_name(&expr.ty), self.expr(operand)),
            ExprKind::InitList(items) => d.init_list(self, &expr.ty, items),
            ExprKind::Call { func, args } => {
                let name = match self.catalog.identify_function(*func) {
                    Some(builtin) => d.function(builtin),
                    None => format!("__func{}", func.0),
                };
                format!("{}({})", name, self.args(args))
            }
            ExprKind::MethodCall { method, object, args } => {
                match self.catalog.identify_method(*method) {
                    Some(m) if m.is_swizzle() => d.swizzle(self, object, m.name()),
                    _ => d.sample(self, expr, object, args),
                }
            }
            ExprKind::Member { base, field } => {
                if let ExprKind::Param(index) = base.kind {
                    if let Some(attr) = self.stages.attribute(index) {
                        return d.vertex_field(self, attr, field, &expr.ty);
                    }
                }
                format!("{}.{}", self.operand(base), field)
            }
            ExprKind::Interface(r) => d.interface(r),
            ExprKind::Unsupported { construct } => format!("/* {} */", construct),
        }
    }

    /// An operand of a larger expression; nested operators are parenthesized.
    pub fn operand(&self, expr: &Expr) -> String {
        match expr.kind {
            ExprKind::Binary { .. } => format!("({})", self.expr(expr)),
            _ => self.expr(expr),
        }
    }

    pub fn args(&self, args: &[Expr]) -> String {
        args.iter()
            .map(|a| self.expr(a))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn infix(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> String {
        if op.is_assignment() {
            format!("{} {} {}", self.expr(lhs), op.as_str(), self.expr(rhs))
        } else {
            format!("{} {} {}", self.operand(lhs), op.as_str(), self.operand(rhs))
        }
    }

    fn constant(&self, value: &ConstValue) -> String {
        match value {
            ConstValue::Int(v) => v.to_string(),
            ConstValue::Float(v) => float_literal(*v),
            ConstValue::Bool(v) => v.to_string(),
            ConstValue::Struct(fields) => {
                let fields: Vec<String> = fields.iter().map(|f| self.constant(f)).collect();
                format!("{{{}}}", fields.join(", "))
            }
        }
    }

    /// Sampler index resolved for a traced sample call.
    pub fn sampler_of(&self, call: &Expr) -> usize {
        match self.stages.sample_call(call.id) {
            Some(c) => c.sampler,
            None => {
                log::warn!("{}: sample call without a resolved sampler", self.stages.name);
                0
            }
        }
    }

    pub fn statement(&self, stmt: &StageStmt) -> Option<String> {
        match stmt {
            StageStmt::Decl(decl) => Some(format!(
                "{} {} = {};",
                self.type_name(&decl.ty),
                decl.name,
                self.expr(&decl.init)
            )),
            StageStmt::Expr(expr) => Some(format!("{};", self.expr(expr))),
            StageStmt::BindingDecl(_) | StageStmt::PushUniform(_) => {
                self.dialect.host_statement(self, stmt)
            }
        }
    }

    /// The stage's statements, one indented line each.
    pub fn body(&self, indent: &str) -> Vec<String> {
        self.stages
            .block(self.stage)
            .iter()
            .filter_map(|s| self.statement(s))
            .map(|s| format!("{}{}", indent, s))
            .collect()
    }

    /// Varying parameters of this stage, declared as locals of the entry point.
    pub fn varying_locals(&self, indent: &str) -> Vec<String> {
        use crate::ast::Role;
        self.stages
            .params
            .iter()
            .filter(|p| {
                matches!(p.role, Role::VaryingInput { stage } | Role::VaryingOutput { stage } if stage == self.stage)
            })
            .map(|p| format!("{}{} {};", indent, self.type_name(&p.ty), p.name))
            .collect()
    }

    pub fn is_integer(&self, ty: &Type) -> bool {
        match ty {
            Type::Scalar(ScalarType::Int(_) | ScalarType::UInt(_)) => true,
            _ => matches!(
                self.catalog.identify_type(ty).map(BuiltinType::class),
                Some(TypeClass::Vector { elem: ElemKind::Int | ElemKind::UInt, .. })
            ),
        }
    }

    /// Binding slot of the host uniform record of `stage`.
    pub fn uniform_binding(&self, stage: Stage) -> usize {
        self.stages.device_stages().take_while(|s| *s != stage).count()
    }
}

/// `<buffer>_<field>`, the name of a vertex attribute.
pub(crate) fn attribute_name(attr: &AttributeRecord, field: &str) -> String {
    format!("{}_{}", attr.name, field)
}

/// `_to_<dest>.<field>` or `_from_<source>.<field>`.
pub(crate) fn interface_access(r: &InterfaceRef) -> String {
    match r.side {
        Side::Producer => format!("_to_{}.{}", r.dest, r.field_name()),
        Side::Consumer => format!("_from_{}.{}", r.source, r.field_name()),
    }
}

pub(crate) fn float_literal(value: f64) -> String {
    format!("{:?}", value)
}
