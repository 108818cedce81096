//! Parameter role and body checks run before stage analysis.
//!
//! Every violation found is reported; analysis of the function only starts
//! when there are none.

use std::collections::HashMap;

use crate::ast::{DeclIndex, Expr, ExprKind, Param, PipelineFn, Role, Stmt, StmtKind};
use crate::builtins::{BuiltinType, Catalog};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::span::Span;
use crate::stage::{Stage, StageMask};
use crate::stages::{AttributeRecord, ColorTargetRecord, InputRate, TextureRecord};

pub const MAX_VERTEX_BUFFERS: i64 = 32;
pub const MAX_TEXTURES: i64 = 32;
pub const MAX_SAMPLERS: usize = 32;
pub const MAX_COLOR_TARGETS: i64 = 8;

/// Resources and active stages of a function that passed validation.
#[derive(Clone, Debug)]
pub struct ValidatedPipeline {
    pub mask: StageMask,
    pub attributes: Vec<AttributeRecord>,
    pub textures: Vec<TextureRecord>,
    pub color_targets: Vec<ColorTargetRecord>,
}

pub fn validate(
    catalog: &Catalog,
    decls: &DeclIndex<'_>,
    func: &PipelineFn,
) -> Result<ValidatedPipeline, Vec<Diagnostic>> {
    let mut v = Validator {
        catalog,
        decls,
        errors: Vec::new(),
        buffer_indices: HashMap::new(),
        texture_indices: HashMap::new(),
        target_indices: HashMap::new(),
        validated: ValidatedPipeline {
            mask: StageMask::host_and_vertex(),
            attributes: Vec::new(),
            textures: Vec::new(),
            color_targets: Vec::new(),
        },
    };
    for (index, param) in func.params.iter().enumerate() {
        v.check_param(index, param);
    }
    v.check_block(&func.body);

    if v.errors.is_empty() {
        log::debug!("{}: active stages {}", func.name, v.validated.mask);
        Ok(v.validated)
    } else {
        Err(v.errors)
    }
}

struct Validator<'a> {
    catalog: &'a Catalog,
    decls: &'a DeclIndex<'a>,
    errors: Vec<Diagnostic>,
    buffer_indices: HashMap<i64, Span>,
    texture_indices: HashMap<(Stage, i64), Span>,
    target_indices: HashMap<i64, Span>,
    validated: ValidatedPipeline,
}

impl Validator<'_> {
    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors
            .push(Diagnostic::error(message.into(), span).with_kind(ErrorKind::ResourceBinding));
    }

    fn is_float4(&self, param: &Param) -> bool {
        self.catalog.identify_type(&param.ty) == BuiltinType::named("float4")
    }

    fn check_param(&mut self, index: usize, param: &Param) {
        if param.role.is_output() {
            self.validated.mask.insert(param.role.stage());
        }
        match param.role {
            Role::VertexBuffer { index: slot } => {
                self.check_buffer(index, param, slot, InputRate::PerVertex)
            }
            Role::InstanceBuffer { index: slot } => {
                self.check_buffer(index, param, slot, InputRate::PerInstance)
            }
            Role::VertexTexture { index: slot } => {
                self.check_texture(index, param, slot, Stage::Vertex)
            }
            Role::FragmentTexture { index: slot } => {
                self.check_texture(index, param, slot, Stage::Fragment)
            }
            Role::Position => {
                if !self.is_float4(param) {
                    self.error("vertex position must be a float4", param.span);
                }
            }
            Role::ColorTarget { index: slot } => self.check_color_target(index, param, slot),
            Role::Captured | Role::VaryingInput { .. } | Role::VaryingOutput { .. } => {}
        }
    }

    fn check_buffer(&mut self, index: usize, param: &Param, slot: i64, rate: InputRate) {
        let Some(fields) = self.decls.record_fields(&param.ty) else {
            self.error("vertex buffer must be a struct or class", param.span);
            return;
        };
        let mut fields_ok = true;
        for field in fields {
            if let Err(e) = self.catalog.check_field_type(&field.ty) {
                let span = if field.span.is_dummy() { param.span } else { field.span };
                self.errors.push(
                    Diagnostic::error(e.message().to_string(), span)
                        .with_kind(ErrorKind::Type)
                        .with_note(format!("in field `{}` of vertex buffer `{}`", field.name, param.name)),
                );
                fields_ok = false;
            }
        }
        if !(0..MAX_VERTEX_BUFFERS).contains(&slot) {
            self.error(
                format!("vertex buffer index must be in range [0,{})", MAX_VERTEX_BUFFERS),
                param.span,
            );
            return;
        }
        if let Some(previous) = self.buffer_indices.get(&slot).copied() {
            self.errors.push(
                Diagnostic::error("vertex buffer index must be unique".to_string(), param.span)
                    .with_kind(ErrorKind::ResourceBinding)
                    .with_label(previous, "previous buffer index here".to_string()),
            );
            return;
        }
        self.buffer_indices.insert(slot, param.span);
        if fields_ok {
            self.validated.attributes.push(AttributeRecord {
                param: index,
                name: param.name.clone(),
                fields: fields.to_vec(),
                rate,
                binding: slot as u32,
            });
        }
    }

    fn check_texture(&mut self, index: usize, param: &Param, slot: i64, stage: Stage) {
        let builtin = self
            .catalog
            .identify_type(&param.ty)
            .filter(|b| b.is_texture());
        let Some(builtin) = builtin else {
            self.error("texture must be a texture* type", param.span);
            return;
        };
        if !(0..MAX_TEXTURES).contains(&slot) {
            self.error(
                format!("texture index must be in range [0,{})", MAX_TEXTURES),
                param.span,
            );
            return;
        }
        if let Some(previous) = self.texture_indices.get(&(stage, slot)).copied() {
            self.errors.push(
                Diagnostic::error("texture index must be unique per stage".to_string(), param.span)
                    .with_kind(ErrorKind::ResourceBinding)
                    .with_label(previous, "previous texture index here".to_string()),
            );
            return;
        }
        self.texture_indices.insert((stage, slot), param.span);
        self.validated.textures.push(TextureRecord {
            param: index,
            name: param.name.clone(),
            class: builtin.class(),
            index: slot as u32,
            stages: StageMask::empty(),
        });
    }

    fn check_color_target(&mut self, index: usize, param: &Param, slot: i64) {
        if !self.is_float4(param) {
            self.error("fragment color target must be a float4", param.span);
        }
        if !(0..MAX_COLOR_TARGETS).contains(&slot) {
            self.error(
                format!("color target index must be in range [0,{})", MAX_COLOR_TARGETS),
                param.span,
            );
            return;
        }
        if let Some(previous) = self.target_indices.get(&slot).copied() {
            self.errors.push(
                Diagnostic::error("color target index must be unique".to_string(), param.span)
                    .with_kind(ErrorKind::ResourceBinding)
                    .with_label(previous, "previous color target index here".to_string()),
            );
            return;
        }
        self.target_indices.insert(slot, param.span);
        self.validated.color_targets.push(ColorTargetRecord {
            param: index,
            name: param.name.clone(),
            index: slot as u32,
        });
    }

    // ─── Body ──────────────────────────────────────────────────────

    fn unsupported(&mut self, what: &str, construct: &str, span: Span) {
        self.errors.push(
            Diagnostic::error(format!("{} of type {} are not supported", what, construct), span)
                .with_kind(ErrorKind::Structural),
        );
    }

    fn check_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Decl { init: Some(init), .. } => self.check_expr(init),
                StmtKind::Decl { name, .. } => self.errors.push(
                    Diagnostic::error(
                        format!("local `{}` must be declared with a single initializer", name),
                        stmt.span,
                    )
                    .with_kind(ErrorKind::Structural),
                ),
                StmtKind::Expr(expr) => self.check_expr(expr),
                StmtKind::Block(stmts) => self.check_block(stmts),
                StmtKind::Null => {}
                StmtKind::Unsupported { construct } => {
                    self.unsupported("statements", construct, stmt.span)
                }
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast(operand) => self.check_expr(operand),
            ExprKind::Member { base, .. } => self.check_expr(base),
            ExprKind::Construct(args) | ExprKind::InitList(args) | ExprKind::Call { args, .. } => {
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::MethodCall { object, args, .. } => {
                self.check_expr(object);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            ExprKind::Unsupported { construct } => {
                self.unsupported("expressions", construct, expr.span)
            }
            ExprKind::Literal(_)
            | ExprKind::Constant(_)
            | ExprKind::Param(_)
            | ExprKind::Local { .. }
            | ExprKind::Interface(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;

    fn run(b: &AstBuilder, func: &PipelineFn) -> Result<ValidatedPipeline, Vec<Diagnostic>> {
        let catalog = Catalog::build(b.declarations()).unwrap();
        let decls = DeclIndex::new(b.declarations());
        validate(&catalog, &decls, func)
    }

    #[test]
    fn test_buffer_index_out_of_range() {
        let mut b = AstBuilder::with_runtime();
        let f3 = b.ty("float3");
        let vert = b.record("Vert", &[("position", f3)]);
        let params = vec![b.param("v", vert, Role::VertexBuffer { index: 32 })];
        let func = b.pipeline("hsh_Draw", params, Vec::new());
        let errors = run(&b, &func).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "vertex buffer index must be in range [0,32)");
        assert_eq!(errors[0].kind, Some(ErrorKind::ResourceBinding));
    }

    #[test]
    fn test_reports_every_violation() {
        let mut b = AstBuilder::with_runtime();
        let f3 = b.ty("float3");
        let f2 = b.ty("float2");
        let vert = b.record("Vert", &[("position", f3)]);
        let bad = b.record("Bad", &[("flag", crate::ast::Type::BOOL)]);
        let tex = b.ty("texture2d<float>");
        let params = vec![
            b.param("a", vert, Role::VertexBuffer { index: 0 }),
            b.param("b", vert, Role::InstanceBuffer { index: 0 }),
            b.param("c", bad, Role::VertexBuffer { index: 1 }),
            b.param("t", tex, Role::FragmentTexture { index: 0 }),
            b.param("u", tex, Role::FragmentTexture { index: 0 }),
            b.param("n", f2, Role::FragmentTexture { index: 1 }),
            b.param("color", f3, Role::ColorTarget { index: 8 }),
        ];
        let func = b.pipeline("hsh_Bad", params, Vec::new());
        let errors = run(&b, &func).unwrap_err();
        let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.contains(&"vertex buffer index must be unique"));
        assert!(messages.contains(&"hsh record fields must be a builtin hsh vector or matrix, float, double, or 32-bit integer"));
        assert!(messages.contains(&"texture index must be unique per stage"));
        assert!(messages.contains(&"texture must be a texture* type"));
        assert!(messages.contains(&"fragment color target must be a float4"));
        assert!(messages.contains(&"color target index must be in range [0,8)"));
        let dup = errors
            .iter()
            .find(|e| e.message == "vertex buffer index must be unique")
            .unwrap();
        assert_eq!(dup.labels[0].1, "previous buffer index here");
    }

    #[test]
    fn test_same_texture_index_in_different_stages() {
        let mut b = AstBuilder::with_runtime();
        let tex = b.ty("texture2d<float>");
        let params = vec![
            b.param("height", tex, Role::VertexTexture { index: 0 }),
            b.param("albedo", tex, Role::FragmentTexture { index: 0 }),
        ];
        let func = b.pipeline("hsh_Tex", params, Vec::new());
        let validated = run(&b, &func).unwrap();
        assert_eq!(validated.textures.len(), 2);
        assert!(validated.textures.iter().all(|t| t.stages == StageMask::empty()));
    }

    #[test]
    fn test_stage_mask_from_outputs() {
        let mut b = AstBuilder::with_runtime();
        let f4 = b.ty("float4");
        let params = vec![
            b.param("position", f4, Role::Position),
            b.param("color", f4, Role::ColorTarget { index: 0 }),
        ];
        let func = b.pipeline("hsh_Mask", params, Vec::new());
        let validated = run(&b, &func).unwrap();
        assert_eq!(validated.mask.to_string(), "{host, vertex, fragment}");
        assert_eq!(validated.color_targets[0].index, 0);
    }

    #[test]
    fn test_unsupported_constructs() {
        let mut b = AstBuilder::with_runtime();
        let f4 = b.ty("float4");
        let params = vec![b.param("color", f4, Role::ColorTarget { index: 0 })];
        let lhs = b.arg(&params, 0);
        let rhs = b.unsupported_expr("ConditionalOperator", f4);
        let write = b.assign(lhs, rhs);
        let stmt = b.unsupported_stmt("ForStmt");
        let func = b.pipeline("hsh_Loop", params, vec![stmt, write]);
        let errors = run(&b, &func).unwrap_err();
        assert_eq!(errors[0].message, "statements of type ForStmt are not supported");
        assert_eq!(errors[1].message, "expressions of type ConditionalOperator are not supported");
        assert!(errors.iter().all(|e| e.kind == Some(ErrorKind::Structural)));
    }
}
