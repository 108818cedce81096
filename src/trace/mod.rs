//! Value/stage tracer.
//!
//! Starting from the last write to each output parameter, the tracer walks
//! the expression tree backwards through local assignments and decides the
//! earliest stage able to compute every sub-expression. Sub-expressions
//! whose stage differs from their consumer are promoted through the stage
//! builder, which rewrites them into interface field references. The
//! rewritten statements land in the stage lists of the builder.

pub(crate) mod assign;

use crate::ast::{BinaryOp, DeclId, Expr, ExprKind, NodeId, PipelineFn, Role, StmtKind};
use crate::builtins::Catalog;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::span::Span;
use crate::stage::{stage_name, Stage};
use crate::stages::{LocalDecl, StageStmt, StagesBuilder};

use self::assign::{AssignScope, AssignSite, VarRef};

type Traced = (Expr, Option<Stage>);

/// Trace every output of the builder's function, stage by stage.
pub fn trace_outputs(builder: &mut StagesBuilder<'_>) -> Result<(), Diagnostic> {
    let func = builder.function();
    let mask = builder.mask();
    for stage in mask.device_stages() {
        for (index, param) in func.params.iter().enumerate() {
            if !param.role.is_output() || param.role.stage() != stage {
                continue;
            }
            let Some(found) = AssignScope::whole(&func.body).find(VarRef::Param(index)) else {
                log::warn!("{}: output `{}` is never written", func.name, param.name);
                continue;
            };
            if let AssignSite::Expr(expr) = found.site {
                ValueTracer::new(builder, func, stage).trace(expr, found.statement)?;
            }
        }
    }
    Ok(())
}

pub struct ValueTracer<'b, 'a> {
    builder: &'b mut StagesBuilder<'a>,
    func: &'a PipelineFn,
    catalog: &'a Catalog,
    target: Stage,
}

impl<'b, 'a> ValueTracer<'b, 'a> {
    pub fn new(builder: &'b mut StagesBuilder<'a>, func: &'a PipelineFn, target: Stage) -> Self {
        let catalog = builder.catalog();
        Self { builder, func, catalog, target }
    }

    /// Trace the assignment `expr` found in the top-level statement
    /// `statement` into the target stage.
    pub fn trace(&mut self, expr: &Expr, statement: NodeId) -> Result<(), Diagnostic> {
        let scope = AssignScope {
            body: &self.func.body,
            end: Some(statement),
        };
        let (expr, stage) = self.visit(expr, scope, false)?;
        if stage > Some(self.target) {
            return Err(Diagnostic::error(
                format!(
                    "value computed in the {} stage cannot be assigned in the {} stage",
                    stage_name(stage),
                    self.target
                ),
                expr.span,
            )
            .with_kind(ErrorKind::Structural));
        }
        let expr = self.builder.promote(expr, stage, Some(self.target), scope)?;
        self.builder
            .add_statement(self.target, StageStmt::Expr(expr), None);
        Ok(())
    }

    /// Interpolated values reach the target through a varying.
    fn interpolated(&self, stage: Option<Stage>) -> bool {
        stage.is_some_and(|s| s != Stage::Host && s < self.target)
    }

    fn visit(
        &mut self,
        expr: &Expr,
        scope: AssignScope<'a>,
        in_member: bool,
    ) -> Result<Traced, Diagnostic> {
        let rebuild = |kind: ExprKind| Expr {
            id: expr.id,
            kind,
            ty: expr.ty,
            span: expr.span,
        };
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Constant(_) => Ok((expr.clone(), None)),

            ExprKind::Param(index) => {
                let param = self.func.params.get(*index).ok_or_else(|| {
                    structural(format!("reference to unknown parameter {}", index), expr.span)
                })?;
                if !in_member {
                    self.check_value_type(expr)?;
                }
                if param.role == Role::Captured {
                    self.check_capture(*index)?;
                    self.builder.register_capture(*index);
                }
                Ok((expr.clone(), Some(param.role.stage())))
            }

            ExprKind::Local { local, name } => {
                if !in_member {
                    self.check_value_type(expr)?;
                }
                let found = scope.find(VarRef::Local(*local)).ok_or_else(|| {
                    structural(
                        format!(
                            "unsupported reference to `{}`: no assignment reaches this use",
                            name
                        ),
                        expr.span,
                    )
                })?;
                let inner = scope.before(&found);
                let stage = match found.site {
                    AssignSite::Decl(stmt) => {
                        let StmtKind::Decl { init: Some(init), ty, .. } = &stmt.kind else {
                            return Err(structural(
                                format!("`{}` is declared without a value", name),
                                stmt.span,
                            ));
                        };
                        let (init, stage) = self.visit(init, inner, false)?;
                        // Constant locals are declared where they are needed.
                        let stage = stage.unwrap_or(self.target);
                        let decl = LocalDecl {
                            local: *local,
                            name: name.clone(),
                            ty: *ty,
                            init,
                        };
                        self.builder.register_replaced_decl(stmt.id, stage, decl.clone());
                        self.builder
                            .add_statement(stage, StageStmt::Decl(decl), Some(stmt.id));
                        stage
                    }
                    AssignSite::Expr(assign) => {
                        let (assign, stage) = self.visit(assign, inner, false)?;
                        let stage = stage.unwrap_or(self.target);
                        self.builder
                            .add_statement(stage, StageStmt::Expr(assign), Some(found.statement));
                        stage
                    }
                };
                Ok((expr.clone(), Some(stage)))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let (lhs, ls) = self.visit(lhs, scope, false)?;
                let (rhs, rs) = self.visit(rhs, scope, false)?;
                let mut stage = ls.max(rs);
                let force = match op {
                    BinaryOp::Add
                    | BinaryOp::Sub
                    | BinaryOp::Mul
                    | BinaryOp::Assign
                    | BinaryOp::AddAssign
                    | BinaryOp::SubAssign
                    | BinaryOp::MulAssign => false,
                    BinaryOp::Div | BinaryOp::DivAssign => self.interpolated(rs),
                    _ => self.interpolated(ls) != self.interpolated(rs),
                };
                if force {
                    stage = stage.max(Some(self.target));
                }
                let lhs = self.builder.promote(lhs, ls, stage, scope)?;
                let rhs = self.builder.promote(rhs, rs, stage, scope)?;
                Ok((
                    rebuild(ExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    }),
                    stage,
                ))
            }

            ExprKind::Unary { op, operand } => {
                let (operand, stage) = self.visit(operand, scope, false)?;
                Ok((
                    rebuild(ExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    }),
                    stage,
                ))
            }

            ExprKind::Cast(operand) => {
                if self.catalog.identify_type(&expr.ty).is_none() && expr.ty.scalar().is_none() {
                    return Err(type_error("type casts are limited to hsh types", expr.span));
                }
                let (operand, stage) = self.visit(operand, scope, false)?;
                Ok((rebuild(ExprKind::Cast(Box::new(operand))), stage))
            }

            ExprKind::Construct(args) => {
                if self.catalog.identify_type(&expr.ty).is_none() {
                    return Err(type_error("constructors are limited to hsh types", expr.span));
                }
                let traced = self.visit_range(args, scope)?;
                let stage = max_stage(&traced);
                let args = self.promote_range(traced, stage, scope)?;
                Ok((rebuild(ExprKind::Construct(args)), stage))
            }

            ExprKind::InitList(items) => {
                let traced = self.visit_range(items, scope)?;
                let stage = max_stage(&traced);
                let items = self.promote_range(traced, stage, scope)?;
                Ok((rebuild(ExprKind::InitList(items)), stage))
            }

            ExprKind::Call { func, args } => {
                let builtin = self.catalog.identify_function(*func).ok_or_else(|| {
                    type_error("function calls are limited to hsh intrinsics", expr.span)
                })?;
                let traced = self.visit_range(args, scope)?;
                let mut stage = max_stage(&traced);
                if let [(_, a), (_, b)] = traced.as_slice() {
                    let split = self.interpolated(*a) != self.interpolated(*b);
                    if split && !builtin.is_interp_distributed() {
                        stage = stage.max(Some(self.target));
                    }
                }
                let args = self.promote_range(traced, stage, scope)?;
                Ok((rebuild(ExprKind::Call { func: *func, args }), stage))
            }

            ExprKind::MethodCall { method, object, args } => {
                let builtin = self.catalog.identify_method(*method).ok_or_else(|| {
                    type_error("method calls are limited to hsh intrinsics", expr.span)
                })?;
                if builtin.is_sample() {
                    return self.visit_sample(expr, *method, object, args, scope);
                }
                let (object, stage) = self.visit(object, scope, false)?;
                let args = args
                    .iter()
                    .map(|a| self.visit(a, scope, false).map(|(e, _)| e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((
                    rebuild(ExprKind::MethodCall {
                        method: *method,
                        object: Box::new(object),
                        args,
                    }),
                    stage,
                ))
            }

            ExprKind::Member { base, field } => {
                if !in_member {
                    self.check_value_type(expr)?;
                }
                let (base, stage) = self.visit(base, scope, true)?;
                Ok((
                    rebuild(ExprKind::Member {
                        base: Box::new(base),
                        field: field.clone(),
                    }),
                    stage,
                ))
            }

            ExprKind::Interface(_) => Err(structural(
                "expressions of type InterfaceReference are not supported".to_string(),
                expr.span,
            )),
            ExprKind::Unsupported { construct } => Err(structural(
                format!("expressions of type {} are not supported", construct),
                expr.span,
            )),
        }
    }

    /// `texture.sample(uv, sampler)`: runs in the texture's stage.
    fn visit_sample(
        &mut self,
        expr: &Expr,
        method: DeclId,
        object: &Expr,
        args: &[Expr],
        scope: AssignScope<'a>,
    ) -> Result<Traced, Diagnostic> {
        let ExprKind::Param(texture) = object.kind else {
            return Err(structural(
                "texture samples must be performed on pipeline parameters".to_string(),
                object.span,
            ));
        };
        let stage = match self.func.params.get(texture).map(|p| p.role) {
            Some(Role::VertexTexture { .. }) => Stage::Vertex,
            Some(Role::FragmentTexture { .. }) => Stage::Fragment,
            _ => {
                return Err(structural(
                    "sampled textures must be attributed as vertex or fragment textures".to_string(),
                    object.span,
                ))
            }
        };
        let [uv, sampler] = args else {
            return Err(structural(
                "texture samples take a coordinate and a sampler".to_string(),
                expr.span,
            ));
        };
        let (uv, uv_stage) = self.visit(uv, scope, false)?;
        let uv = self.builder.promote(uv, uv_stage, Some(stage), scope)?;

        let id = self.builder.fresh_id();
        self.builder.register_sample_call(stage, id, texture, sampler)?;
        let rebuilt = Expr {
            id,
            kind: ExprKind::MethodCall {
                method,
                object: Box::new(object.clone()),
                args: vec![uv, sampler.clone()],
            },
            ty: expr.ty,
            span: expr.span,
        };
        Ok((rebuilt, Some(stage)))
    }

    fn visit_range(
        &mut self,
        exprs: &[Expr],
        scope: AssignScope<'a>,
    ) -> Result<Vec<Traced>, Diagnostic> {
        exprs.iter().map(|e| self.visit(e, scope, false)).collect()
    }

    fn promote_range(
        &mut self,
        traced: Vec<Traced>,
        stage: Option<Stage>,
        scope: AssignScope<'a>,
    ) -> Result<Vec<Expr>, Diagnostic> {
        traced
            .into_iter()
            .map(|(e, s)| self.builder.promote(e, s, stage, scope))
            .collect()
    }

    fn check_value_type(&self, expr: &Expr) -> Result<(), Diagnostic> {
        if self.catalog.is_value_type(&expr.ty) {
            Ok(())
        } else {
            Err(type_error("references to values are limited to hsh types", expr.span))
        }
    }

    /// Captured values are copied into uniform records field by field.
    fn check_capture(&self, index: usize) -> Result<(), Diagnostic> {
        let param = &self.func.params[index];
        let decls = self.builder.decls();
        let result = match decls.record_fields(&param.ty) {
            Some(fields) => fields
                .iter()
                .try_for_each(|f| self.catalog.check_field_type(&f.ty)),
            None => self.catalog.check_field_type(&param.ty),
        };
        result.map_err(|e| {
            type_error(e.message(), param.span)
                .with_note(format!("`{}` is captured from the host", param.name))
        })
    }
}

fn max_stage(traced: &[Traced]) -> Option<Stage> {
    traced.iter().map(|(_, s)| *s).max().flatten()
}

fn structural(message: String, span: Span) -> Diagnostic {
    Diagnostic::error(message, span).with_kind(ErrorKind::Structural)
}

fn type_error(message: &str, span: Span) -> Diagnostic {
    Diagnostic::error(message.to_string(), span).with_kind(ErrorKind::Type)
}
