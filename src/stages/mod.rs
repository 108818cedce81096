//! Per-function stage state: interface records, statement lists and
//! resource bookkeeping.
//!
//! The tracer drives a [`StagesBuilder`] while it walks the outputs of a
//! pipeline function. Values that cross from one stage to a later one are
//! routed through interface records one active stage boundary at a time.
//! [`StagesBuilder::finalize`] freezes everything into [`Stages`], which
//! the printing policies and the header emitter read.

mod layout;
mod record;
mod resources;

pub use record::{InterfaceField, InterfaceRecord};
pub use resources::{
    AttributeRecord, ColorTargetRecord, InputRate, SampleCall, SamplerArgError, SamplerConfig,
    SamplerRecord, TextureRecord, VertexAttribute, VertexBinding, VertexFormat,
};

pub(crate) use layout::slot_count;

use std::collections::HashMap;

use crate::ast::{
    BinaryOp, DeclIndex, Expr, ExprKind, InterfaceRef, LocalId, NodeId, Param, PipelineFn, Side,
    Stmt, StmtKind, Type,
};
use crate::builtins::Catalog;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::span::Span;
use crate::stage::{Stage, StageMask, STAGE_COUNT};
use crate::trace::assign::{AssignScope, AssignSite, VarRef};
use crate::validate::{ValidatedPipeline, MAX_SAMPLERS};

/// A local declaration as placed in one stage.
#[derive(Clone, Debug)]
pub struct LocalDecl {
    pub local: LocalId,
    pub name: String,
    pub ty: Type,
    pub init: Expr,
}

impl LocalDecl {
    fn from_stmt(stmt: &Stmt) -> Option<LocalDecl> {
        match &stmt.kind {
            StmtKind::Decl { local, name, ty, init: Some(init) } => Some(LocalDecl {
                local: *local,
                name: name.clone(),
                ty: *ty,
                init: init.clone(),
            }),
            _ => None,
        }
    }
}

/// One statement of a stage's block.
#[derive(Clone, Debug)]
pub enum StageStmt {
    Decl(LocalDecl),
    Expr(Expr),
    /// Host only: declaration of the uniform binding for a stage.
    BindingDecl(Stage),
    /// Host only: hands the binding of a stage to the runtime.
    PushUniform(Stage),
}

#[derive(Clone, Debug)]
struct StageEntry {
    stmt: StageStmt,
    /// Source statement the entry was traced from.
    origin: Option<NodeId>,
    /// Live uses of a declaration; it leaves the stage at zero.
    uses: u32,
}

/// Mutable stage state of one pipeline function.
pub struct StagesBuilder<'a> {
    catalog: &'a Catalog,
    decls: &'a DeclIndex<'a>,
    func: &'a PipelineFn,
    mask: StageMask,
    /// Host to stage uniform records, indexed by destination stage.
    host_records: [Option<InterfaceRecord>; STAGE_COUNT],
    /// Stage to stage varying records, indexed by destination stage.
    inter_records: [Option<InterfaceRecord>; STAGE_COUNT],
    lists: [Vec<StageEntry>; STAGE_COUNT],
    /// Declaration statement -> its rewritten copy per stage.
    replaced: HashMap<NodeId, [Option<LocalDecl>; STAGE_COUNT]>,
    next_id: u32,
    captures: Vec<usize>,
    attributes: Vec<AttributeRecord>,
    textures: Vec<TextureRecord>,
    samplers: Vec<SamplerRecord>,
    color_targets: Vec<ColorTargetRecord>,
    sample_calls: Vec<SampleCall>,
}

impl<'a> StagesBuilder<'a> {
    pub fn new(
        catalog: &'a Catalog,
        decls: &'a DeclIndex<'a>,
        func: &'a PipelineFn,
        validated: ValidatedPipeline,
    ) -> Self {
        let mask = validated.mask;
        let mut host_records: [Option<InterfaceRecord>; STAGE_COUNT] = Default::default();
        let mut inter_records: [Option<InterfaceRecord>; STAGE_COUNT] = Default::default();
        let mut previous = None;
        for stage in mask.device_stages() {
            host_records[stage.index()] = Some(InterfaceRecord::new(Stage::Host, stage));
            if let Some(source) = previous {
                inter_records[stage.index()] = Some(InterfaceRecord::new(source, stage));
            }
            previous = Some(stage);
        }
        Self {
            catalog,
            decls,
            func,
            mask,
            host_records,
            inter_records,
            lists: Default::default(),
            replaced: HashMap::new(),
            next_id: max_node_id(&func.body) + 1,
            captures: Vec::new(),
            attributes: validated.attributes,
            textures: validated.textures,
            samplers: Vec::new(),
            color_targets: validated.color_targets,
            sample_calls: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn decls(&self) -> &'a DeclIndex<'a> {
        self.decls
    }

    pub fn function(&self) -> &'a PipelineFn {
        self.func
    }

    pub fn mask(&self) -> StageMask {
        self.mask
    }

    pub fn textures(&self) -> &[TextureRecord] {
        &self.textures
    }

    pub fn samplers(&self) -> &[SamplerRecord] {
        &self.samplers
    }

    pub fn host_record(&self, dest: Stage) -> Option<&InterfaceRecord> {
        self.host_records[dest.index()].as_ref()
    }

    /// Varying record arriving at `dest`.
    pub fn inter_record(&self, dest: Stage) -> Option<&InterfaceRecord> {
        self.inter_records[dest.index()].as_ref()
    }

    /// Statements currently queued for `stage`.
    pub fn statements(&self, stage: Stage) -> impl Iterator<Item = &StageStmt> {
        self.lists[stage.index()].iter().map(|e| &e.stmt)
    }

    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    // ─── Statement lists ───────────────────────────────────────────

    /// Queue `stmt` for `stage`. A statement already queued for its
    /// origin only gains a use; a synthesized statement already queued
    /// with the same value is not queued twice.
    pub fn add_statement(&mut self, stage: Stage, stmt: StageStmt, origin: Option<NodeId>) {
        let list = &mut self.lists[stage.index()];
        if let Some(origin) = origin {
            if let Some(entry) = list.iter_mut().find(|e| e.origin == Some(origin)) {
                entry.uses += 1;
                return;
            }
        } else if list
            .iter()
            .any(|e| e.origin.is_none() && same_stmt(&e.stmt, &stmt))
        {
            return;
        }
        list.push(StageEntry { stmt, origin, uses: 1 });
    }

    /// Move one use of a declaration from `from` to `to`.
    pub fn lift_declaration(&mut self, decl: LocalDecl, from: Stage, to: Stage, origin: NodeId) {
        log::trace!("lifting `{}` from {} to {}", decl.name, from, to);
        self.add_statement(to, StageStmt::Decl(decl), Some(origin));
        let list = &mut self.lists[from.index()];
        if let Some(pos) = list.iter().position(|e| e.origin == Some(origin)) {
            list[pos].uses -= 1;
            if list[pos].uses == 0 {
                list.remove(pos);
            }
        }
    }

    pub fn register_replaced_decl(&mut self, stmt: NodeId, stage: Stage, decl: LocalDecl) {
        self.replaced.entry(stmt).or_default()[stage.index()] = Some(decl);
    }

    pub fn replaced_decl(&self, stmt: NodeId, stage: Stage) -> Option<&LocalDecl> {
        self.replaced.get(&stmt)?[stage.index()].as_ref()
    }

    // ─── Promotion ─────────────────────────────────────────────────

    /// Make a value computed in `from` available in `to`.
    ///
    /// Values without a stage, and values already in `to`, are returned
    /// unchanged. Moving a value backwards is an error.
    pub fn promote(
        &mut self,
        expr: Expr,
        from: Option<Stage>,
        to: Option<Stage>,
        scope: AssignScope<'_>,
    ) -> Result<Expr, Diagnostic> {
        let (Some(from), Some(to)) = (from, to) else {
            return Ok(expr);
        };
        if from == to {
            return Ok(expr);
        }
        if from > to {
            return Err(stage_order_error(from, to, expr.span));
        }
        self.lift(expr, from, to, scope)
    }

    fn lift(
        &mut self,
        expr: Expr,
        from: Stage,
        to: Stage,
        scope: AssignScope<'_>,
    ) -> Result<Expr, Diagnostic> {
        let Expr { id, kind, ty, span } = expr;
        let kind = match kind {
            leaf @ (ExprKind::Literal(_) | ExprKind::Constant(_)) => leaf,
            ExprKind::Construct(args) => ExprKind::Construct(self.lift_all(args, from, to, scope)?),
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op,
                operand: Box::new(self.lift(*operand, from, to, scope)?),
            },
            ExprKind::Cast(operand) => {
                ExprKind::Cast(Box::new(self.lift(*operand, from, to, scope)?))
            }
            ExprKind::Local { local, name } => {
                let expr = Expr { id, kind: ExprKind::Local { local, name }, ty, span };
                return self.lift_local(expr, local, from, to, scope);
            }
            other => return self.transfer(Expr { id, kind: other, ty, span }, from, to, scope),
        };
        Ok(Expr { id, kind, ty, span })
    }

    fn lift_all(
        &mut self,
        exprs: Vec<Expr>,
        from: Stage,
        to: Stage,
        scope: AssignScope<'_>,
    ) -> Result<Vec<Expr>, Diagnostic> {
        exprs
            .into_iter()
            .map(|e| self.lift(e, from, to, scope))
            .collect()
    }

    /// Re-declare a local in the later stage when its declaration is its
    /// last assignment; otherwise pass its value across.
    fn lift_local(
        &mut self,
        expr: Expr,
        local: LocalId,
        from: Stage,
        to: Stage,
        scope: AssignScope<'_>,
    ) -> Result<Expr, Diagnostic> {
        let Some(found) = scope.find(VarRef::Local(local)) else {
            return self.transfer(expr, from, to, scope);
        };
        let AssignSite::Decl(stmt) = found.site else {
            return self.transfer(expr, from, to, scope);
        };
        let decl = match self.replaced_decl(stmt.id, from) {
            Some(decl) => decl.clone(),
            None => match LocalDecl::from_stmt(stmt) {
                Some(decl) => decl,
                None => return self.transfer(expr, from, to, scope),
            },
        };
        let init = self.lift(decl.init, from, to, scope.before(&found))?;
        let lifted = LocalDecl { init, ..decl };
        self.register_replaced_decl(stmt.id, to, lifted.clone());
        self.lift_declaration(lifted, from, to, stmt.id);
        Ok(expr)
    }

    /// Route a value through interface records, one active stage at a time.
    ///
    /// A value reading locals is keyed by the assignments reaching them, and
    /// its copy into the record is queued right after the latest of those
    /// assignments in the producing stage.
    fn transfer(
        &mut self,
        expr: Expr,
        from: Stage,
        to: Stage,
        scope: AssignScope<'_>,
    ) -> Result<Expr, Diagnostic> {
        let span = expr.span;
        let ty = expr.ty;
        if from == Stage::Host {
            let reaching = reaching_assignments(&expr, scope);
            let Some(record) = self.host_records[to.index()].as_mut() else {
                return Err(missing_record(Stage::Host, to, span));
            };
            let (field, created) = record.create_or_find_field(&expr, &reaching);
            if created {
                let producer = self.interface_expr(Stage::Host, to, Side::Producer, field, ty, span);
                let assign = self.assign_expr(producer, expr);
                self.add_producer(Stage::Host, assign, &reaching);
            }
            return Ok(self.interface_expr(Stage::Host, to, Side::Consumer, field, ty, span));
        }

        let hops: Vec<Stage> = self
            .mask
            .device_stages()
            .filter(|s| *s > from && *s <= to)
            .collect();
        if hops.last() != Some(&to) {
            return Err(missing_record(from, to, span));
        }
        let mut source = from;
        let mut value = expr;
        for dest in hops {
            // Only the first hop reads locals; later hops forward a field.
            let reaching = reaching_assignments(&value, scope);
            let Some(record) = self.inter_records[dest.index()].as_mut() else {
                return Err(missing_record(source, dest, span));
            };
            let (field, created) = record.create_or_find_field(&value, &reaching);
            if created {
                let producer = self.interface_expr(source, dest, Side::Producer, field, ty, span);
                let assign = self.assign_expr(producer, value);
                self.add_producer(source, assign, &reaching);
            }
            value = self.interface_expr(source, dest, Side::Consumer, field, ty, span);
            source = dest;
        }
        Ok(value)
    }

    fn add_producer(&mut self, stage: Stage, assign: Expr, reaching: &[NodeId]) {
        let list = &mut self.lists[stage.index()];
        let entry = StageEntry { stmt: StageStmt::Expr(assign), origin: None, uses: 1 };
        match list
            .iter()
            .rposition(|e| e.origin.is_some_and(|o| reaching.contains(&o)))
        {
            Some(pos) => list.insert(pos + 1, entry),
            None => list.push(entry),
        }
    }

    fn interface_expr(
        &mut self,
        source: Stage,
        dest: Stage,
        side: Side,
        field: usize,
        ty: Type,
        span: Span,
    ) -> Expr {
        Expr {
            id: self.fresh_id(),
            kind: ExprKind::Interface(InterfaceRef { source, dest, side, field }),
            ty,
            span,
        }
    }

    fn assign_expr(&mut self, lhs: Expr, rhs: Expr) -> Expr {
        let (ty, span) = (lhs.ty, rhs.span);
        Expr {
            id: self.fresh_id(),
            kind: ExprKind::Binary {
                op: BinaryOp::Assign,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        }
    }

    // ─── Resources ─────────────────────────────────────────────────

    /// Record a captured host parameter for the generated constructor.
    pub fn register_capture(&mut self, param: usize) {
        if !self.captures.contains(&param) {
            self.captures.push(param);
        }
    }

    /// Resolve the sampler of a texture sample traced into `stage`.
    pub fn register_sample_call(
        &mut self,
        stage: Stage,
        expr: NodeId,
        texture_param: usize,
        sampler_arg: &Expr,
    ) -> Result<usize, Diagnostic> {
        let config = SamplerConfig::from_expr(sampler_arg).map_err(|e| {
            let message = match e {
                SamplerArgError::NotConstant => "sampler arguments must be constant expressions",
                SamplerArgError::Malformed => "sampler structure is not consistent",
            };
            Diagnostic::error(message.to_string(), sampler_arg.span).with_kind(ErrorKind::Sampler)
        })?;
        let Some(texture) = self.textures.iter().position(|t| t.param == texture_param) else {
            return Err(Diagnostic::error(
                "sampled textures must be attributed as vertex or fragment textures".to_string(),
                sampler_arg.span,
            )
            .with_kind(ErrorKind::Structural));
        };

        let sampler = match self.samplers.iter().position(|s| s.config == config) {
            Some(index) => index,
            None => {
                if self.samplers.len() >= MAX_SAMPLERS {
                    return Err(Diagnostic::error(
                        format!("maximum sampler limit of {} reached", MAX_SAMPLERS),
                        sampler_arg.span,
                    )
                    .with_kind(ErrorKind::Sampler));
                }
                self.samplers.push(SamplerRecord {
                    config,
                    stages: StageMask::empty(),
                });
                self.samplers.len() - 1
            }
        };
        self.samplers[sampler].stages.insert(stage);
        self.textures[texture].stages.insert(stage);
        self.sample_calls.push(SampleCall { expr, texture, sampler, stage });
        Ok(sampler)
    }

    // ─── Finalization ──────────────────────────────────────────────

    /// Freeze records and statement lists.
    pub fn finalize(self) -> Stages {
        let StagesBuilder {
            catalog,
            func,
            mask,
            mut host_records,
            mut inter_records,
            lists,
            mut captures,
            attributes,
            textures,
            samplers,
            color_targets,
            sample_calls,
            ..
        } = self;

        for record in host_records.iter_mut().chain(inter_records.iter_mut()).flatten() {
            record.freeze();
            log::debug!("{}: {} field(s)", record.name(), record.fields().len());
        }

        let mut blocks: [Vec<StageStmt>; STAGE_COUNT] = Default::default();
        for (stage, list) in Stage::ALL.into_iter().zip(lists) {
            blocks[stage.index()] = list.into_iter().map(|e| e.stmt).collect();
        }
        let device: Vec<Stage> = mask.device_stages().collect();
        let host = std::mem::take(&mut blocks[Stage::Host.index()]);
        blocks[Stage::Host.index()] = device
            .iter()
            .map(|s| StageStmt::BindingDecl(*s))
            .chain(host)
            .chain(device.iter().map(|s| StageStmt::PushUniform(*s)))
            .collect();

        captures.sort_unstable();
        let (vertex_bindings, vertex_attributes) = layout::vertex_tables(catalog, &attributes);

        Stages {
            name: func.name.clone(),
            params: func.params.clone(),
            mask,
            host_records,
            inter_records,
            blocks,
            captures,
            attributes,
            textures,
            samplers,
            color_targets,
            sample_calls,
            vertex_bindings,
            vertex_attributes,
        }
    }
}

/// Finalized stage layout of one pipeline function.
#[derive(Clone, Debug)]
pub struct Stages {
    pub name: String,
    pub params: Vec<Param>,
    pub mask: StageMask,
    host_records: [Option<InterfaceRecord>; STAGE_COUNT],
    inter_records: [Option<InterfaceRecord>; STAGE_COUNT],
    blocks: [Vec<StageStmt>; STAGE_COUNT],
    /// Captured parameter indices in declaration order.
    pub captures: Vec<usize>,
    pub attributes: Vec<AttributeRecord>,
    pub textures: Vec<TextureRecord>,
    pub samplers: Vec<SamplerRecord>,
    pub color_targets: Vec<ColorTargetRecord>,
    pub sample_calls: Vec<SampleCall>,
    pub vertex_bindings: Vec<VertexBinding>,
    pub vertex_attributes: Vec<VertexAttribute>,
}

impl Stages {
    /// Uniform record the host fills for `stage`.
    pub fn host_record(&self, stage: Stage) -> Option<&InterfaceRecord> {
        self.host_records[stage.index()].as_ref()
    }

    /// Every host uniform record in stage order.
    pub fn host_records(&self) -> impl Iterator<Item = &InterfaceRecord> {
        self.host_records.iter().flatten()
    }

    /// Varying record `stage` reads from its predecessor.
    pub fn input_record(&self, stage: Stage) -> Option<&InterfaceRecord> {
        self.inter_records[stage.index()].as_ref()
    }

    /// Varying record `stage` writes for its successor.
    pub fn output_record(&self, stage: Stage) -> Option<&InterfaceRecord> {
        let next = self.mask.next_active(stage)?;
        self.inter_records[next.index()].as_ref()
    }

    pub fn block(&self, stage: Stage) -> &[StageStmt] {
        &self.blocks[stage.index()]
    }

    pub fn device_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.mask.device_stages()
    }

    pub fn sample_call(&self, expr: NodeId) -> Option<&SampleCall> {
        self.sample_calls.iter().find(|c| c.expr == expr)
    }

    /// Textures sampled in `stage`, with their position in the texture list.
    pub fn stage_textures(&self, stage: Stage) -> impl Iterator<Item = (usize, &TextureRecord)> {
        self.textures
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.stages.contains(stage))
    }

    /// Samplers used in `stage`, with their sampler index.
    pub fn stage_samplers(&self, stage: Stage) -> impl Iterator<Item = (usize, &SamplerRecord)> {
        self.samplers
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.stages.contains(stage))
    }

    pub fn attribute(&self, param: usize) -> Option<&AttributeRecord> {
        self.attributes.iter().find(|a| a.param == param)
    }

    pub fn color_target(&self, param: usize) -> Option<&ColorTargetRecord> {
        self.color_targets.iter().find(|c| c.param == param)
    }
}

fn same_stmt(a: &StageStmt, b: &StageStmt) -> bool {
    match (a, b) {
        (StageStmt::Expr(a), StageStmt::Expr(b)) => a.same_value(b),
        (StageStmt::BindingDecl(a), StageStmt::BindingDecl(b))
        | (StageStmt::PushUniform(a), StageStmt::PushUniform(b)) => a == b,
        _ => false,
    }
}

/// Statements holding the assignments that reach the locals `expr` reads,
/// sorted and deduplicated.
fn reaching_assignments(expr: &Expr, scope: AssignScope<'_>) -> Vec<NodeId> {
    fn walk(expr: &Expr, scope: AssignScope<'_>, out: &mut Vec<NodeId>) {
        match &expr.kind {
            ExprKind::Local { local, .. } => {
                if let Some(found) = scope.find(VarRef::Local(*local)) {
                    out.push(found.statement);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                walk(lhs, scope, out);
                walk(rhs, scope, out);
            }
            ExprKind::Unary { operand, .. } | ExprKind::Cast(operand) => walk(operand, scope, out),
            ExprKind::Member { base, .. } => walk(base, scope, out),
            ExprKind::Construct(args) | ExprKind::InitList(args) | ExprKind::Call { args, .. } => {
                args.iter().for_each(|a| walk(a, scope, out));
            }
            ExprKind::MethodCall { object, args, .. } => {
                walk(object, scope, out);
                args.iter().for_each(|a| walk(a, scope, out));
            }
            ExprKind::Literal(_)
            | ExprKind::Constant(_)
            | ExprKind::Param(_)
            | ExprKind::Interface(_)
            | ExprKind::Unsupported { .. } => {}
        }
    }
    let mut out = Vec::new();
    walk(expr, scope, &mut out);
    out.sort_unstable();
    out.dedup();
    out
}

fn max_node_id(stmts: &[Stmt]) -> u32 {
    fn expr_max(expr: &Expr) -> u32 {
        let child = match &expr.kind {
            ExprKind::Binary { lhs, rhs, .. } => expr_max(lhs).max(expr_max(rhs)),
            ExprKind::Unary { operand, .. } | ExprKind::Cast(operand) => expr_max(operand),
            ExprKind::Member { base, .. } => expr_max(base),
            ExprKind::Construct(args) | ExprKind::InitList(args) | ExprKind::Call { args, .. } => {
                args.iter().map(expr_max).max().unwrap_or(0)
            }
            ExprKind::MethodCall { object, args, .. } => args
                .iter()
                .map(expr_max)
                .fold(expr_max(object), u32::max),
            _ => 0,
        };
        child.max(expr.id.0)
    }
    stmts
        .iter()
        .map(|stmt| {
            let child = match &stmt.kind {
                StmtKind::Decl { init: Some(init), .. } => expr_max(init),
                StmtKind::Expr(expr) => expr_max(expr),
                StmtKind::Block(stmts) => max_node_id(stmts),
                _ => 0,
            };
            child.max(stmt.id.0)
        })
        .max()
        .unwrap_or(0)
}

fn stage_order_error(from: Stage, to: Stage, span: Span) -> Diagnostic {
    Diagnostic::error(
        format!(
            "value is only available in the {} stage but is needed in the {} stage",
            from, to
        ),
        span,
    )
    .with_kind(ErrorKind::Structural)
}

fn missing_record(from: Stage, to: Stage, span: Span) -> Diagnostic {
    Diagnostic::error(
        format!("no active interface carries values from {} to {}", from, to),
        span,
    )
    .with_kind(ErrorKind::Structural)
    .with_note("the destination stage has no outputs in this pipeline".to_string())
}

#[cfg(test)]
mod tests;
