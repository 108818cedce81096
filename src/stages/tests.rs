//! Stage builder unit tests.

use super::*;
use crate::ast::{AstBuilder, Role};
use crate::validate::validate;

struct Fixture {
    b: AstBuilder,
    func: PipelineFn,
}

/// `hsh_Test(float4x4 transform [captured], float4 position, float4 color,
/// texture2d<float> albedo [fragment texture 0])` with an empty body.
fn fixture() -> Fixture {
    let mut b = AstBuilder::with_runtime();
    let mat = b.ty("float4x4");
    let f4 = b.ty("float4");
    let tex = b.ty("texture2d<float>");
    let params = vec![
        b.param("transform", mat, Role::Captured),
        b.param("position", f4, Role::Position),
        b.param("color", f4, Role::ColorTarget { index: 0 }),
        b.param("albedo", tex, Role::FragmentTexture { index: 0 }),
    ];
    let func = b.pipeline("hsh_Test", params, Vec::new());
    Fixture { b, func }
}

macro_rules! builder {
    ($fx:expr, $catalog:ident, $decls:ident, $builder:ident) => {
        let $catalog = Catalog::build($fx.b.declarations()).unwrap();
        let $decls = DeclIndex::new($fx.b.declarations());
        let validated = validate(&$catalog, &$decls, &$fx.func).unwrap();
        #[allow(unused_mut)]
        let mut $builder = StagesBuilder::new(&$catalog, &$decls, &$fx.func, validated);
    };
}

fn scope(func: &PipelineFn) -> AssignScope<'_> {
    AssignScope::whole(&func.body)
}

#[test]
fn test_records_follow_active_stages() {
    let fx = fixture();
    builder!(fx, catalog, decls, builder);
    assert!(builder.host_record(Stage::Vertex).is_some());
    assert!(builder.host_record(Stage::Fragment).is_some());
    assert!(builder.host_record(Stage::Geometry).is_none());
    let varying = builder.inter_record(Stage::Fragment).unwrap();
    assert_eq!(varying.name(), "vertex_to_fragment");
    assert!(builder.inter_record(Stage::Vertex).is_none());
}

#[test]
fn test_host_promotion_reuses_fields() {
    let mut fx = fixture();
    let first = fx.b.arg(&fx.func.params, 0);
    let second = fx.b.arg(&fx.func.params, 0);
    builder!(fx, catalog, decls, builder);

    let a = builder
        .promote(first, Some(Stage::Host), Some(Stage::Vertex), scope(&fx.func))
        .unwrap();
    let b = builder
        .promote(second, Some(Stage::Host), Some(Stage::Vertex), scope(&fx.func))
        .unwrap();
    let ExprKind::Interface(ra) = a.kind else { panic!("expected interface reference") };
    let ExprKind::Interface(rb) = b.kind else { panic!("expected interface reference") };
    assert_eq!(ra, rb);
    assert_eq!(ra.side, Side::Consumer);
    assert_eq!(ra.field_name(), "_hv0");
    assert_eq!(builder.host_record(Stage::Vertex).unwrap().fields().len(), 1);
    // One producer assignment on the host.
    assert_eq!(builder.statements(Stage::Host).count(), 1);
}

#[test]
fn test_varying_promotion_writes_in_producer_stage() {
    let mut fx = fixture();
    let value = fx.b.arg(&fx.func.params, 1);
    builder!(fx, catalog, decls, builder);
    let promoted = builder
        .promote(value, Some(Stage::Vertex), Some(Stage::Fragment), scope(&fx.func))
        .unwrap();
    let ExprKind::Interface(r) = promoted.kind else { panic!("expected interface reference") };
    assert_eq!((r.source, r.dest, r.side), (Stage::Vertex, Stage::Fragment, Side::Consumer));
    let written: Vec<_> = builder.statements(Stage::Vertex).collect();
    assert_eq!(written.len(), 1);
    let StageStmt::Expr(assign) = written[0] else { panic!("expected assignment") };
    let ExprKind::Binary { op, lhs, .. } = &assign.kind else { panic!("expected assignment") };
    assert_eq!(*op, BinaryOp::Assign);
    assert!(matches!(
        lhs.kind,
        ExprKind::Interface(InterfaceRef { side: Side::Producer, .. })
    ));
}

#[test]
fn test_literals_do_not_become_fields() {
    let mut fx = fixture();
    let one = fx.b.float(1.0);
    builder!(fx, catalog, decls, builder);
    let same = builder
        .promote(one, Some(Stage::Vertex), Some(Stage::Fragment), scope(&fx.func))
        .unwrap();
    assert!(same.is_literal());
    assert!(builder.inter_record(Stage::Fragment).unwrap().is_empty());
}

#[test]
fn test_backward_promotion_is_rejected() {
    let mut fx = fixture();
    let value = fx.b.arg(&fx.func.params, 2);
    builder!(fx, catalog, decls, builder);
    let err = builder
        .promote(value, Some(Stage::Fragment), Some(Stage::Vertex), scope(&fx.func))
        .unwrap_err();
    assert_eq!(err.kind, Some(ErrorKind::Structural));
    assert!(err.message.contains("fragment"));
    assert!(err.message.contains("vertex"));
}

#[test]
fn test_declaration_uses_and_lifting() {
    let mut fx = fixture();
    let f4 = fx.b.ty("float4");
    let init = fx.b.float(0.0);
    let (stmt, var) = fx.b.declare("tmp", f4, init.clone());
    builder!(fx, catalog, decls, builder);
    let decl = LocalDecl { local: var.id, name: var.name.clone(), ty: f4, init };

    builder.add_statement(Stage::Vertex, StageStmt::Decl(decl.clone()), Some(stmt.id));
    builder.add_statement(Stage::Vertex, StageStmt::Decl(decl.clone()), Some(stmt.id));
    assert_eq!(builder.statements(Stage::Vertex).count(), 1);

    builder.lift_declaration(decl.clone(), Stage::Vertex, Stage::Fragment, stmt.id);
    assert_eq!(builder.statements(Stage::Vertex).count(), 1);
    assert_eq!(builder.statements(Stage::Fragment).count(), 1);

    builder.lift_declaration(decl, Stage::Vertex, Stage::Fragment, stmt.id);
    assert_eq!(builder.statements(Stage::Vertex).count(), 0);
    assert_eq!(builder.statements(Stage::Fragment).count(), 1);
}

#[test]
fn test_synthesized_statements_dedup_by_value() {
    let mut fx = fixture();
    let lhs = fx.b.arg(&fx.func.params, 2);
    let rhs = fx.b.float(1.0);
    let a = fx.b.binary(BinaryOp::Assign, lhs.clone(), rhs.clone());
    let b = fx.b.binary(BinaryOp::Assign, lhs, rhs);
    builder!(fx, catalog, decls, builder);
    builder.add_statement(Stage::Fragment, StageStmt::Expr(a), None);
    builder.add_statement(Stage::Fragment, StageStmt::Expr(b), None);
    assert_eq!(builder.statements(Stage::Fragment).count(), 1);
}

#[test]
fn test_sampler_dedup_and_limit() {
    let mut fx = fixture();
    let configs: Vec<Expr> = (0..=MAX_SAMPLERS as i64).map(|i| fx.b.sampler(i, 0)).collect();
    let repeat = fx.b.sampler(0, 0);
    builder!(fx, catalog, decls, builder);

    let id = builder.fresh_id();
    assert_eq!(builder.register_sample_call(Stage::Fragment, id, 3, &configs[0]).unwrap(), 0);
    let id = builder.fresh_id();
    assert_eq!(builder.register_sample_call(Stage::Fragment, id, 3, &repeat).unwrap(), 0);
    let id = builder.fresh_id();
    assert_eq!(builder.register_sample_call(Stage::Fragment, id, 3, &configs[1]).unwrap(), 1);

    for config in &configs[2..MAX_SAMPLERS] {
        let id = builder.fresh_id();
        builder.register_sample_call(Stage::Fragment, id, 3, config).unwrap();
    }
    assert_eq!(builder.samplers().len(), MAX_SAMPLERS);
    let id = builder.fresh_id();
    let err = builder
        .register_sample_call(Stage::Fragment, id, 3, &configs[MAX_SAMPLERS])
        .unwrap_err();
    assert_eq!(err.message, "maximum sampler limit of 32 reached");
    assert_eq!(err.kind, Some(ErrorKind::Sampler));

    let stages = builder.samplers()[0].stages;
    assert!(stages.contains(Stage::Fragment));
    assert!(!stages.contains(Stage::Vertex));
    assert!(builder.textures()[0].stages.contains(Stage::Fragment));
}

#[test]
fn test_non_constant_sampler_is_rejected() {
    let mut fx = fixture();
    let not_constant = fx.b.arg(&fx.func.params, 0);
    builder!(fx, catalog, decls, builder);
    let id = builder.fresh_id();
    let err = builder
        .register_sample_call(Stage::Fragment, id, 3, &not_constant)
        .unwrap_err();
    assert_eq!(err.message, "sampler arguments must be constant expressions");
}

#[test]
fn test_finalize_wraps_host_block() {
    let mut fx = fixture();
    let value = fx.b.arg(&fx.func.params, 0);
    builder!(fx, catalog, decls, builder);
    builder
        .promote(value, Some(Stage::Host), Some(Stage::Vertex), scope(&fx.func))
        .unwrap();
    builder.register_capture(0);
    builder.register_capture(0);
    let stages = builder.finalize();

    let host = stages.block(Stage::Host);
    assert_eq!(host.len(), 5);
    assert!(matches!(host[0], StageStmt::BindingDecl(Stage::Vertex)));
    assert!(matches!(host[1], StageStmt::BindingDecl(Stage::Fragment)));
    assert!(matches!(host[2], StageStmt::Expr(_)));
    assert!(matches!(host[3], StageStmt::PushUniform(Stage::Vertex)));
    assert!(matches!(host[4], StageStmt::PushUniform(Stage::Fragment)));
    assert_eq!(stages.captures, vec![0]);
    assert!(stages.host_record(Stage::Vertex).unwrap().is_frozen());
    assert_eq!(
        stages.output_record(Stage::Vertex).map(InterfaceRecord::name),
        Some("vertex_to_fragment".to_string())
    );
}
