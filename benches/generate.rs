//! Generation latency for one textured pipeline function.
//!
//! Measures each text target alone and all of them in one run, which is
//! what a build with several backends enabled pays per translation unit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hshgen::ast::{AstBuilder, BinaryOp, Role, TranslationUnit};
use hshgen::{generate, Target};

/// Transformed position plus a texture sample in the fragment stage.
fn textured_unit() -> TranslationUnit {
    let mut b = AstBuilder::with_runtime();
    let mat = b.ty("float4x4");
    let f2 = b.ty("float2");
    let f3 = b.ty("float3");
    let f4 = b.ty("float4");
    let tex = b.ty("texture2d<float>");
    let vert = b.record("Vert", &[("position", f3), ("uv", f2)]);
    let params = vec![
        b.param("transform", mat, Role::Captured),
        b.param("v", vert, Role::VertexBuffer { index: 0 }),
        b.param("position", f4, Role::Position),
        b.param("color", f4, Role::ColorTarget { index: 0 }),
        b.param("albedo", tex, Role::FragmentTexture { index: 0 }),
    ];
    let transform = b.arg(&params, 0);
    let v = b.arg(&params, 1);
    let pos = b.member(v, "position");
    let one = b.float(1.0);
    let ctor = b.construct(f4, vec![pos, one]);
    let product = b.binary(BinaryOp::Mul, transform, ctor);
    let out = b.arg(&params, 2);
    let position = b.assign(out, product);

    let albedo = b.arg(&params, 4);
    let v = b.arg(&params, 1);
    let uv = b.member(v, "uv");
    let sampler = b.sampler(0, 0);
    let sample = b.sample(albedo, uv, sampler);
    let out = b.arg(&params, 3);
    let color = b.assign(out, sample);

    let func = b.pipeline("hsh_Textured", params, vec![position, color]);
    b.unit("bench.cpp", vec![func])
}

fn bench_targets(c: &mut Criterion) {
    let unit = textured_unit();
    let mut group = c.benchmark_group("generate");
    for target in [Target::Glsl, Target::Hlsl, Target::Metal] {
        group.bench_function(target.name(), |b| {
            b.iter(|| generate(black_box(&unit), &[target], None))
        });
    }
    let all = [Target::Glsl, Target::Hlsl, Target::Metal];
    group.bench_function("all_text", |b| {
        b.iter(|| generate(black_box(&unit), &all, None))
    });
    group.finish();
}

criterion_group!(benches, bench_targets);
criterion_main!(benches);
