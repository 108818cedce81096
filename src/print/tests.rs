use super::*;
use crate::ast::{AstBuilder, DeclIndex, PipelineFn, Role};
use crate::stages::StagesBuilder;
use crate::trace::trace_outputs;
use crate::validate::validate;

fn build(b: &AstBuilder, func: &PipelineFn) -> (Stages, Catalog) {
    let catalog = Catalog::build(b.declarations()).unwrap();
    let decls = DeclIndex::new(b.declarations());
    let validated = validate(&catalog, &decls, func).unwrap();
    let mut builder = StagesBuilder::new(&catalog, &decls, func, validated);
    trace_outputs(&mut builder).unwrap();
    let stages = builder.finalize();
    (stages, catalog)
}

/// Transformed position plus one texture sample:
///
/// ```text
/// position = transform * float4(v.position, 1.0);
/// color = albedo.sample(v.uv, {linear, repeat});
/// ```
fn textured() -> (Stages, Catalog) {
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
    build(&b, &func)
}

fn print(target: Target) -> Vec<StageSource> {
    let (stages, catalog) = textured();
    let policy = create_policy(target);
    stages.print(policy.as_ref(), &catalog).unwrap()
}

fn has_line(text: &str, line: &str) -> bool {
    text.lines().any(|l| l == line)
}

#[test]
fn test_glsl_vertex_stage() {
    let sources = print(Target::Glsl);
    assert_eq!(sources.len(), 2);
    let vertex = &sources[0];
    assert_eq!(vertex.stage, Stage::Vertex);
    let text = &vertex.text;
    assert!(text.starts_with("#version 450 core\n"));
    assert!(has_line(text, "layout(binding = 0) uniform host_to_vertex {"));
    assert!(has_line(text, "    mat4 _hv0;"));
    assert!(has_line(text, "layout(location = 0) in vec3 v_position;"));
    assert!(has_line(text, "layout(location = 1) in vec2 v_uv;"));
    assert!(has_line(text, "out vertex_to_fragment {"));
    assert!(has_line(text, "} _to_fragment;"));
    assert!(has_line(text, "    gl_Position = _hv0 * vec4(v_position, 1.0);"));
    assert!(has_line(text, "    _to_fragment._vf0 = v_uv;"));
}

#[test]
fn test_glsl_fragment_stage() {
    let sources = print(Target::Glsl);
    let text = &sources[1].text;
    // Nothing crosses from the host to the fragment stage.
    assert!(!text.contains("host_to_fragment"));
    assert!(has_line(text, "in vertex_to_fragment {"));
    assert!(has_line(text, "    vec2 _vf0;"));
    assert!(has_line(text, "} _from_vertex;"));
    assert!(has_line(text, "layout(binding = 0) uniform sampler2D albedo;"));
    assert!(has_line(text, "layout(location = 0) out vec4 color;"));
    assert!(has_line(text, "    color = texture(albedo, _from_vertex._vf0);"));
}

#[test]
fn test_hlsl_uses_mul_for_matrices() {
    let sources = print(Target::Hlsl);
    let vertex = &sources[0].text;
    assert!(has_line(vertex, "cbuffer host_to_vertex : register(b0) {"));
    assert!(has_line(vertex, "    float3 v_position : ATTR0;"));
    assert!(has_line(vertex, "    float2 _vf0 : VAR0;"));
    assert!(has_line(vertex, "vertex_to_fragment main(in host_vert_data _vert_data) {"));
    assert!(has_line(
        vertex,
        "    _to_fragment._position = mul(_hv0, float4(_vert_data.v_position, 1.0));"
    ));
    assert!(has_line(vertex, "    return _to_fragment;"));
    assert!(!vertex.contains("vk::location"));
}

#[test]
fn test_hlsl_fragment_binds_texture_and_sampler() {
    let sources = print(Target::Dxil);
    let fragment = &sources[1].text;
    assert!(has_line(fragment, "Texture2D<float4> albedo : register(t0);"));
    assert!(has_line(fragment, "SamplerState _sampler0 : register(s0);"));
    assert!(has_line(fragment, "    float4 color : SV_Target0;"));
    assert!(has_line(fragment, "color_targets_out main(in vertex_to_fragment _from_vertex) {"));
    assert!(has_line(
        fragment,
        "    _targets_out.color = albedo.Sample(_sampler0, _from_vertex._vf0);"
    ));
}

#[test]
fn test_vulkan_hlsl_has_explicit_locations() {
    let sources = print(Target::VulkanSpirv);
    assert!(has_line(&sources[0].text, "    [[vk::location(1)]] float2 v_uv : ATTR1;"));
}

#[test]
fn test_metal_entry_points() {
    let sources = print(Target::Metal);
    let vertex = &sources[0].text;
    assert!(vertex.starts_with("#include <metal_stdlib>\n"));
    assert!(has_line(vertex, "    float4 _position [[position]];"));
    assert!(has_line(
        vertex,
        "vertex vertex_to_fragment main0(host_vert_data _vert_data [[stage_in]], \
         constant host_to_vertex& _from_host [[buffer(0)]]) {"
    ));
    assert!(has_line(
        vertex,
        "    _to_fragment._position = _from_host._hv0 * float4(_vert_data.v_position, 1.0);"
    ));
    let fragment = &sources[1].text;
    assert!(has_line(
        fragment,
        "fragment color_targets_out main0(vertex_to_fragment _from_vertex [[stage_in]], \
         texture2d<float> albedo [[texture(0)]], sampler _sampler0 [[sampler(0)]]) {"
    ));
    assert!(has_line(
        fragment,
        "    _targets_out.color = albedo.sample(_sampler0, _from_vertex._vf0);"
    ));
}

#[test]
fn test_metal_splits_matrix_attributes() {
    let mut b = AstBuilder::with_runtime();
    let mat = b.ty("float4x4");
    let f3 = b.ty("float3");
    let f4 = b.ty("float4");
    let inst = b.record("Inst", &[("model", mat)]);
    let vert = b.record("Vert", &[("position", f3)]);
    let params = vec![
        b.param("v", vert, Role::VertexBuffer { index: 0 }),
        b.param("i", inst, Role::InstanceBuffer { index: 1 }),
        b.param("position", f4, Role::Position),
    ];
    let i = b.arg(&params, 1);
    let model = b.member(i, "model");
    let v = b.arg(&params, 0);
    let pos = b.member(v, "position");
    let one = b.float(1.0);
    let ctor = b.construct(f4, vec![pos, one]);
    let product = b.binary(BinaryOp::Mul, model, ctor);
    let out = b.arg(&params, 2);
    let body = vec![b.assign(out, product)];
    let func = b.pipeline("hsh_Instanced", params, body);
    let (stages, catalog) = build(&b, &func);

    let metal = stages.print(&MetalPolicy::new(), &catalog).unwrap();
    let text = &metal[0].text;
    assert!(has_line(text, "    float3 v_position [[attribute(0)]];"));
    assert!(has_line(text, "    float4 i_model_0 [[attribute(1)]];"));
    assert!(has_line(text, "    float4 i_model_3 [[attribute(4)]];"));
    assert!(text.contains(
        "float4x4(_vert_data.i_model_0, _vert_data.i_model_1, _vert_data.i_model_2, _vert_data.i_model_3)"
    ));
    // No fragment stage: the vertex output struct stands alone.
    assert!(has_line(text, "vertex vertex_out main0(host_vert_data _vert_data [[stage_in]]) {"));

    let glsl = stages.print(&GlslPolicy::new(), &catalog).unwrap();
    assert!(has_line(&glsl[0].text, "layout(location = 1) in mat4 i_model;"));
    assert!(has_line(&glsl[0].text, "    gl_Position = i_model * vec4(v_position, 1.0);"));
}

#[test]
fn test_nested_operators_are_parenthesized() {
    let mut b = AstBuilder::with_runtime();
    let f4 = b.ty("float4");
    let vert = b.record("Vert", &[("a", f4), ("b", f4)]);
    let params = vec![
        b.param("v", vert, Role::VertexBuffer { index: 0 }),
        b.param("position", f4, Role::Position),
    ];
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let v = b.arg(&params, 0);
    let bv = b.member(v, "b");
    let sum = b.binary(BinaryOp::Add, a, bv);
    let half = b.float(0.5);
    let scaled = b.binary(BinaryOp::Mul, sum, half);
    let out = b.arg(&params, 1);
    let body = vec![b.assign(out, scaled)];
    let func = b.pipeline("hsh_Nested", params, body);
    let (stages, catalog) = build(&b, &func);

    let glsl = stages.print(&GlslPolicy::new(), &catalog).unwrap();
    assert!(has_line(&glsl[0].text, "    gl_Position = (v_a + v_b) * 0.5;"));
}

#[test]
fn test_host_block_pushes_uniforms() {
    let (stages, catalog) = textured();
    let lines = host::host_body(&stages, &catalog, "");
    assert_eq!(
        lines,
        vec![
            "host_to_vertex _to_vertex;".to_string(),
            "_to_vertex._hv0 = transform;".to_string(),
            "push_uniform<hsh::Stage::Vertex>(_to_vertex);".to_string(),
        ]
    );
}

#[test]
fn test_metal_rejects_geometry_stage() {
    let mut b = AstBuilder::with_runtime();
    let f4 = b.ty("float4");
    let vert = b.record("Vert", &[("a", f4)]);
    let params = vec![
        b.param("v", vert, Role::VertexBuffer { index: 0 }),
        b.param("position", f4, Role::Position),
        b.param("extra", f4, Role::VaryingOutput { stage: Stage::Geometry }),
    ];
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let out = b.arg(&params, 1);
    let position = b.assign(out, a);
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let out = b.arg(&params, 2);
    let extra = b.assign(out, a);
    let func = b.pipeline("hsh_Geometry", params, vec![position, extra]);
    let (stages, catalog) = build(&b, &func);

    let err = stages.print(&MetalPolicy::new(), &catalog).unwrap_err();
    assert_eq!(err.message, "metal does not support the geometry stage");
    assert!(stages.print(&GlslPolicy::new(), &catalog).is_ok());
}

#[test]
fn test_float_literals_keep_a_decimal_point() {
    assert_eq!(float_literal(1.0), "1.0");
    assert_eq!(float_literal(0.25), "0.25");
}

/// ```text
/// float4 c = v.a;
/// c = v.b;
/// position = v.a;
/// color0 = c;
/// c = v.a + v.b;
/// color1 = c;
/// ```
#[test]
fn test_reassigned_local_crosses_twice() {
    let mut b = AstBuilder::with_runtime();
    let f4 = b.ty("float4");
    let vert = b.record("Vert", &[("a", f4), ("b", f4)]);
    let params = vec![
        b.param("v", vert, Role::VertexBuffer { index: 0 }),
        b.param("position", f4, Role::Position),
        b.param("color0", f4, Role::ColorTarget { index: 0 }),
        b.param("color1", f4, Role::ColorTarget { index: 1 }),
    ];
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let (decl, c) = b.declare("c", f4, a);
    let lhs = b.local(&c);
    let v = b.arg(&params, 0);
    let bv = b.member(v, "b");
    let first = b.assign(lhs, bv);
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let out = b.arg(&params, 1);
    let position = b.assign(out, a);
    let read = b.local(&c);
    let out = b.arg(&params, 2);
    let color0 = b.assign(out, read);
    let lhs = b.local(&c);
    let v = b.arg(&params, 0);
    let a = b.member(v, "a");
    let v = b.arg(&params, 0);
    let bv = b.member(v, "b");
    let sum = b.binary(BinaryOp::Add, a, bv);
    let second = b.assign(lhs, sum);
    let read = b.local(&c);
    let out = b.arg(&params, 3);
    let color1 = b.assign(out, read);
    let body = vec![decl, first, position, color0, second, color1];
    let func = b.pipeline("hsh_Reassigned", params, body);
    let (stages, catalog) = build(&b, &func);

    assert_eq!(stages.input_record(Stage::Fragment).unwrap().fields().len(), 2);
    let glsl = stages.print(&GlslPolicy::new(), &catalog).unwrap();
    let vertex: Vec<&str> = glsl[0].text.lines().collect();
    let at = |line: &str| vertex.iter().position(|l| *l == line).unwrap();
    assert!(at("    vec4 c = v_a;") < at("    c = v_b;"));
    assert_eq!(at("    _to_fragment._vf0 = c;"), at("    c = v_b;") + 1);
    assert_eq!(at("    c = v_a + v_b;"), at("    _to_fragment._vf0 = c;") + 1);
    assert_eq!(at("    _to_fragment._vf1 = c;"), at("    c = v_a + v_b;") + 1);

    let fragment = &glsl[1].text;
    assert!(has_line(fragment, "    color0 = _from_vertex._vf0;"));
    assert!(has_line(fragment, "    color1 = _from_vertex._vf1;"));
}
