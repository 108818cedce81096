//! Programmatic construction of translation units.
//!
//! `AstBuilder` hands out fresh node, declaration and local identities and
//! can declare the complete runtime header, so embedders and tests can
//! drive the generator without a C++ front end.

use std::collections::HashMap;

use super::*;
use crate::builtins::required::{RuntimeKind, FUNCTIONS, METHODS, RUNTIME, TYPES};
use crate::builtins::{BuiltinType, TypeClass};
use crate::stages::{InputRate, VertexFormat};
use crate::target::Target;

/// A local variable introduced by [`AstBuilder::declare`].
#[derive(Clone, Debug)]
pub struct LocalVar {
    pub id: LocalId,
    pub name: String,
    pub ty: Type,
}

#[derive(Default)]
pub struct AstBuilder {
    next_node: u32,
    next_decl: u32,
    next_local: u32,
    declarations: Vec<Declaration>,
    /// Type spelling -> declaration, e.g. `float4`, `texture2d<float>`.
    types: HashMap<String, DeclId>,
    names: HashMap<DeclId, String>,
    functions: HashMap<String, DeclId>,
    methods: HashMap<(String, String), DeclId>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder whose declarations already contain the runtime header.
    pub fn with_runtime() -> Self {
        let mut b = Self::new();
        b.declare_runtime();
        b
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    fn next_decl(&mut self) -> DeclId {
        self.next_decl += 1;
        DeclId(self.next_decl)
    }

    fn push_decl(&mut self, namespace: &[&str], kind: DeclKind) -> DeclId {
        let id = self.next_decl();
        self.declarations.push(Declaration {
            id,
            namespace: namespace.iter().map(|s| s.to_string()).collect(),
            kind,
            span: Span::dummy(),
        });
        id
    }

    fn register_type(&mut self, spelling: String, id: DeclId) {
        self.names.insert(id, spelling.clone());
        self.types.insert(spelling, id);
    }

    // ─── Runtime header ────────────────────────────────────────────

    /// Declare everything the runtime header `hsh.h` provides.
    pub fn declare_runtime(&mut self) {
        const HSH: &[&str] = &["hsh"];

        for entry in TYPES {
            match entry.class {
                TypeClass::Texture { .. } => {
                    if self.types.contains_key(&format!("{}<float>", entry.name)) {
                        continue;
                    }
                    let args = [
                        (ScalarType::Float, "float"),
                        (ScalarType::Int(32), "int"),
                        (ScalarType::UInt(32), "uint"),
                    ];
                    let mut specializations = Vec::new();
                    for (arg, spelled) in args {
                        let decl = self.next_decl();
                        self.register_type(format!("{}<{}>", entry.name, spelled), decl);
                        specializations.push(Specialization { arg, decl });
                    }
                    self.push_decl(
                        HSH,
                        DeclKind::ClassTemplate {
                            name: entry.name.to_string(),
                            specializations,
                        },
                    );
                }
                _ => {
                    let id = self.push_decl(
                        HSH,
                        DeclKind::Record {
                            name: entry.name.to_string(),
                            fields: Vec::new(),
                        },
                    );
                    self.register_type(entry.name.to_string(), id);
                }
            }
        }

        let int = Type::INT;
        let sampler = self.push_decl(
            HSH,
            DeclKind::Record {
                name: "sampler".to_string(),
                fields: vec![
                    FieldDecl { name: "filter".into(), ty: int, span: Span::dummy() },
                    FieldDecl { name: "wrap".into(), ty: int, span: Span::dummy() },
                ],
            },
        );
        self.register_type("sampler".to_string(), sampler);

        for entry in FUNCTIONS {
            let id = self.push_decl(HSH, DeclKind::Function { name: entry.name.to_string() });
            self.functions.insert(entry.name.to_string(), id);
        }

        for entry in METHODS {
            let id = self.push_decl(
                HSH,
                DeclKind::Method {
                    record: entry.record.to_string(),
                    name: entry.name.to_string(),
                    params: entry.params.iter().map(|p| p.to_string()).collect(),
                },
            );
            self.methods
                .insert((entry.record.to_string(), entry.name.to_string()), id);
        }

        for entry in RUNTIME {
            let name = entry.name.to_string();
            let kind = match entry.kind {
                RuntimeKind::Record => DeclKind::Record { name, fields: Vec::new() },
                RuntimeKind::ClassTemplate => DeclKind::ClassTemplate {
                    name,
                    specializations: Vec::new(),
                },
                RuntimeKind::Method { record } => DeclKind::Method {
                    record: record.to_string(),
                    name,
                    params: Vec::new(),
                },
                RuntimeKind::Enum => {
                    let (scoped, names): (bool, Vec<&str>) = match entry.name {
                        "Target" => (true, Target::ALL.iter().map(|t| t.runtime_name()).collect()),
                        "Stage" => (
                            true,
                            vec!["Vertex", "Control", "Evaluation", "Geometry", "Fragment"],
                        ),
                        "_HshInputRate" => (
                            false,
                            vec![InputRate::PerVertex.name(), InputRate::PerInstance.name()],
                        ),
                        _ => (false, VertexFormat::ALL.iter().map(|f| f.name()).collect()),
                    };
                    DeclKind::Enum {
                        name,
                        scoped,
                        enumerators: names
                            .into_iter()
                            .enumerate()
                            .map(|(value, name)| Enumerator {
                                name: name.to_string(),
                                value: value as i64,
                            })
                            .collect(),
                    }
                }
            };
            self.push_decl(HSH, kind);
        }
    }

    // ─── Types ─────────────────────────────────────────────────────

    /// Type by spelling; unknown names become empty user records.
    pub fn ty(&mut self, name: &str) -> Type {
        if let Some(id) = self.types.get(name) {
            return Type::Decl(*id);
        }
        self.record(name, &[])
    }

    /// Declare a user record (outside the `hsh` namespace).
    pub fn record(&mut self, name: &str, fields: &[(&str, Type)]) -> Type {
        let id = self.push_decl(
            &[],
            DeclKind::Record {
                name: name.to_string(),
                fields: fields
                    .iter()
                    .map(|(name, ty)| FieldDecl {
                        name: name.to_string(),
                        ty: *ty,
                        span: Span::dummy(),
                    })
                    .collect(),
            },
        );
        self.register_type(name.to_string(), id);
        Type::Decl(id)
    }

    fn builtin_of(&self, ty: &Type) -> Option<BuiltinType> {
        let Type::Decl(id) = ty else { return None };
        let name = self.names.get(id)?;
        match name.split_once('<') {
            Some((template, arg)) => {
                let elem = match arg.trim_end_matches('>') {
                    "int" => crate::builtins::ElemKind::Int,
                    "uint" => crate::builtins::ElemKind::UInt,
                    _ => crate::builtins::ElemKind::Float,
                };
                BuiltinType::texture(template, elem)
            }
            None => BuiltinType::named(name),
        }
    }

    fn vector_of(&mut self, elem: crate::builtins::ElemKind, width: usize) -> Type {
        use crate::builtins::ElemKind;
        let (scalar, prefix) = match elem {
            ElemKind::Float => (Type::FLOAT, "float"),
            ElemKind::Int => (Type::INT, "int"),
            ElemKind::UInt => (Type::UINT, "uint"),
        };
        if width == 1 {
            scalar
        } else {
            self.ty(&format!("{}{}", prefix, width))
        }
    }

    pub fn param(&self, name: &str, ty: Type, role: Role) -> Param {
        Param {
            name: name.to_string(),
            ty,
            role,
            span: Span::dummy(),
        }
    }

    // ─── Expressions ───────────────────────────────────────────────

    fn node(&mut self) -> NodeId {
        self.next_node += 1;
        NodeId(self.next_node)
    }

    fn expr(&mut self, kind: ExprKind, ty: Type) -> Expr {
        Expr {
            id: self.node(),
            kind,
            ty,
            span: Span::dummy(),
        }
    }

    pub fn float(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Float(value)), Type::FLOAT)
    }

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Literal(Literal::Int(value)), Type::INT)
    }

    pub fn uint(&mut self, value: u64) -> Expr {
        self.expr(ExprKind::Literal(Literal::UInt(value)), Type::UINT)
    }

    /// Reference to parameter `index`.
    pub fn arg(&mut self, params: &[Param], index: usize) -> Expr {
        let ty = params.get(index).map_or(Type::Void, |p| p.ty);
        self.expr(ExprKind::Param(index), ty)
    }

    pub fn local(&mut self, var: &LocalVar) -> Expr {
        self.expr(
            ExprKind::Local {
                local: var.id,
                name: var.name.clone(),
            },
            var.ty,
        )
    }

    /// Field access; the type is taken from the record declaration.
    pub fn member(&mut self, base: Expr, field: &str) -> Expr {
        let ty = match base.ty {
            Type::Decl(id) => self
                .declarations
                .iter()
                .find(|d| d.id == id)
                .and_then(|d| match &d.kind {
                    DeclKind::Record { fields, .. } => fields.iter().find(|f| f.name == field),
                    _ => None,
                })
                .map_or(Type::Void, |f| f.ty),
            _ => Type::Void,
        };
        self.expr(
            ExprKind::Member {
                base: Box::new(base),
                field: field.to_string(),
            },
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let ty = if op.is_comparison() {
            Type::BOOL
        } else if op.is_assignment() {
            lhs.ty
        } else {
            let lhs_matrix = self.builtin_of(&lhs.ty).is_some_and(BuiltinType::is_matrix);
            let rhs_vector = self.builtin_of(&rhs.ty).is_some_and(BuiltinType::is_vector);
            if (lhs_matrix && rhs_vector) || lhs.ty.scalar().is_some() {
                rhs.ty
            } else {
                lhs.ty
            }
        };
        self.expr(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        let ty = if op == UnaryOp::Not { Type::BOOL } else { operand.ty };
        self.expr(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    pub fn construct(&mut self, ty: Type, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Construct(args), ty)
    }

    pub fn cast(&mut self, ty: Type, operand: Expr) -> Expr {
        self.expr(ExprKind::Cast(Box::new(operand)), ty)
    }

    pub fn init_list(&mut self, ty: Type, items: Vec<Expr>) -> Expr {
        self.expr(ExprKind::InitList(items), ty)
    }

    /// Call of a free function; names outside the catalog become user functions.
    pub fn call(&mut self, name: &str, args: Vec<Expr>, ty: Type) -> Expr {
        let func = match self.functions.get(name) {
            Some(id) => *id,
            None => {
                let id = self.push_decl(&[], DeclKind::Function { name: name.to_string() });
                self.functions.insert(name.to_string(), id);
                id
            }
        };
        self.expr(ExprKind::Call { func, args }, ty)
    }

    fn method_decl(&mut self, record: &str, name: &str) -> DeclId {
        let key = (record.to_string(), name.to_string());
        if let Some(id) = self.methods.get(&key) {
            return *id;
        }
        let id = self.push_decl(
            &[],
            DeclKind::Method {
                record: record.to_string(),
                name: name.to_string(),
                params: Vec::new(),
            },
        );
        self.methods.insert(key, id);
        id
    }

    /// `texture.sample(uv, sampler)`.
    pub fn sample(&mut self, texture: Expr, uv: Expr, sampler: Expr) -> Expr {
        let builtin = self.builtin_of(&texture.ty);
        let (record, elem) = match builtin.map(|b| (b.name(), b.class())) {
            Some((name, TypeClass::Texture { elem, .. })) => (name, elem),
            _ => ("texture2d", crate::builtins::ElemKind::Float),
        };
        let method = self.method_decl(record, "sample");
        let ty = self.vector_of(elem, 4);
        self.expr(
            ExprKind::MethodCall {
                method,
                object: Box::new(texture),
                args: vec![uv, sampler],
            },
            ty,
        )
    }

    /// `object.xyz()` style swizzle.
    pub fn swizzle(&mut self, object: Expr, name: &str) -> Expr {
        let record = self
            .builtin_of(&object.ty)
            .map_or("float4", BuiltinType::name);
        let method = self.method_decl(record, name);
        let ty = self.vector_of(crate::builtins::ElemKind::Float, name.len());
        self.expr(
            ExprKind::MethodCall {
                method,
                object: Box::new(object),
                args: Vec::new(),
            },
            ty,
        )
    }

    /// Folded constant sampler configuration `{filter, wrap}`.
    pub fn sampler(&mut self, filter: i64, wrap: i64) -> Expr {
        let ty = self.ty("sampler");
        self.expr(
            ExprKind::Constant(ConstValue::Struct(vec![
                ConstValue::Int(filter),
                ConstValue::Int(wrap),
            ])),
            ty,
        )
    }

    pub fn unsupported_expr(&mut self, construct: &str, ty: Type) -> Expr {
        self.expr(
            ExprKind::Unsupported {
                construct: construct.to_string(),
            },
            ty,
        )
    }

    // ─── Statements ────────────────────────────────────────────────

    fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Stmt {
            id: self.node(),
            kind,
            span: Span::dummy(),
        }
    }

    /// `ty name = init;`
    pub fn declare(&mut self, name: &str, ty: Type, init: Expr) -> (Stmt, LocalVar) {
        self.next_local += 1;
        let var = LocalVar {
            id: LocalId(self.next_local),
            name: name.to_string(),
            ty,
        };
        let stmt = self.stmt(StmtKind::Decl {
            local: var.id,
            name: var.name.clone(),
            ty,
            init: Some(init),
        });
        (stmt, var)
    }

    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Stmt {
        self.compound_assign(BinaryOp::Assign, lhs, rhs)
    }

    pub fn compound_assign(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Stmt {
        let expr = self.binary(op, lhs, rhs);
        self.expr_stmt(expr)
    }

    pub fn expr_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&mut self, stmts: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(stmts))
    }

    pub fn unsupported_stmt(&mut self, construct: &str) -> Stmt {
        self.stmt(StmtKind::Unsupported {
            construct: construct.to_string(),
        })
    }

    pub fn pipeline(&mut self, name: &str, params: Vec<Param>, body: Vec<Stmt>) -> PipelineFn {
        PipelineFn {
            name: name.to_string(),
            params,
            body,
            span: Span::dummy(),
        }
    }

    pub fn unit(&self, file_name: &str, pipelines: Vec<PipelineFn>) -> TranslationUnit {
        TranslationUnit {
            file_name: file_name.to_string(),
            source: None,
            dependencies: Vec::new(),
            declarations: self.declarations.clone(),
            pipelines,
        }
    }
}
