//! C++ spelling of the host block, placed in the generated class constructor.

use crate::ast::{Expr, Literal, ScalarType, Type};
use crate::builtins::{BuiltinFunction, BuiltinType, Catalog};
use crate::stage::Stage;
use crate::stages::{StageStmt, Stages};

use super::{float_literal, Dialect, Printer};

struct HostDialect;

impl Dialect for HostDialect {
    fn builtin_type(&self, ty: BuiltinType) -> String {
        format!("hsh::{}", ty.name())
    }

    fn scalar(&self, scalar: ScalarType) -> &'static str {
        scalar.cxx_name()
    }

    fn function(&self, func: BuiltinFunction) -> String {
        format!("hsh::{}", func.name())
    }

    fn init_list(&self, p: &Printer<'_>, ty: &Type, items: &[Expr]) -> String {
        format!("{}{{{}}}", p.type_name(ty), p.args(items))
    }

    fn swizzle(&self, p: &Printer<'_>, object: &Expr, name: &str) -> String {
        format!("{}.{}()", p.operand(object), name)
    }

    fn sample(&self, p: &Printer<'_>, _call: &Expr, texture: &Expr, args: &[Expr]) -> String {
        format!("{}.sample({})", p.operand(texture), p.args(args))
    }

    fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Float(v) => format!("{}f", float_literal(*v)),
            Literal::Int(v) => v.to_string(),
            Literal::UInt(v) => format!("{}u", v),
            Literal::Bool(v) => v.to_string(),
        }
    }

    fn host_statement(&self, p: &Printer<'_>, stmt: &StageStmt) -> Option<String> {
        match stmt {
            StageStmt::BindingDecl(stage) => {
                let record = p.stages.host_record(*stage).filter(|r| !r.is_empty())?;
                Some(format!("{} {};", record.name(), record.producer_var()))
            }
            StageStmt::PushUniform(stage) => {
                let record = p.stages.host_record(*stage).filter(|r| !r.is_empty())?;
                Some(format!(
                    "push_uniform<{}>({});",
                    stage_enumerator(p.catalog, *stage),
                    record.producer_var()
                ))
            }
            _ => None,
        }
    }
}

/// Qualified runtime spelling of a device stage, e.g. `hsh::Stage::Vertex`.
pub(crate) fn stage_enumerator(catalog: &Catalog, stage: Stage) -> String {
    stage
        .runtime_value()
        .and_then(|v| catalog.enumerator("Stage", v))
        .unwrap_or_else(|| {
            let name = stage.name();
            let mut title = name[..1].to_uppercase();
            title.push_str(&name[1..]);
            format!("{}::{}", catalog.runtime_name("Stage"), title)
        })
}

/// Host block statements, indented.
pub(crate) fn host_body(stages: &Stages, catalog: &Catalog, indent: &str) -> Vec<String> {
    Printer::new(stages, catalog, Stage::Host, &HostDialect).body(indent)
}

