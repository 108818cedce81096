//! Last-assignment search over a pipeline body.
//!
//! Walks statements in order and remembers the latest write to a variable,
//! stopping when it reaches the statement that contains the use. Writes
//! are declarations with an initializer and (compound) assignments whose
//! left-hand side names the variable, including through member access.

use crate::ast::{Expr, ExprKind, LocalId, NodeId, Stmt, StmtKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum VarRef {
    Param(usize),
    Local(LocalId),
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum AssignSite<'a> {
    /// `ty name = init;`, always a `StmtKind::Decl` with an initializer.
    Decl(&'a Stmt),
    /// The whole `lhs op= rhs` expression.
    Expr(&'a Expr),
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct FoundAssignment<'a> {
    pub site: AssignSite<'a>,
    /// Innermost block statement containing the assignment.
    pub statement: NodeId,
}

/// Where a search may look: the body, up to (excluding) `end`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AssignScope<'a> {
    pub body: &'a [Stmt],
    pub end: Option<NodeId>,
}

impl<'a> AssignScope<'a> {
    pub fn whole(body: &'a [Stmt]) -> Self {
        Self { body, end: None }
    }

    /// Scope for tracing inside `found`: only earlier statements are visible.
    pub fn before(&self, found: &FoundAssignment<'a>) -> Self {
        Self {
            body: self.body,
            end: Some(found.statement),
        }
    }

    pub fn find(&self, var: VarRef) -> Option<FoundAssignment<'a>> {
        let mut finder = Finder {
            var,
            end: self.end,
            last: None,
            statement: None,
            assign: None,
        };
        finder.visit_block(self.body);
        finder.last
    }
}

struct Finder<'a> {
    var: VarRef,
    end: Option<NodeId>,
    last: Option<FoundAssignment<'a>>,
    statement: Option<NodeId>,
    /// Assignment whose left-hand side is being walked.
    assign: Option<&'a Expr>,
}

impl<'a> Finder<'a> {
    /// Returns false once `end` is reached.
    fn visit_block(&mut self, stmts: &'a [Stmt]) -> bool {
        for stmt in stmts {
            if Some(stmt.id) == self.end {
                return false;
            }
            self.statement = Some(stmt.id);
            if !self.visit_stmt(stmt) {
                return false;
            }
        }
        true
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) -> bool {
        match &stmt.kind {
            StmtKind::Decl { local, init: Some(init), .. } => {
                if self.var == VarRef::Local(*local) {
                    self.update(AssignSite::Decl(stmt));
                    true
                } else {
                    self.visit_expr(init);
                    true
                }
            }
            StmtKind::Expr(expr) => {
                self.visit_expr(expr);
                true
            }
            StmtKind::Block(stmts) => self.visit_block(stmts),
            StmtKind::Decl { init: None, .. } | StmtKind::Null | StmtKind::Unsupported { .. } => {
                true
            }
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::Binary { op, lhs, rhs } if op.is_assignment() => {
                let saved = self.assign.replace(expr);
                self.visit_expr(lhs);
                self.assign = saved;
                self.visit_expr(rhs);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            ExprKind::Param(index) => self.check(VarRef::Param(*index)),
            ExprKind::Local { local, .. } => self.check(VarRef::Local(*local)),
            ExprKind::Member { base, .. } => self.visit_expr(base),
            ExprKind::Unary { operand, .. } | ExprKind::Cast(operand) => self.visit_expr(operand),
            ExprKind::Construct(args) | ExprKind::InitList(args) | ExprKind::Call { args, .. } => {
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::MethodCall { object, args, .. } => {
                self.visit_expr(object);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            ExprKind::Literal(_)
            | ExprKind::Constant(_)
            | ExprKind::Interface(_)
            | ExprKind::Unsupported { .. } => {}
        }
    }

    fn check(&mut self, var: VarRef) {
        if var != self.var {
            return;
        }
        if let Some(assign) = self.assign {
            self.update(AssignSite::Expr(assign));
        }
    }

    fn update(&mut self, site: AssignSite<'a>) {
        if let Some(statement) = self.statement {
            self.last = Some(FoundAssignment { site, statement });
        }
    }
}
