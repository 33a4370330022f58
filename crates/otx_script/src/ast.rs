use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Gt => ">",
            BinOp::Gte => ">=",
            BinOp::Lt => "<",
            BinOp::Lte => "<=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: Literal,
    },
    Var {
        name: String,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StmtKind {
    VarDecl {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        init: Option<Expr>,
    },
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Expr>,
    },
    Expr {
        expr: Expr,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// A parsed clause body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Script {
    pub statements: Vec<Stmt>,
}

impl Script {
    /// Names of every function called anywhere in the script, sorted and deduplicated.
    pub fn called_functions(&self) -> Vec<String> {
        let mut names = Vec::new();
        for stmt in &self.statements {
            collect_stmt_calls(stmt, &mut names);
        }
        names.sort();
        names.dedup();
        names
    }
}

fn collect_stmt_calls(stmt: &Stmt, out: &mut Vec<String>) {
    match &stmt.kind {
        StmtKind::VarDecl { init, .. } => {
            if let Some(init) = init {
                collect_expr_calls(init, out);
            }
        }
        StmtKind::Assign { value, .. } => collect_expr_calls(value, out),
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_expr_calls(cond, out);
            for s in then_branch {
                collect_stmt_calls(s, out);
            }
            for s in else_branch.iter().flatten() {
                collect_stmt_calls(s, out);
            }
        }
        StmtKind::While { cond, body } => {
            collect_expr_calls(cond, out);
            for s in body {
                collect_stmt_calls(s, out);
            }
        }
        StmtKind::Return { value } => {
            if let Some(value) = value {
                collect_expr_calls(value, out);
            }
        }
        StmtKind::Expr { expr } => collect_expr_calls(expr, out),
    }
}

fn collect_expr_calls(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Literal { .. } | Expr::Var { .. } => {}
        Expr::Call { name, args } => {
            out.push(name.clone());
            for arg in args {
                collect_expr_calls(arg, out);
            }
        }
        Expr::Unary { operand, .. } => collect_expr_calls(operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr_calls(lhs, out);
            collect_expr_calls(rhs, out);
        }
    }
}
