use std::collections::{BTreeMap, BTreeSet};

use otx_script::{AssignOp, BinOp, Expr, Literal, Span, Stmt, StmtKind, UnaryOp};

use crate::error::{EngineError, Result};
use crate::limits::ScriptLimits;
use crate::script::NativeHost;
use crate::value::Value;
use crate::variable::Variable;

enum Flow {
    Next,
    Return(Option<Value>),
}

/// Tree-walking evaluator for one clause run.
///
/// Name lookup goes locals (innermost first), then bound bylaw variables,
/// then party and account names, which read as their own name.
pub(crate) struct Machine<'m, 'a, H: ?Sized> {
    variables: &'m mut BTreeMap<String, &'a mut Variable>,
    parties: &'m BTreeSet<String>,
    accounts: &'m BTreeSet<String>,
    host: &'m mut H,
    limits: &'m ScriptLimits,
    scopes: Vec<BTreeMap<String, Option<Value>>>,
    last: Option<Value>,
    span: Span,
    steps: u64,
    depth: usize,
}

impl<'m, 'a, H> Machine<'m, 'a, H>
where
    H: NativeHost + ?Sized,
{
    pub(crate) fn new(
        variables: &'m mut BTreeMap<String, &'a mut Variable>,
        parties: &'m BTreeSet<String>,
        accounts: &'m BTreeSet<String>,
        host: &'m mut H,
        limits: &'m ScriptLimits,
    ) -> Self {
        Machine {
            variables,
            parties,
            accounts,
            host,
            limits,
            scopes: Vec::new(),
            last: None,
            span: Span::default(),
            steps: 0,
            depth: 0,
        }
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn run(&mut self, statements: &[Stmt]) -> Result<Option<Value>> {
        match self.block(statements)? {
            Flow::Return(value) => Ok(value),
            Flow::Next => Ok(self.last.take()),
        }
    }

    fn runtime(&self, message: impl Into<String>) -> EngineError {
        EngineError::Runtime {
            message: message.into(),
            span: self.span.clone(),
        }
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(EngineError::StepLimitExceeded {
                limit: self.limits.max_steps,
            });
        }
        Ok(())
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(EngineError::DepthLimitExceeded {
                limit: self.limits.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn block(&mut self, statements: &[Stmt]) -> Result<Flow> {
        self.enter()?;
        self.scopes.push(BTreeMap::new());
        let mut flow = Ok(Flow::Next);
        for stmt in statements {
            flow = self.stmt(stmt);
            if !matches!(flow, Ok(Flow::Next)) {
                break;
            }
        }
        self.scopes.pop();
        self.leave();
        flow
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.tick()?;
        self.span = stmt.span.clone();
        match &stmt.kind {
            StmtKind::VarDecl { name, init } => {
                let value = match init {
                    Some(init) => Some(self.expr(init)?),
                    None => None,
                };
                self.declare(name, value)?;
                Ok(Flow::Next)
            }
            StmtKind::Assign { target, op, value } => {
                let rhs = self.expr(value)?;
                let new_value = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => {
                        let current = self.lookup(target)?;
                        self.binary(BinOp::Add, current, rhs)?
                    }
                    AssignOp::Sub => {
                        let current = self.lookup(target)?;
                        self.binary(BinOp::Sub, current, rhs)?
                    }
                };
                self.assign(target, new_value)?;
                Ok(Flow::Next)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.condition(cond)? {
                    self.block(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.block(else_branch)
                } else {
                    Ok(Flow::Next)
                }
            }
            StmtKind::While { cond, body } => {
                while self.condition(cond)? {
                    if let Flow::Return(value) = self.block(body)? {
                        return Ok(Flow::Return(value));
                    }
                    self.span = stmt.span.clone();
                }
                Ok(Flow::Next)
            }
            StmtKind::Return { value } => {
                let value = match value {
                    Some(expr) => Some(self.expr(expr)?),
                    None => None,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Expr { expr } => {
                let value = self.expr(expr)?;
                self.last = Some(value);
                Ok(Flow::Next)
            }
        }
    }

    fn condition(&mut self, cond: &Expr) -> Result<bool> {
        match self.expr(cond)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.runtime(format!(
                "condition must be bool, found {}",
                other.value_type()
            ))),
        }
    }

    fn is_bound(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.parties.contains(name)
            || self.accounts.contains(name)
    }

    fn declare(&mut self, name: &str, value: Option<Value>) -> Result<()> {
        if self.is_bound(name) {
            return Err(self.runtime(format!(
                "'{}' is already bound by the contract",
                name
            )));
        }
        let redeclared = self
            .scopes
            .last()
            .map_or(false, |scope| scope.contains_key(name));
        if redeclared {
            return Err(self.runtime(format!("'{}' is already declared in this block", name)));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(slot) = scope.get(name) {
                return slot
                    .clone()
                    .ok_or_else(|| self.runtime(format!("'{}' used before assignment", name)));
            }
        }
        if let Some(variable) = self.variables.get(name) {
            return Ok(variable.value().clone());
        }
        if self.parties.contains(name) || self.accounts.contains(name) {
            return Ok(Value::Str(name.to_string()));
        }
        Err(self.runtime(format!("unknown name '{}'", name)))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.get_mut(name) {
                *slot = Some(value);
                return Ok(());
            }
        }
        if let Some(variable) = self.variables.get_mut(name) {
            return variable.set_value(value);
        }
        if self.parties.contains(name) || self.accounts.contains(name) {
            return Err(EngineError::ReadOnlyBinding {
                name: name.to_string(),
            });
        }
        Err(self.runtime(format!("assignment to undeclared name '{}'", name)))
    }

    fn expr(&mut self, expr: &Expr) -> Result<Value> {
        self.tick()?;
        self.expr_inner(expr)
    }

    /// Operands, arguments and right-hand sides count toward the depth
    /// limit; the left spine of an operator chain does not.
    fn nested(&mut self, expr: &Expr) -> Result<Value> {
        self.enter()?;
        let value = self.expr(expr);
        self.leave();
        value
    }

    fn expr_inner(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal { value } => Ok(match value {
                Literal::Int(n) => Value::Int(*n),
                Literal::Str(s) => Value::Str(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
            }),
            Expr::Var { name } => self.lookup(name),
            Expr::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.nested(arg)?);
                }
                self.call(name, &values)
            }
            Expr::Unary { op, operand } => {
                let value = self.nested(operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(n)) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| self.runtime("integer overflow")),
                    (UnaryOp::Not, other) => Err(self.runtime(format!(
                        "'!' expects bool, found {}",
                        other.value_type()
                    ))),
                    (UnaryOp::Neg, other) => Err(self.runtime(format!(
                        "'-' expects integer, found {}",
                        other.value_type()
                    ))),
                }
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::And | BinOp::Or => {
                    let left = self.logical_operand(*op, lhs)?;
                    let short = matches!(op, BinOp::Or);
                    if left == short {
                        return Ok(Value::Bool(short));
                    }
                    self.enter()?;
                    let right = self.logical_operand(*op, rhs);
                    self.leave();
                    Ok(Value::Bool(right?))
                }
                _ => {
                    let left = self.expr(lhs)?;
                    let right = self.nested(rhs)?;
                    self.binary(*op, left, right)
                }
            },
        }
    }

    fn logical_operand(&mut self, op: BinOp, expr: &Expr) -> Result<bool> {
        match self.expr(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(self.runtime(format!(
                "'{}' expects bool operands, found {}",
                op.symbol(),
                other.value_type()
            ))),
        }
    }

    fn binary(&self, op: BinOp, left: Value, right: Value) -> Result<Value> {
        let overflow = || self.runtime("integer overflow");
        match (op, left, right) {
            (BinOp::Add, Value::Int(a), Value::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (BinOp::Add, Value::Str(a), Value::Int(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (BinOp::Add, Value::Int(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (BinOp::Sub, Value::Int(a), Value::Int(b)) => {
                a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Mul, Value::Int(a), Value::Int(b)) => {
                a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => {
                Err(self.runtime("division by zero"))
            }
            (BinOp::Div, Value::Int(a), Value::Int(b)) => {
                a.checked_div(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Rem, Value::Int(a), Value::Int(b)) => {
                a.checked_rem(b).map(Value::Int).ok_or_else(overflow)
            }
            (BinOp::Eq | BinOp::Neq, a, b) if a.value_type() == b.value_type() => {
                Ok(Value::Bool((a == b) == (op == BinOp::Eq)))
            }
            (BinOp::Gt | BinOp::Gte | BinOp::Lt | BinOp::Lte, Value::Int(a), Value::Int(b)) => {
                Ok(Value::Bool(compare(op, a.cmp(&b))))
            }
            (BinOp::Gt | BinOp::Gte | BinOp::Lt | BinOp::Lte, Value::Str(a), Value::Str(b)) => {
                Ok(Value::Bool(compare(op, a.cmp(&b))))
            }
            (op, a, b) => Err(self.runtime(format!(
                "unsupported operands for '{}': {} and {}",
                op.symbol(),
                a.value_type(),
                b.value_type()
            ))),
        }
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "to_string" => {
                let [value] = self.arity::<1>(name, args)?;
                Ok(Value::Str(value.to_string()))
            }
            "to_int" => {
                let [value] = self.arity::<1>(name, args)?;
                match value {
                    Value::Int(n) => Ok(Value::Int(*n)),
                    Value::Str(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(Value::Int)
                        .map_err(|_| self.runtime(format!("to_int: '{}' is not an integer", s))),
                    Value::Bool(_) => Err(self.runtime("to_int: cannot convert bool")),
                }
            }
            "strlen" => {
                let [value] = self.arity::<1>(name, args)?;
                match value {
                    Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                    other => Err(self.runtime(format!(
                        "strlen expects string, found {}",
                        other.value_type()
                    ))),
                }
            }
            _ if self.host.knows(name) => self.host.call(name, args),
            _ => Err(EngineError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }

    fn arity<'v, const N: usize>(&self, name: &str, args: &'v [Value]) -> Result<&'v [Value; N]> {
        args.try_into().map_err(|_| {
            self.runtime(format!(
                "{} expects {} argument(s), got {}",
                name,
                N,
                args.len()
            ))
        })
    }
}

fn compare(op: BinOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Gt => ordering == Greater,
        BinOp::Gte => ordering != Less,
        BinOp::Lt => ordering == Less,
        _ => ordering != Greater,
    }
}
