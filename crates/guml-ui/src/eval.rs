//! Tree-walking expression evaluator.

use std::cell::RefCell;
use std::rc::Rc;

use guml_engine::coords::Vec2;
use guml_engine::paint::Color;
use guml_markup::ast;
use guml_markup::convert::to_snake_case;
use guml_markup::{Expr, InfixOperator, PrefixOperator, RefKind, Reference};

use crate::controller::ControllerHandle;
use crate::env::Environment;
use crate::error::RenderError;
use crate::object::Object;
use crate::scope::Scope;
use crate::subscription::{Subscription, Subscriptions};
use crate::value::{FLOAT_EPSILON, StyleBox, Value};

// ── Binder ────────────────────────────────────────────────────────────────

/// Collects change subscriptions while a reactive binding evaluates for the
/// first time. Every property read off a notifying object installs one
/// listener that runs `refresh` when that property changes.
pub(crate) struct Binder {
    refresh: Rc<dyn Fn()>,
    subs: Rc<Subscriptions>,
    watched: RefCell<Vec<(*const (), String)>>,
}

impl Binder {
    pub(crate) fn new(refresh: Rc<dyn Fn()>, subs: Rc<Subscriptions>) -> Self {
        Self { refresh, subs, watched: RefCell::new(Vec::new()) }
    }

    fn watch(&self, object: &Rc<dyn Object>, name: &str) {
        let Some(notifier) = object.notifier() else { return };
        let key = (Rc::as_ptr(object).cast::<()>(), name.to_string());
        if self.watched.borrow().contains(&key) {
            return;
        }
        self.watched.borrow_mut().push(key);

        let refresh = self.refresh.clone();
        let name = name.to_string();
        let snake = to_snake_case(&name);
        let id = notifier.subscribe(move |changed| {
            if changed.is_empty() || changed == name || to_snake_case(changed) == snake {
                refresh();
            }
        });
        self.subs.add(Subscription::Object(object.clone(), id));
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────

pub(crate) struct Evaluator<'a> {
    env: &'a Environment,
    controller: Option<&'a Rc<ControllerHandle>>,
    scope: &'a Scope,
    binder: Option<&'a Binder>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(env: &'a Environment, controller: Option<&'a Rc<ControllerHandle>>, scope: &'a Scope) -> Self {
        Self { env, controller, scope, binder: None }
    }

    pub(crate) fn binding(mut self, binder: &'a Binder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, RenderError> {
        match expr {
            Expr::Value(node) => self.value(&node.value),
            Expr::Prefix(p) => prefix(p.op, self.eval(&p.right)?),
            Expr::Infix(i) => {
                let left = self.eval(&i.left)?;
                let right = self.eval(&i.right)?;
                infix(i.op, left, right)
            }
        }
    }

    fn value(&self, value: &ast::Value) -> Result<Value, RenderError> {
        Ok(match value {
            ast::Value::Int(n) => Value::Int(*n),
            ast::Value::Float(x) => Value::Float(*x),
            ast::Value::Bool(b) => Value::Bool(*b),
            ast::Value::Str(s) => Value::Str(s.clone()),
            ast::Value::Null => Value::Null,
            ast::Value::Vec2(x, y) => Value::Vec2(Vec2::new(self.number(x, "vec2")?, self.number(y, "vec2")?)),
            ast::Value::Color([r, g, b, a]) => Value::Color(Color::rgba(
                self.number(r, "color")?,
                self.number(g, "color")?,
                self.number(b, "color")?,
                self.number(a, "color")?,
            )),
            ast::Value::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
                    .collect::<Result<_, RenderError>>()?,
            ),
            ast::Value::Resource(path) => match self.eval(path)? {
                Value::Str(path) => self.env.load_resource(&path)?,
                other => {
                    return Err(RenderError::type_error(format!(
                        "resource path must be a string, found {}",
                        other.type_name()
                    )));
                }
            },
            ast::Value::StyleBox { kind, props } => {
                let props = match props {
                    None => Vec::new(),
                    Some(e) => match self.eval(e)? {
                        Value::Map(entries) => entries,
                        Value::Null => Vec::new(),
                        other => {
                            return Err(RenderError::type_error(format!(
                                "{}() takes an object literal, found {}",
                                kind.constructor(),
                                other.type_name()
                            )));
                        }
                    },
                };
                Value::StyleBox(StyleBox { kind: *kind, props })
            }
            ast::Value::Ref(r) => self.reference(r)?,
        })
    }

    fn number(&self, expr: &Expr, what: &str) -> Result<f32, RenderError> {
        let v = self.eval(expr)?;
        v.as_f64()
            .map(|x| x as f32)
            .ok_or_else(|| RenderError::type_error(format!("{what} components must be numbers, found {}", v.type_name())))
    }

    fn reference(&self, r: &Reference) -> Result<Value, RenderError> {
        match r {
            Reference::Global(name) => {
                if name == "$controller" {
                    if let Some(c) = self.controller {
                        return Ok(Value::from(c.clone()));
                    }
                }
                self.env.global(name).ok_or_else(|| RenderError::reference(RefKind::Global, name))
            }
            Reference::Alias(name) => self
                .controller
                .and_then(|c| c.node(name))
                .map(Value::from)
                .ok_or_else(|| RenderError::reference(RefKind::LocalAlias, name)),
            Reference::Local(name) => {
                self.scope.lookup(name).ok_or_else(|| RenderError::reference(RefKind::LocalVar, name))
            }
            Reference::Property { base, name } => {
                let base = self.value(&base.value)?;
                self.read(&base, name)
            }
        }
    }

    fn read(&self, base: &Value, name: &str) -> Result<Value, RenderError> {
        let found = match base {
            Value::Object(object) => {
                if let Some(binder) = self.binder {
                    binder.watch(object, name);
                }
                object.get(name)
            }
            Value::Map(_) => base.entry(name).cloned(),
            Value::Vec2(v) => match name {
                "x" => Some(Value::Float(v.x.into())),
                "y" => Some(Value::Float(v.y.into())),
                _ => None,
            },
            Value::Color(c) => match name {
                "r" => Some(Value::Float(c.r.into())),
                "g" => Some(Value::Float(c.g.into())),
                "b" => Some(Value::Float(c.b.into())),
                "a" => Some(Value::Float(c.a.into())),
                _ => None,
            },
            Value::List(list) => match name {
                "count" => Some(Value::Int(list.len() as i64)),
                _ => None,
            },
            _ => None,
        };
        found.ok_or_else(|| RenderError::property(base.type_name(), name))
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

fn prefix(op: PrefixOperator, v: Value) -> Result<Value, RenderError> {
    match (op, v) {
        (PrefixOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (PrefixOperator::Minus, Value::Int(n)) => {
            n.checked_neg().map(Value::Int).ok_or_else(|| RenderError::type_error(format!("-{n} overflows int")))
        }
        (PrefixOperator::Minus, Value::Float(x)) => Ok(Value::Float(-x)),
        (PrefixOperator::Minus, Value::Vec2(v)) => Ok(Value::Vec2(-v)),
        (PrefixOperator::Plus, v @ (Value::Int(_) | Value::Float(_) | Value::Vec2(_))) => Ok(v),
        (op, v) => Err(RenderError::type_error(format!("cannot apply '{}' to {}", op.symbol(), v.type_name()))),
    }
}

fn mismatch(op: InfixOperator, l: &Value, r: &Value) -> RenderError {
    RenderError::type_error(format!("cannot apply '{}' to {} and {}", op.symbol(), l.type_name(), r.type_name()))
}

fn infix(op: InfixOperator, l: Value, r: Value) -> Result<Value, RenderError> {
    use InfixOperator::*;
    match op {
        Or | And => match (&l, &r) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == Or { *a || *b } else { *a && *b })),
            _ => Err(mismatch(op, &l, &r)),
        },
        Eq => Ok(Value::Bool(l.loose_eq(&r))),
        NotEq => Ok(Value::Bool(!l.loose_eq(&r))),
        Gt | Lt | Ge | Le => compare(op, &l, &r).map(Value::Bool),
        Add if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) => Ok(Value::Str(format!("{l}{r}"))),
        Add | Sub | Mul | Div | Rem => arithmetic(op, &l, &r),
    }
}

/// `>=` and `<=` are true comparisons with tolerance folded in; `>` and `<`
/// are false for operands within [`FLOAT_EPSILON`] of each other.
fn compare(op: InfixOperator, l: &Value, r: &Value) -> Result<bool, RenderError> {
    use InfixOperator::*;
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        return Ok(match op {
            Gt => a > b,
            Lt => a < b,
            Ge => a >= b,
            _ => a <= b,
        });
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(mismatch(op, l, r));
    };
    let close = (a - b).abs() < FLOAT_EPSILON;
    Ok(match op {
        Gt => a > b && !close,
        Lt => a < b && !close,
        Ge => a > b || close,
        _ => a < b || close,
    })
}

fn arithmetic(op: InfixOperator, l: &Value, r: &Value) -> Result<Value, RenderError> {
    use InfixOperator::*;
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, Div | Rem) && b == 0 {
                return Err(RenderError::DivisionByZero);
            }
            let result = match op {
                Add => a.checked_add(b),
                Sub => a.checked_sub(b),
                Mul => a.checked_mul(b),
                Div => return Ok(Value::Float(a as f64 / b as f64)),
                _ => a.checked_rem(b),
            };
            result
                .map(Value::Int)
                .ok_or_else(|| RenderError::type_error(format!("{a} {} {b} overflows int", op.symbol())))
        }
        (Value::Vec2(a), Value::Vec2(b)) => match op {
            Add => Ok(Value::Vec2(*a + *b)),
            Sub => Ok(Value::Vec2(*a - *b)),
            _ => Err(mismatch(op, l, r)),
        },
        (Value::Vec2(v), n) | (n, Value::Vec2(v)) if op == Mul && n.as_f64().is_some() => {
            Ok(Value::Vec2(*v * n.as_f64().unwrap_or_default() as f32))
        }
        (Value::Vec2(v), n) if op == Div && n.as_f64().is_some() => {
            let d = n.as_f64().unwrap_or_default();
            if d == 0.0 {
                return Err(RenderError::DivisionByZero);
            }
            Ok(Value::Vec2(*v * (1.0 / d) as f32))
        }
        _ => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Err(mismatch(op, l, r));
            };
            if matches!(op, Div | Rem) && b == 0.0 {
                return Err(RenderError::DivisionByZero);
            }
            Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            }))
        }
    }
}
