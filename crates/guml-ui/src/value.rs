//! Runtime values produced by expression evaluation and stored in widget properties.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use guml_engine::coords::Vec2;
use guml_engine::paint::Color;
use guml_markup::StyleBoxKind;

use crate::error::RenderError;
use crate::list::ObservableList;
use crate::object::Object;

/// Tolerance for float equality in `==` / `!=`.
pub const FLOAT_EPSILON: f64 = 1e-6;

/// A style box built from `style_flat({...})` and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleBox {
    pub kind: StyleBoxKind,
    pub props: Vec<(String, Value)>,
}

/// A loaded resource: its path plus whatever the loader produced.
#[derive(Clone)]
pub struct Resource {
    pub path: String,
    pub payload: Rc<dyn Any>,
}

impl Resource {
    pub fn new(path: impl Into<String>, payload: impl Any) -> Self {
        Self { path: path.into(), payload: Rc::new(payload) }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource").field("path", &self.path).finish_non_exhaustive()
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && Rc::ptr_eq(&self.payload, &other.payload)
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Vec2(Vec2),
    Color(Color),
    /// Object literal, keys in declaration order.
    Map(Vec<(String, Value)>),
    StyleBox(StyleBox),
    Resource(Resource),
    List(ObservableList),
    Object(Rc<dyn Object>),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Vec2(_) => "vec2",
            Value::Color(_) => "color",
            Value::Map(_) => "object literal",
            Value::StyleBox(_) => "style box",
            Value::Resource(_) => "resource",
            Value::List(_) => "list",
            Value::Object(o) => o.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up an entry of a `Map` value.
    pub fn entry(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    // ── Typed extraction for property setters ─────────────────────────────

    fn mismatch(&self, expected: &str) -> RenderError {
        RenderError::type_error(format!("expected {expected}, found {}", self.type_name()))
    }

    pub fn to_bool(&self) -> Result<bool, RenderError> {
        self.as_bool().ok_or_else(|| self.mismatch("bool"))
    }

    pub fn to_f32(&self) -> Result<f32, RenderError> {
        self.as_f64().map(|x| x as f32).ok_or_else(|| self.mismatch("number"))
    }

    pub fn to_i64(&self) -> Result<i64, RenderError> {
        match self {
            Value::Int(n) => Ok(*n),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn to_vec2(&self) -> Result<Vec2, RenderError> {
        match self {
            Value::Vec2(v) => Ok(*v),
            _ => Err(self.mismatch("vec2")),
        }
    }

    pub fn to_color(&self) -> Result<Color, RenderError> {
        match self {
            Value::Color(c) => Ok(*c),
            _ => Err(self.mismatch("color")),
        }
    }

    /// Text for string-typed properties: strings as-is, scalars formatted,
    /// anything else rejected.
    pub fn to_text(&self) -> Result<String, RenderError> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(self.to_string()),
            _ => Err(self.mismatch("string")),
        }
    }

    pub fn to_list(&self) -> Result<ObservableList, RenderError> {
        match self {
            Value::List(l) => Ok(l.clone()),
            _ => Err(self.mismatch("observable list")),
        }
    }

    /// Structural equality with [`FLOAT_EPSILON`] tolerance whenever a float
    /// is involved. Objects and lists compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => (a - b).abs() < FLOAT_EPSILON,
                    _ => false,
                }
            }
            (Value::Vec2(a), Value::Vec2(b)) => a.approx_eq(*b, FLOAT_EPSILON as f32),
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Vec2(a), Value::Vec2(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::StyleBox(a), Value::StyleBox(b)) => a == b,
            (Value::Resource(a), Value::Resource(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Vec2(v) => write!(f, "Vec2({}, {})", v.x, v.y),
            Value::Color(c) => write!(f, "Color({c})"),
            Value::Map(entries) => f.debug_map().entries(entries.iter().map(|(k, v)| (k, v))).finish(),
            Value::StyleBox(s) => s.fmt(f),
            Value::Resource(r) => r.fmt(f),
            Value::List(l) => write!(f, "List({l:?})"),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
        }
    }
}

/// The text a `Label` would show for this value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::Vec2(v) => write!(f, "{v}"),
            Value::Color(c) => write!(f, "{c}"),
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{k}: {v}")?;
                }
                f.write_str(" }")
            }
            Value::StyleBox(s) => write!(f, "{}(..)", s.kind.constructor()),
            Value::Resource(r) => write!(f, "resource({})", r.path),
            Value::List(l) => write!(f, "[{} items]", l.len()),
            Value::Object(o) => write!(f, "<{}>", o.type_name()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vec2(v)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

impl From<ObservableList> for Value {
    fn from(l: ObservableList) -> Self {
        Value::List(l)
    }
}

impl<T: Object + 'static> From<Rc<T>> for Value {
    fn from(o: Rc<T>) -> Self {
        Value::Object(o)
    }
}

impl From<Rc<dyn Object>> for Value {
    fn from(o: Rc<dyn Object>) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
