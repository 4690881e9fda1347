use std::rc::Rc;

use crate::value::Value;

struct Frame {
    vars: Vec<(String, Value)>,
    parent: Scope,
}

/// Loop-variable bindings as a persistent stack of frames.
///
/// Pushing returns a new scope and leaves the old one untouched, so a
/// listener that captured a scope keeps seeing exactly those bindings no
/// matter what is pushed later.
#[derive(Clone, Default)]
pub struct Scope(Option<Rc<Frame>>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, vars: Vec<(String, Value)>) -> Scope {
        Scope(Some(Rc::new(Frame { vars, parent: self.clone() })))
    }

    /// Innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        while let Some(frame) = &scope.0 {
            if let Some((_, v)) = frame.vars.iter().find(|(k, _)| k == name) {
                return Some(v.clone());
            }
            scope = &frame.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frame_shadows_outer() {
        let outer = Scope::new().push(vec![("i".into(), Value::Int(0)), ("v".into(), "outer".into())]);
        let inner = outer.push(vec![("v".into(), "inner".into())]);
        assert_eq!(inner.lookup("v"), Some("inner".into()));
        assert_eq!(inner.lookup("i"), Some(Value::Int(0)));
        assert_eq!(outer.lookup("v"), Some("outer".into()));
        assert_eq!(inner.lookup("x"), None);
    }
}
