use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, WidgetClass};

/// Cross-axis placement of children in a box container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Begin,
    Center,
    End,
}

impl Alignment {
    fn from_value(v: &Value) -> Result<Self, RenderError> {
        match v {
            Value::Int(0) => Ok(Alignment::Begin),
            Value::Int(1) => Ok(Alignment::Center),
            Value::Int(2) => Ok(Alignment::End),
            Value::Str(s) => match s.as_str() {
                "begin" => Ok(Alignment::Begin),
                "center" => Ok(Alignment::Center),
                "end" => Ok(Alignment::End),
                _ => Err(RenderError::type_error(format!("unknown alignment '{s}'"))),
            },
            other => Err(RenderError::type_error(format!("expected alignment, found {}", other.type_name()))),
        }
    }

    fn to_value(self) -> Value {
        Value::Int(self as i64)
    }
}

/// State shared by `VBox` and `HBox`.
#[derive(Debug, Default)]
pub struct BoxState {
    pub alignment: Alignment,
}

fn box_class(name: &str) -> Rc<WidgetClass> {
    WidgetClass::builder::<BoxState>(name)
        .property(
            "alignment",
            |s| s.alignment.to_value(),
            |s, v| {
                s.alignment = Alignment::from_value(&v)?;
                Ok(())
            },
        )
        .style("separation", StyleKind::Constant)
        .build()
}

/// `VBox`: stacks children vertically.
pub fn vbox_class() -> Rc<WidgetClass> {
    box_class("VBox")
}

/// `HBox`: stacks children horizontally.
pub fn hbox_class() -> Rc<WidgetClass> {
    box_class("HBox")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Widget;

    #[test]
    fn alignment_accepts_names_and_indices() {
        let w = Widget::new(vbox_class());
        w.set_property("alignment", "center".into()).unwrap();
        assert_eq!(w.property("alignment").unwrap(), Value::Int(1));
        w.set_property("alignment", Value::Int(2)).unwrap();
        assert_eq!(w.with_state(|s: &BoxState| s.alignment), Some(Alignment::End));
        assert!(w.set_property("alignment", "middle".into()).is_err());
    }

    #[test]
    fn separation_is_a_constant_override() {
        assert_eq!(hbox_class().style_kind("separation"), Some(StyleKind::Constant));
    }
}
