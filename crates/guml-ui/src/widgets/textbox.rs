use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, Widget, WidgetClass};

#[derive(Debug)]
pub struct LineEditState {
    pub text: String,
    pub placeholder_text: String,
    pub editable: bool,
    /// `0` means unlimited.
    pub max_length: i64,
}

impl Default for LineEditState {
    fn default() -> Self {
        Self { text: String::new(), placeholder_text: String::new(), editable: true, max_length: 0 }
    }
}

impl LineEditState {
    fn clamp(&self, text: String) -> String {
        match usize::try_from(self.max_length) {
            Ok(max) if max > 0 => text.chars().take(max).collect(),
            _ => text,
        }
    }
}

/// `LineEdit`: single-line text input.
pub fn line_edit_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<LineEditState>("LineEdit")
        .property(
            "text",
            |s| Value::Str(s.text.clone()),
            |s, v| {
                s.text = s.clamp(v.to_text()?);
                Ok(())
            },
        )
        .property(
            "placeholder_text",
            |s| Value::Str(s.placeholder_text.clone()),
            |s, v| {
                s.placeholder_text = v.to_text()?;
                Ok(())
            },
        )
        .property(
            "editable",
            |s| Value::Bool(s.editable),
            |s, v| {
                s.editable = v.to_bool()?;
                Ok(())
            },
        )
        .property(
            "max_length",
            |s| Value::Int(s.max_length),
            |s, v| {
                s.max_length = v.to_i64()?;
                Ok(())
            },
        )
        .event("text_changed")
        .event("text_submitted")
        .style("font_color", StyleKind::Color)
        .style("font_placeholder_color", StyleKind::Color)
        .style("font_size", StyleKind::FontSize)
        .style("normal", StyleKind::Style)
        .style("focus", StyleKind::Style)
        .build()
}

/// Simulate typing: replaces the text (notifying `text`) and emits
/// `text_changed(text)`. Returns `false` if the field is read-only.
pub fn input(line_edit: &Widget, text: &str) -> Result<bool, RenderError> {
    let editable = line_edit.with_state(|s: &LineEditState| s.editable).unwrap_or(false);
    if !editable {
        return Ok(false);
    }
    let Some(text) = line_edit.update_state("text", |s: &mut LineEditState| {
        s.text = s.clamp(text.to_string());
        s.text.clone()
    }) else {
        return Ok(false);
    };
    line_edit.emit("text_changed", &[Value::Str(text)])?;
    Ok(true)
}

/// Simulate pressing enter: emits `text_submitted(text)`.
pub fn submit(line_edit: &Widget) -> Result<(), RenderError> {
    let text = line_edit.property("text")?;
    line_edit.emit("text_submitted", &[text])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn input_updates_text_and_emits() {
        let e = Widget::new(line_edit_class());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        e.connect("text_changed", Rc::new(move |args: &[Value]| s.borrow_mut().push(args[0].to_string()))).unwrap();
        assert!(input(&e, "hello").unwrap());
        assert_eq!(e.property("text").unwrap(), Value::from("hello"));
        assert_eq!(*seen.borrow(), ["hello"]);
    }

    #[test]
    fn max_length_clamps() {
        let e = Widget::new(line_edit_class());
        e.set_property("max_length", Value::Int(3)).unwrap();
        e.set_property("text", "abcdef".into()).unwrap();
        assert_eq!(e.property("text").unwrap(), Value::from("abc"));
    }

    #[test]
    fn read_only_ignores_input() {
        let e = Widget::new(line_edit_class());
        e.set_property("editable", Value::Bool(false)).unwrap();
        assert!(!input(&e, "x").unwrap());
        assert_eq!(e.property("text").unwrap(), Value::from(""));
    }

    #[test]
    fn submit_sends_current_text() {
        let e = Widget::new(line_edit_class());
        e.set_property("text", "go".into()).unwrap();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        e.connect("text_submitted", Rc::new(move |args: &[Value]| *s.borrow_mut() = Some(args[0].clone()))).unwrap();
        submit(&e).unwrap();
        assert_eq!(*seen.borrow(), Some(Value::from("go")));
    }
}
