use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, Widget, WidgetClass};

#[derive(Debug, Default)]
pub struct CheckBoxState {
    pub text: String,
    pub button_pressed: bool,
    pub disabled: bool,
}

/// `CheckBox`: a two-state button; emits `pressed` then `toggled(bool)`.
pub fn checkbox_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<CheckBoxState>("CheckBox")
        .property(
            "text",
            |s| Value::Str(s.text.clone()),
            |s, v| {
                s.text = v.to_text()?;
                Ok(())
            },
        )
        .property(
            "button_pressed",
            |s| Value::Bool(s.button_pressed),
            |s, v| {
                s.button_pressed = v.to_bool()?;
                Ok(())
            },
        )
        .property(
            "disabled",
            |s| Value::Bool(s.disabled),
            |s, v| {
                s.disabled = v.to_bool()?;
                Ok(())
            },
        )
        .event("pressed")
        .event("toggled")
        .style("font_color", StyleKind::Color)
        .style("checked", StyleKind::Icon)
        .style("unchecked", StyleKind::Icon)
        .build()
}

/// Simulate a click: flips `button_pressed` (notifying it) and emits
/// `pressed` and `toggled`. Returns the new state, or `None` if disabled.
pub fn toggle(checkbox: &Widget) -> Result<Option<bool>, RenderError> {
    let disabled = checkbox.with_state(|s: &CheckBoxState| s.disabled).unwrap_or(true);
    if disabled {
        return Ok(None);
    }
    let Some(on) = checkbox.update_state("button_pressed", |s: &mut CheckBoxState| {
        s.button_pressed = !s.button_pressed;
        s.button_pressed
    }) else {
        return Ok(None);
    };
    checkbox.emit("pressed", &[])?;
    checkbox.emit("toggled", &[Value::Bool(on)])?;
    Ok(Some(on))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn toggle_flips_and_reports() {
        let c = Widget::new(checkbox_class());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        c.connect("toggled", Rc::new(move |args: &[Value]| s.borrow_mut().push(args[0].clone()))).unwrap();
        assert_eq!(toggle(&c).unwrap(), Some(true));
        assert_eq!(toggle(&c).unwrap(), Some(false));
        assert_eq!(*seen.borrow(), [Value::Bool(true), Value::Bool(false)]);
        assert_eq!(c.property("button_pressed").unwrap(), Value::Bool(false));
    }

    #[test]
    fn disabled_checkbox_ignores_clicks() {
        let c = Widget::new(checkbox_class());
        c.set_property("disabled", Value::Bool(true)).unwrap();
        assert_eq!(toggle(&c).unwrap(), None);
    }
}
