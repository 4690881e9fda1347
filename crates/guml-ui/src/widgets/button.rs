use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, Widget, WidgetClass};

#[derive(Debug, Default)]
pub struct ButtonState {
    pub text: String,
    pub disabled: bool,
    pub flat: bool,
    pub icon: Value,
}

/// `Button`: emits `pressed` when clicked.
pub fn button_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<ButtonState>("Button")
        .property(
            "text",
            |s| Value::Str(s.text.clone()),
            |s, v| {
                s.text = v.to_text()?;
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
        .property(
            "flat",
            |s| Value::Bool(s.flat),
            |s, v| {
                s.flat = v.to_bool()?;
                Ok(())
            },
        )
        .property(
            "icon",
            |s| s.icon.clone(),
            |s, v| match v {
                Value::Null | Value::Resource(_) => {
                    s.icon = v;
                    Ok(())
                }
                other => Err(RenderError::type_error(format!("expected resource, found {}", other.type_name()))),
            },
        )
        .event("pressed")
        .style("font_color", StyleKind::Color)
        .style("font_hover_color", StyleKind::Color)
        .style("font", StyleKind::Font)
        .style("font_size", StyleKind::FontSize)
        .style("icon", StyleKind::Icon)
        .style("normal", StyleKind::Style)
        .style("hover", StyleKind::Style)
        .style("pressed", StyleKind::Style)
        .build()
}

/// Simulate a click: emits `pressed` unless the button is disabled.
pub fn press(button: &Widget) -> Result<bool, RenderError> {
    let disabled = button.with_state(|s: &ButtonState| s.disabled).unwrap_or(false);
    if disabled {
        return Ok(false);
    }
    button.emit("pressed", &[])?;
    Ok(true)
}
