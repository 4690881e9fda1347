use std::rc::Rc;

use guml_engine::paint::Color;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{StyleKind, WidgetClass};

/// The nested `label_settings` bag of a `Label`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSettings {
    pub font_size: f32,
    pub font_color: Color,
    pub outline_size: f32,
    pub outline_color: Color,
    pub line_spacing: f32,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            font_color: Color::WHITE,
            outline_size: 0.0,
            outline_color: Color::BLACK,
            line_spacing: 3.0,
        }
    }
}

impl LabelSettings {
    fn to_value(&self) -> Value {
        Value::Map(vec![
            ("font_size".into(), Value::Float(self.font_size.into())),
            ("font_color".into(), Value::Color(self.font_color)),
            ("outline_size".into(), Value::Float(self.outline_size.into())),
            ("outline_color".into(), Value::Color(self.outline_color)),
            ("line_spacing".into(), Value::Float(self.line_spacing.into())),
        ])
    }

    /// Overwrite the fields named in `entries`, leaving the rest alone.
    fn apply(&mut self, entries: &[(String, Value)]) -> Result<(), RenderError> {
        for (key, v) in entries {
            match guml_markup::convert::to_snake_case(key).as_str() {
                "font_size" => self.font_size = v.to_f32()?,
                "font_color" => self.font_color = v.to_color()?,
                "outline_size" => self.outline_size = v.to_f32()?,
                "outline_color" => self.outline_color = v.to_color()?,
                "line_spacing" => self.line_spacing = v.to_f32()?,
                _ => return Err(RenderError::property("LabelSettings", key.as_str())),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LabelState {
    pub text: String,
    pub autowrap: bool,
    pub horizontal_alignment: i64,
    /// `None` until first assigned; assigning a bag creates the default first.
    pub label_settings: Option<LabelSettings>,
}

/// `Label`: a line of text.
pub fn label_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<LabelState>("Label")
        .property(
            "text",
            |s| Value::Str(s.text.clone()),
            |s, v| {
                s.text = v.to_text()?;
                Ok(())
            },
        )
        .property(
            "autowrap",
            |s| Value::Bool(s.autowrap),
            |s, v| {
                s.autowrap = v.to_bool()?;
                Ok(())
            },
        )
        .property(
            "horizontal_alignment",
            |s| Value::Int(s.horizontal_alignment),
            |s, v| {
                s.horizontal_alignment = v.to_i64()?;
                Ok(())
            },
        )
        .property(
            "label_settings",
            |s| s.label_settings.as_ref().map_or(Value::Null, LabelSettings::to_value),
            |s, v| match v {
                Value::Null => {
                    s.label_settings = None;
                    Ok(())
                }
                Value::Map(entries) => s.label_settings.get_or_insert_with(LabelSettings::default).apply(&entries),
                other => Err(RenderError::type_error(format!("expected label settings, found {}", other.type_name()))),
            },
        )
        .style("font_color", StyleKind::Color)
        .style("font_outline_color", StyleKind::Color)
        .style("font", StyleKind::Font)
        .style("font_size", StyleKind::FontSize)
        .style("normal", StyleKind::Style)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Widget;

    #[test]
    fn text_accepts_scalars() {
        let w = Widget::new(label_class());
        w.set_property("text", Value::Int(42)).unwrap();
        assert_eq!(w.property("text").unwrap(), Value::from("42"));
    }

    #[test]
    fn label_settings_created_on_first_assignment() {
        let w = Widget::new(label_class());
        assert_eq!(w.property("label_settings").unwrap(), Value::Null);
        w.set_property("label_settings", Value::Map(vec![("font_size".into(), Value::Int(24))])).unwrap();
        let settings = w.with_state(|s: &LabelState| s.label_settings.clone()).flatten().unwrap();
        assert_eq!(settings.font_size, 24.0);
        assert_eq!(settings.line_spacing, LabelSettings::default().line_spacing);
    }

    #[test]
    fn label_settings_rejects_unknown_keys() {
        let w = Widget::new(label_class());
        let err = w.set_property("label_settings", Value::Map(vec![("glow".into(), Value::Int(1))])).unwrap_err();
        assert_eq!(err, RenderError::property("LabelSettings", "glow"));
    }
}
