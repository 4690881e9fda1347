use std::rc::Rc;

use crate::value::Value;
use crate::widget::{StyleKind, WidgetClass};

/// State of a plain `Control`: only the base properties.
#[derive(Debug, Default)]
pub struct ControlState;

/// `Control`: the bare base widget.
pub fn control_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<ControlState>("Control").build()
}

#[derive(Debug, Default)]
pub struct PanelState {
    pub clip_contents: bool,
}

/// `Panel`: a container with a themable `panel` style box.
pub fn panel_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<PanelState>("Panel")
        .property(
            "clip_contents",
            |s| Value::Bool(s.clip_contents),
            |s, v| {
                s.clip_contents = v.to_bool()?;
                Ok(())
            },
        )
        .style("panel", StyleKind::Style)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Widget;

    #[test]
    fn panel_has_panel_style() {
        let class = panel_class();
        assert_eq!(class.style_kind("panel"), Some(StyleKind::Style));
        let w = Widget::new(class);
        w.set_property("clip_contents", Value::Bool(true)).unwrap();
        assert_eq!(w.property("clip_contents").unwrap(), Value::Bool(true));
    }

    #[test]
    fn control_has_only_base_properties() {
        let class = control_class();
        let names: Vec<_> = class.property_names().collect();
        assert_eq!(names, ["name", "visible", "position", "size", "modulate", "tooltip"]);
    }
}
