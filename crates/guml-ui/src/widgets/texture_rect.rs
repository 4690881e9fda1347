use std::rc::Rc;

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::WidgetClass;

#[derive(Debug, Default)]
pub struct TextureRectState {
    /// `Null` or a loaded `Resource`.
    pub texture: Value,
    pub stretch_mode: i64,
    pub flip_h: bool,
}

/// `TextureRect`: shows a texture resource.
pub fn texture_rect_class() -> Rc<WidgetClass> {
    WidgetClass::builder::<TextureRectState>("TextureRect")
        .property(
            "texture",
            |s| s.texture.clone(),
            |s, v| match v {
                Value::Null | Value::Resource(_) => {
                    s.texture = v;
                    Ok(())
                }
                other => Err(RenderError::type_error(format!("expected resource, found {}", other.type_name()))),
            },
        )
        .property(
            "stretch_mode",
            |s| Value::Int(s.stretch_mode),
            |s, v| {
                s.stretch_mode = v.to_i64()?;
                Ok(())
            },
        )
        .property(
            "flip_h",
            |s| Value::Bool(s.flip_h),
            |s, v| {
                s.flip_h = v.to_bool()?;
                Ok(())
            },
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Resource;
    use crate::widget::Widget;

    #[test]
    fn texture_holds_resource() {
        let w = Widget::new(texture_rect_class());
        let res = Value::Resource(Resource::new("icon.png", 7u32));
        w.set_property("texture", res.clone()).unwrap();
        assert_eq!(w.property("texture").unwrap(), res);
        assert!(w.set_property("texture", Value::Int(1)).is_err());
    }
}
