//! The built-in headless widget set.
//!
//! These widgets hold state and raise signals but never draw; a host that
//! renders for real registers its own classes under the same names.

pub mod button;
pub mod checkbox;
pub mod container;
pub mod flex;
pub mod item_list;
pub mod text;
pub mod textbox;
pub mod texture_rect;

use crate::widget::WidgetRegistry;

/// Register every built-in class.
pub fn register_all(registry: &mut WidgetRegistry) {
    registry.register(container::control_class());
    registry.register(container::panel_class());
    registry.register(flex::vbox_class());
    registry.register(flex::hbox_class());
    registry.register(text::label_class());
    registry.register(button::button_class());
    registry.register(checkbox::checkbox_class());
    registry.register(textbox::line_edit_class());
    registry.register(texture_rect::texture_rect_class());
    registry.register(item_list::item_list_class());
}
