//! The seam between the renderer and the widget toolkit.

use crate::error::RenderError;
use crate::value::Value;
use crate::widget::{Handler, StyleKind, Widget, WidgetRef, WidgetRegistry};

/// Creates widgets by type name and manipulates them on the renderer's behalf.
///
/// Only [`create`](WidgetFactory::create) is required; the rest default to the
/// capability tables carried by each [`Widget`]. Override them to observe or
/// redirect what the renderer does.
pub trait WidgetFactory {
    fn create(&self, type_name: &str) -> Result<WidgetRef, RenderError>;

    fn set_property(&self, widget: &WidgetRef, name: &str, value: Value) -> Result<(), RenderError> {
        widget.set_property(name, value)
    }

    fn get_property(&self, widget: &WidgetRef, name: &str) -> Result<Value, RenderError> {
        widget.property(name)
    }

    fn add_child(&self, parent: &WidgetRef, child: &WidgetRef) {
        parent.add_child(child.clone());
    }

    fn remove_child(&self, parent: &WidgetRef, child: &WidgetRef) {
        parent.remove_child(child);
    }

    fn move_child(&self, parent: &WidgetRef, child: &WidgetRef, index: usize) {
        parent.move_child(child, index);
    }

    fn apply_style_override(&self, widget: &WidgetRef, key: &str, kind: StyleKind, value: Value) -> Result<(), RenderError> {
        widget.apply_style_override(key, kind, value);
        Ok(())
    }

    fn connect(&self, widget: &WidgetRef, event: &str, handler: Handler) -> Result<(), RenderError> {
        widget.connect(event, handler)
    }
}

/// Factory backed by a [`WidgetRegistry`].
#[derive(Clone, Default)]
pub struct RegistryFactory {
    registry: WidgetRegistry,
}

impl RegistryFactory {
    pub fn new(registry: WidgetRegistry) -> Self {
        Self { registry }
    }

    /// Factory over the built-in headless widget set.
    pub fn headless() -> Self {
        Self::new(WidgetRegistry::headless())
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }
}

impl WidgetFactory for RegistryFactory {
    fn create(&self, type_name: &str) -> Result<WidgetRef, RenderError> {
        let class = self
            .registry
            .get(type_name)
            .ok_or_else(|| RenderError::ComponentNotFound { name: type_name.to_string() })?;
        log::trace!("create {type_name}");
        Ok(Widget::new(class))
    }
}
