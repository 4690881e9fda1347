use std::path::Path;
use std::rc::Rc;

use guml_markup::{ComponentConverter, GumlParser, KeyCasing, KeyConverter, TokenConverter, ValueConverter};

use crate::controller::{Controller, ControllerHandle};
use crate::env::{ControllerCtor, Environment, ResourceLoader};
use crate::error::RenderError;
use crate::factory::RegistryFactory;
use crate::value::Value;
use crate::widget::{WidgetClass, WidgetRef, WidgetRegistry};

// ── Application ───────────────────────────────────────────────────────────

/// Top-level builder for a GUML session.
///
/// Register globals, controllers, extra widget classes and converters, then
/// either [`build`](Application::build) an [`Environment`] or go straight to
/// [`load`](Application::load).
///
/// ```rust,no_run
/// use std::rc::Rc;
/// use guml_ui::prelude::*;
///
/// let host = Widget::new(WidgetRegistry::headless().get("Control").unwrap());
/// let (env, main) = Application::new()
///     .global("app_name", "Demo")
///     .controller("MainController", || Rc::new(PropertyBag::new("MainController")))
///     .load(&host, "ui/main.guml")
///     .unwrap();
/// ```
pub struct Application {
    registry:    WidgetRegistry,
    globals:     Vec<(String, Value)>,
    controllers: Vec<(String, ControllerCtor)>,
    resources:   Option<Box<dyn ResourceLoader>>,
    parser:      GumlParser,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    /// Starts from the built-in headless widget set.
    pub fn new() -> Self {
        Self {
            registry:    WidgetRegistry::headless(),
            globals:     Vec::new(),
            controllers: Vec::new(),
            resources:   None,
            parser:      GumlParser::new(),
        }
    }

    /// Publish `value` as `$name`.
    pub fn global(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.push((name.into(), value.into()));
        self
    }

    /// Register how to construct the controller named `name`.
    pub fn controller(mut self, name: impl Into<String>, ctor: impl Fn() -> Rc<dyn Controller> + 'static) -> Self {
        self.controllers.push((name.into(), Box::new(ctor)));
        self
    }

    /// Add or replace a widget class.
    pub fn widget(mut self, class: Rc<WidgetClass>) -> Self {
        self.registry.register(class);
        self
    }

    pub fn resource_loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.resources = Some(Box::new(loader));
        self
    }

    // ── Converters ────────────────────────────────────────────────────────

    pub fn converter_token(mut self, c: impl TokenConverter + 'static) -> Self {
        self.parser.converters_mut().add_token(c);
        self
    }

    pub fn converter_component(mut self, c: impl ComponentConverter + 'static) -> Self {
        self.parser.converters_mut().add_component(c);
        self
    }

    pub fn converter_key(mut self, c: impl KeyConverter + 'static) -> Self {
        self.parser.converters_mut().add_key(c);
        self
    }

    pub fn converter_value(mut self, c: impl ValueConverter + 'static) -> Self {
        self.parser.converters_mut().add_value(c);
        self
    }

    /// Rewrite every property key to `casing` before it reaches a widget.
    pub fn key_casing(self, casing: KeyCasing) -> Self {
        self.converter_key(casing)
    }

    // ── Entry points ──────────────────────────────────────────────────────

    pub fn build(self) -> Rc<Environment> {
        let (globals, controllers) = (self.globals.len(), self.controllers.len());
        let mut env = Environment::with_factory(RegistryFactory::new(self.registry));
        *env.parser_mut() = self.parser;
        if let Some(loader) = self.resources {
            env.resources = loader;
        }
        for (name, ctor) in self.controllers {
            env.register_controller(name, ctor);
        }
        for (name, value) in self.globals {
            env.set_global(&name, value);
        }
        log::debug!("environment ready: {globals} global(s), {controllers} controller(s)");
        Rc::new(env)
    }

    /// Build, then load `path` under `host_root`.
    pub fn load(
        self,
        host_root: &WidgetRef,
        path: impl AsRef<Path>,
    ) -> Result<(Rc<Environment>, Rc<ControllerHandle>), RenderError> {
        let env = self.build();
        let handle = env.load(host_root, path.as_ref())?;
        Ok((env, handle))
    }

    /// Build, then render `src` against `controller`.
    pub fn render_str(
        self,
        src: &str,
        controller: Rc<dyn Controller>,
        host_root: &WidgetRef,
    ) -> Result<(Rc<Environment>, Rc<ControllerHandle>), RenderError> {
        let env = self.build();
        let handle = env.render_str(src, controller, host_root)?;
        Ok((env, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::PropertyBag;
    use crate::widget::Widget;
    use crate::widgets::container;

    #[test]
    fn builder_wires_environment() {
        let env = Application::new()
            .global("title", "GUML")
            .controller("MainController", || Rc::new(PropertyBag::new("MainController")))
            .build();
        assert_eq!(env.global("$title"), Some(Value::Str("GUML".into())));
        assert!(env.has_controller("MainController"));
    }

    #[test]
    fn key_casing_rewrites_keys() {
        let env = Application::new().key_casing(KeyCasing::Pascal).build();
        let doc = env.parse("Label { font_size: 1 }").unwrap();
        assert_eq!(doc.root.properties[0].key, "FontSize");
    }

    #[derive(Default)]
    struct Gauge {
        ratio: f32,
    }

    #[test]
    fn custom_widget_class() {
        let gauge = WidgetClass::builder::<Gauge>("Gauge")
            .property("ratio", |s| Value::Float(s.ratio.into()), |s, v| Ok(s.ratio = v.to_f32()?))
            .build();
        let host = Widget::new(container::control_class());
        let (_, handle) = Application::new()
            .widget(gauge)
            .render_str("@g: Gauge { ratio: 0.5 }", Rc::new(PropertyBag::new("Main")), &host)
            .unwrap();
        assert_eq!(handle.name(), "Main");
        assert_eq!(handle.node("g").unwrap().property("ratio").unwrap(), Value::Float(0.5));
    }

    #[test]
    fn resource_loader_is_installed() {
        let env = Application::new()
            .resource_loader(|path: &str| Ok::<_, RenderError>(crate::value::Resource::new(path, ())))
            .build();
        assert!(matches!(env.eval_str("resource(\"x\")"), Ok(Value::Resource(_))));
    }
}
