//! The render environment: everything a render session looks up by name.
//!
//! An [`Environment`] owns the global value table, the widget factory, the
//! resource loader, the controller constructors and the parser. Nothing is
//! process-wide; tests build as many isolated environments as they like.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use guml_markup::{Document, Expr, GumlParser, ParseError};

use crate::controller::{Controller, ControllerHandle};
use crate::error::RenderError;
use crate::eval::Evaluator;
use crate::factory::{RegistryFactory, WidgetFactory};
use crate::scope::Scope;
use crate::value::{Resource, Value};

// ── Resource loading ──────────────────────────────────────────────────────

/// Turns the path inside `resource("...")` into a handle.
///
/// Called lazily, once per evaluation of the literal.
pub trait ResourceLoader {
    fn load(&self, path: &str) -> Result<Resource, RenderError>;
}

impl<F> ResourceLoader for F
where
    F: Fn(&str) -> Result<Resource, RenderError>,
{
    fn load(&self, path: &str) -> Result<Resource, RenderError> {
        self(path)
    }
}

/// Reads resources as raw bytes relative to a base directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    base: PathBuf,
}

impl FileLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ResourceLoader for FileLoader {
    fn load(&self, path: &str) -> Result<Resource, RenderError> {
        let bytes = std::fs::read(self.base.join(path))
            .map_err(|e| RenderError::Resource { path: path.to_string(), message: e.to_string() })?;
        log::debug!("loaded resource {path} ({} bytes)", bytes.len());
        Ok(Resource::new(path, bytes))
    }
}

struct NoLoader;

impl ResourceLoader for NoLoader {
    fn load(&self, path: &str) -> Result<Resource, RenderError> {
        Err(RenderError::Resource { path: path.to_string(), message: "no resource loader installed".into() })
    }
}

// ── Environment ───────────────────────────────────────────────────────────

pub type ControllerCtor = Box<dyn Fn() -> Rc<dyn Controller>>;

pub struct Environment {
    globals: RefCell<HashMap<String, Value>>,
    factory: Box<dyn WidgetFactory>,
    pub(crate) resources: Box<dyn ResourceLoader>,
    controllers: HashMap<String, ControllerCtor>,
    parser: GumlParser,
    pub(crate) top_controllers: RefCell<Vec<(String, Rc<ControllerHandle>)>>,
    errors: RefCell<Vec<RenderError>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// An environment over the built-in headless widgets, with no globals,
    /// controllers or resource loader.
    pub fn new() -> Self {
        Self::with_factory(RegistryFactory::headless())
    }

    pub fn with_factory(factory: impl WidgetFactory + 'static) -> Self {
        Self {
            globals: RefCell::new(HashMap::new()),
            factory: Box::new(factory),
            resources: Box::new(NoLoader),
            controllers: HashMap::new(),
            parser: GumlParser::new(),
            top_controllers: RefCell::new(Vec::new()),
            errors: RefCell::new(Vec::new()),
        }
    }

    pub fn factory(&self) -> &dyn WidgetFactory {
        self.factory.as_ref()
    }

    pub fn set_resource_loader(&mut self, loader: impl ResourceLoader + 'static) {
        self.resources = Box::new(loader);
    }

    pub fn parser(&self) -> &GumlParser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut GumlParser {
        &mut self.parser
    }

    // ── Globals ───────────────────────────────────────────────────────────

    /// Set a global; the leading `$` is optional.
    pub fn set_global(&self, name: &str, value: impl Into<Value>) {
        self.globals.borrow_mut().insert(global_key(name), value.into());
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(&global_key(name)).cloned()
    }

    pub fn remove_global(&self, name: &str) -> Option<Value> {
        self.globals.borrow_mut().remove(&global_key(name))
    }

    // ── Controllers ───────────────────────────────────────────────────────

    pub fn register_controller(&mut self, name: impl Into<String>, ctor: impl Fn() -> Rc<dyn Controller> + 'static) {
        self.controllers.insert(name.into(), Box::new(ctor));
    }

    pub fn has_controller(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// Construct a registered controller and wrap it in a fresh handle.
    pub fn create_controller(&self, name: &str) -> Result<Rc<ControllerHandle>, RenderError> {
        let ctor = self
            .controllers
            .get(name)
            .ok_or_else(|| RenderError::ControllerNotFound { name: name.to_string() })?;
        Ok(ControllerHandle::new(name, ctor()))
    }

    /// A controller loaded through `import_top`, by registered name.
    pub fn top_controller(&self, name: &str) -> Option<Rc<ControllerHandle>> {
        self.top_controllers.borrow().iter().find(|(k, _)| k == name).map(|(_, h)| h.clone())
    }

    pub fn top_controller_names(&self) -> Vec<String> {
        self.top_controllers.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    // ── Parsing & evaluation ──────────────────────────────────────────────

    pub fn parse(&self, src: &str) -> Result<Document, ParseError> {
        self.parser.parse(src)
    }

    /// Evaluate one expression outside any document.
    pub fn eval_str(&self, src: &str) -> Result<Value, RenderError> {
        let expr = self.parser.parse_expr(src)?;
        self.eval_expr(&expr, None, &Scope::new())
    }

    pub fn eval_expr(
        &self,
        expr: &Expr,
        controller: Option<&Rc<ControllerHandle>>,
        scope: &Scope,
    ) -> Result<Value, RenderError> {
        Evaluator::new(self, controller, scope).eval(expr)
    }

    pub(crate) fn load_resource(&self, path: &str) -> Result<Value, RenderError> {
        self.resources.load(path).map(Value::Resource)
    }

    // ── Deferred errors ───────────────────────────────────────────────────

    /// Record a failure raised inside a change callback.
    pub(crate) fn report(&self, err: RenderError) {
        log::error!("{err}");
        self.errors.borrow_mut().push(err);
    }

    /// Drain the errors raised by reactive refreshes and list updates.
    pub fn take_errors(&self) -> Vec<RenderError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }
}

fn global_key(name: &str) -> String {
    if name.starts_with('$') { name.to_string() } else { format!("${name}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::PropertyBag;

    #[test]
    fn globals_accept_either_spelling() {
        let env = Environment::new();
        env.set_global("app", 1);
        assert_eq!(env.global("$app"), Some(Value::Int(1)));
        env.set_global("$app", 2);
        assert_eq!(env.global("app"), Some(Value::Int(2)));
        assert_eq!(env.remove_global("app"), Some(Value::Int(2)));
        assert_eq!(env.global("app"), None);
    }

    #[test]
    fn unknown_controller() {
        let mut env = Environment::new();
        env.register_controller("MainController", || Rc::new(PropertyBag::new("MainController")));
        assert!(env.has_controller("MainController"));
        assert_eq!(env.create_controller("MainController").unwrap().name(), "MainController");
        assert_eq!(
            env.create_controller("Nope").err(),
            Some(RenderError::ControllerNotFound { name: "Nope".into() })
        );
    }

    #[test]
    fn resources_need_a_loader() {
        let mut env = Environment::new();
        assert!(matches!(env.eval_str("resource(\"a.png\")"), Err(RenderError::Resource { .. })));

        env.set_resource_loader(|path: &str| Ok::<_, RenderError>(Resource::new(path, path.len())));
        let Value::Resource(r) = env.eval_str("resource(\"icons/\" + \"a.png\")").unwrap() else {
            panic!("expected a resource");
        };
        assert_eq!(r.path, "icons/a.png");
        assert_eq!(r.downcast_ref::<usize>(), Some(&11));
    }

    #[test]
    fn file_loader_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.txt"), b"hi").unwrap();
        let loader = FileLoader::new(dir.path());
        let r = loader.load("data.txt").unwrap();
        assert_eq!(r.downcast_ref::<Vec<u8>>().map(Vec::as_slice), Some(&b"hi"[..]));
        assert!(matches!(loader.load("missing.txt"), Err(RenderError::Resource { .. })));
    }

    #[test]
    fn errors_drain() {
        let env = Environment::new();
        env.report(RenderError::DivisionByZero);
        assert_eq!(env.take_errors(), [RenderError::DivisionByZero]);
        assert!(env.take_errors().is_empty());
    }
}
