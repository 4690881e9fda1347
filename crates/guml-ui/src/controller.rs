//! Controllers: the host objects a document binds against.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::object::{Notifier, Object, PropertyBag};
use crate::subscription::Subscriptions;
use crate::value::Value;
use crate::widget::{Handler, WidgetRef};

/// The object behind `$controller` and every `#signal: "handler"`.
///
/// Properties are exposed through [`Object`]; handlers are looked up by name
/// once, when a signal is bound.
///
/// ```rust
/// use std::rc::Rc;
/// use guml_ui::controller::Controller;
/// use guml_ui::object::{Notifier, Object, PropertyBag};
/// use guml_ui::value::Value;
/// use guml_ui::widget::Handler;
///
/// struct Counter { state: PropertyBag }
///
/// impl Object for Counter {
///     fn type_name(&self) -> &str { "CounterController" }
///     fn get(&self, name: &str) -> Option<Value> { self.state.get(name) }
///     fn notifier(&self) -> Option<&Notifier> { self.state.notifier() }
/// }
///
/// impl Controller for Counter {
///     fn handler(self: Rc<Self>, name: &str) -> Option<Handler> {
///         match name {
///             "on_bump" => Some(Rc::new(move |_| {
///                 let n = self.state.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
///                 self.state.set("count", n + 1.0);
///             })),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Controller: Object {
    /// Resolve a signal handler by name.
    fn handler(self: Rc<Self>, _name: &str) -> Option<Handler> {
        None
    }

    /// Called once the document is rendered and attached.
    fn created(&self, _handle: &ControllerHandle) {}

    fn update(&self, _delta: f64) {}

    /// Called before the handle detaches the rendered root.
    fn dispose(&self) {}
}

/// A bag of properties is a controller with no handlers.
impl Controller for PropertyBag {}

/// One rendered document's controller plus the state the renderer attaches
/// to it: the `@alias` table, imported child controllers, the rendered root
/// and every listener installed while rendering.
pub struct ControllerHandle {
    name: String,
    controller: Rc<dyn Controller>,
    nodes: RefCell<Vec<(String, WidgetRef)>>,
    imports: RefCell<Vec<(String, Rc<ControllerHandle>)>>,
    root: RefCell<Option<WidgetRef>>,
    subscriptions: Rc<Subscriptions>,
}

impl ControllerHandle {
    pub fn new(name: impl Into<String>, controller: Rc<dyn Controller>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            controller,
            nodes: RefCell::new(Vec::new()),
            imports: RefCell::new(Vec::new()),
            root: RefCell::new(None),
            subscriptions: Rc::new(Subscriptions::default()),
        })
    }

    /// Registered controller name, e.g. `MainController`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn controller(&self) -> &Rc<dyn Controller> {
        &self.controller
    }

    /// The widget declared as `@alias`.
    pub fn node(&self, alias: &str) -> Option<WidgetRef> {
        self.nodes.borrow().iter().find(|(k, _)| k == alias).map(|(_, w)| w.clone())
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub(crate) fn register_node(&self, alias: &str, widget: WidgetRef) {
        let mut nodes = self.nodes.borrow_mut();
        match nodes.iter_mut().find(|(k, _)| k == alias) {
            Some((_, w)) => *w = widget,
            None => nodes.push((alias.to_string(), widget)),
        }
    }

    /// The controller of an imported document, e.g. `SettingController`.
    pub fn import(&self, name: &str) -> Option<Rc<ControllerHandle>> {
        self.imports.borrow().iter().find(|(k, _)| k == name).map(|(_, h)| h.clone())
    }

    pub(crate) fn add_import(&self, name: String, handle: Rc<ControllerHandle>) {
        self.imports.borrow_mut().push((name, handle));
    }

    pub fn root(&self) -> Option<WidgetRef> {
        self.root.borrow().clone()
    }

    pub(crate) fn set_root(&self, root: WidgetRef) {
        *self.root.borrow_mut() = Some(root);
    }

    pub(crate) fn subscriptions(&self) -> &Rc<Subscriptions> {
        &self.subscriptions
    }

    /// Number of listeners currently installed for this document.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn handler(&self, name: &str) -> Option<Handler> {
        self.controller.clone().handler(name)
    }

    pub fn created(&self) {
        self.controller.created(self);
    }

    pub fn update(&self, delta: f64) {
        self.controller.update(delta);
    }

    /// Tear down: call the controller's `dispose`, dispose imported
    /// controllers, cancel every binding, and detach the rendered root.
    pub fn dispose(&self) {
        self.controller.dispose();
        self.teardown();
        log::debug!("disposed {}", self.name);
    }

    /// Undo a render that failed part way. `created` never ran, so the
    /// controller's own `dispose` is skipped.
    pub(crate) fn abandon(&self) {
        self.teardown();
        log::debug!("abandoned {} after a failed render", self.name);
    }

    fn teardown(&self) {
        let imports = std::mem::take(&mut *self.imports.borrow_mut());
        for (_, child) in &imports {
            child.dispose();
        }
        self.subscriptions.cancel_all();
        if let Some(root) = self.root.borrow_mut().take() {
            root.detach();
        }
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let imports: Vec<String> = self.imports.borrow().iter().map(|(k, _)| k.clone()).collect();
        f.debug_struct("ControllerHandle")
            .field("name", &self.name)
            .field("nodes", &self.node_names())
            .field("imports", &imports)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

/// Properties resolve on the controller first, then on imported controllers
/// by their registered name.
impl Object for ControllerHandle {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.controller.get(name).or_else(|| self.import(name).map(Value::from))
    }

    fn notifier(&self) -> Option<&Notifier> {
        self.controller.notifier()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetRegistry;
    use crate::widget::Widget;

    #[test]
    fn handle_delegates_to_controller_then_imports() {
        let main = ControllerHandle::new("MainController", Rc::new(PropertyBag::new("Main").with("title", "hi")));
        let child = ControllerHandle::new("SettingController", Rc::new(PropertyBag::new("Setting")));
        main.add_import("SettingController".into(), child.clone());
        assert_eq!(main.get("title"), Some("hi".into()));
        assert_eq!(main.get("SettingController"), Some(Value::from(child)));
        assert_eq!(main.get("nothing"), None);
        assert!(format!("{main:?}").contains(r#"imports: ["SettingController"]"#));
    }

    #[test]
    fn dispose_detaches_root() {
        let registry = WidgetRegistry::headless();
        let host = Widget::new(registry.get("Control").unwrap());
        let root = Widget::new(registry.get("VBox").unwrap());
        host.add_child(root.clone());

        let handle = ControllerHandle::new("MainController", Rc::new(PropertyBag::new("Main")));
        handle.set_root(root);
        handle.dispose();
        assert_eq!(host.child_count(), 0);
        assert!(handle.root().is_none());
    }
}
