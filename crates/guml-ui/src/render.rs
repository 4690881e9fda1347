//! Turns a parsed [`Document`] into a live widget tree.
//!
//! Rendering is a synchronous depth-first walk. Reactive properties and
//! `each` blocks leave listeners behind; those run synchronously inside the
//! notifying call and report failures to [`Environment::take_errors`].

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::{Rc, Weak};

use guml_markup::convert::{to_pascal_case, to_snake_case};
use guml_markup::{Binding, ComponentNode, Document, EachNode, Expr, Property, Signal};

use crate::controller::{Controller, ControllerHandle};
use crate::env::Environment;
use crate::error::RenderError;
use crate::eval::{Binder, Evaluator};
use crate::factory::WidgetFactory;
use crate::list::ListChange;
use crate::scope::Scope;
use crate::subscription::{Subscription, Subscriptions};
use crate::value::Value;
use crate::widget::{Widget, WidgetRef};

// ── Entry points ──────────────────────────────────────────────────────────

impl Environment {
    /// Render `doc` for `controller` and attach the result to `host_root`.
    ///
    /// Imports resolve to `<base_dir>/<module>.guml`. On failure nothing is
    /// attached to `host_root`: imports rendered so far are disposed and every
    /// listener the walk installed is cancelled.
    pub fn render(
        self: &Rc<Self>,
        doc: &Document,
        controller: &Rc<ControllerHandle>,
        host_root: &WidgetRef,
        base_dir: &Path,
    ) -> Result<WidgetRef, RenderError> {
        let top_mark = self.top_controllers.borrow().len();
        match self.render_tree(doc, controller, host_root, base_dir) {
            Ok(root) => {
                self.factory().add_child(host_root, &root);
                log::debug!("rendered {} for {}", doc.root.name, controller.name());
                Ok(root)
            }
            Err(e) => {
                self.top_controllers.borrow_mut().truncate(top_mark);
                controller.abandon();
                Err(e)
            }
        }
    }

    fn render_tree(
        self: &Rc<Self>,
        doc: &Document,
        controller: &Rc<ControllerHandle>,
        host_root: &WidgetRef,
        base_dir: &Path,
    ) -> Result<WidgetRef, RenderError> {
        let renderer = Renderer { env: self, controller, subs: controller.subscriptions() };
        let root = renderer.node(&doc.root, &Scope::new())?;
        controller.set_root(root.clone());

        for import in &doc.imports {
            let path = base_dir.join(format!("{}.guml", import.module));
            let parent = if import.top_level { host_root } else { &root };
            let child = self.load(parent, &path)?;
            let name = child.name().to_string();
            if import.top_level {
                self.top_controllers.borrow_mut().push((name.clone(), child.clone()));
            }
            controller.add_import(name, child);
        }
        Ok(root)
    }

    /// Read, parse and render a `.guml` file under `host_root`.
    ///
    /// The controller is `using "Name"` if the document says so, otherwise
    /// `<PascalCaseStem>Controller`; it must be registered. `created()` runs
    /// once the tree is attached.
    pub fn load(self: &Rc<Self>, host_root: &WidgetRef, path: &Path) -> Result<Rc<ControllerHandle>, RenderError> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| RenderError::Io { path: path.display().to_string(), message: e.to_string() })?;
        let doc = self.parse(&src)?;
        let name = match &doc.redirect_controller {
            Some(name) => name.clone(),
            None => controller_name(path),
        };
        let handle = self.create_controller(&name)?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        self.render(&doc, &handle, host_root, base_dir)?;
        handle.created();
        log::info!("loaded {} with {name}", path.display());
        Ok(handle)
    }

    /// Render source text against an existing controller instance.
    ///
    /// Imports resolve relative to the working directory.
    pub fn render_str(
        self: &Rc<Self>,
        src: &str,
        controller: Rc<dyn Controller>,
        host_root: &WidgetRef,
    ) -> Result<Rc<ControllerHandle>, RenderError> {
        let doc = self.parse(src)?;
        let handle = ControllerHandle::new(controller.type_name().to_string(), controller);
        self.render(&doc, &handle, host_root, Path::new("."))?;
        handle.created();
        Ok(handle)
    }
}

/// `main_menu.guml` → `MainMenuController`.
pub fn controller_name(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    format!("{}Controller", to_pascal_case(&stem))
}

// ── Property application ──────────────────────────────────────────────────

fn is_theme_overrides(key: &str) -> bool {
    to_snake_case(key) == "theme_overrides"
}

/// Apply one evaluated value to a widget property.
///
/// Object literals merge onto the object already stored there; a
/// `theme_overrides` object becomes one style override per entry.
fn apply(factory: &dyn WidgetFactory, widget: &WidgetRef, key: &str, value: Value) -> Result<(), RenderError> {
    if is_theme_overrides(key) {
        let Value::Map(entries) = value else {
            return Err(RenderError::type_error(format!("{key} takes an object literal, found {}", value.type_name())));
        };
        for (style, v) in entries {
            let kind = widget
                .class()
                .style_kind(&style)
                .ok_or_else(|| RenderError::property(format!("{} theme", widget.class_name()), style.clone()))?;
            factory.apply_style_override(widget, &style, kind, v)?;
        }
        return Ok(());
    }

    let value = match value {
        Value::Map(entries) => match factory.get_property(widget, key)? {
            Value::Map(mut current) => {
                for (k, v) in entries {
                    match current.iter_mut().find(|(ck, _)| *ck == k) {
                        Some((_, slot)) => *slot = v,
                        None => current.push((k, v)),
                    }
                }
                Value::Map(current)
            }
            _ => Value::Map(entries),
        },
        other => other,
    };
    factory.set_property(widget, key, value)
}

// ── Renderer ──────────────────────────────────────────────────────────────

struct Renderer<'a> {
    env: &'a Rc<Environment>,
    controller: &'a Rc<ControllerHandle>,
    /// Where listeners installed by this walk are recorded.
    subs: &'a Rc<Subscriptions>,
}

impl Renderer<'_> {
    fn eval(&self, expr: &Expr, scope: &Scope) -> Result<Value, RenderError> {
        Evaluator::new(self.env, Some(self.controller), scope).eval(expr)
    }

    fn node(&self, node: &ComponentNode, scope: &Scope) -> Result<WidgetRef, RenderError> {
        let factory = self.env.factory();
        let widget = factory.create(&node.name)?;
        log::trace!("render {} at {}", node.name, node.span);

        if let Some(alias) = &node.alias {
            self.controller.register_node(alias, widget.clone());
        }
        for property in &node.properties {
            self.property(&widget, property, scope)?;
        }
        for child in &node.children {
            let child = self.node(child, scope)?;
            factory.add_child(&widget, &child);
        }

        let mut previous: Option<Rc<EachState>> = None;
        for each in &node.each_blocks {
            let anchor = match &previous {
                Some(block) => Anchor::Block(Rc::downgrade(block)),
                None => widget.children().last().map_or(Anchor::Start, |w| Anchor::Widget(Rc::downgrade(w))),
            };
            let template = Rc::new(each.clone());
            previous = Some(self.each(template, &widget, anchor, scope)?);
        }

        for signal in &node.signals {
            self.signal(&widget, signal)?;
        }
        widget.emit("ready", &[])?;
        Ok(widget)
    }

    fn property(&self, widget: &WidgetRef, property: &Property, scope: &Scope) -> Result<(), RenderError> {
        let factory = self.env.factory();
        match property.binding {
            Binding::Static => {
                let value = self.eval(&property.value, scope)?;
                apply(factory, widget, &property.key, value)
            }
            Binding::Reactive => {
                let binding = Rc::new(LiveBinding {
                    env: self.env.clone(),
                    controller: self.controller.clone(),
                    widget: Rc::downgrade(widget),
                    key: property.key.clone(),
                    expr: property.value.clone(),
                    scope: scope.clone(),
                    subs: Rc::default(),
                    generation: Cell::new(0),
                    busy: Cell::new(false),
                });
                self.subs.add(Subscription::Nested(binding.subs.clone()));
                let value = binding.evaluate()?;
                apply(factory, widget, &property.key, value)
            }
        }
    }

    fn signal(&self, widget: &WidgetRef, signal: &Signal) -> Result<(), RenderError> {
        if !widget.class().has_event(&signal.event) {
            return Err(RenderError::SignalNotFound {
                widget: widget.class_name().to_string(),
                signal: signal.event.clone(),
            });
        }
        let handler = self.controller.handler(&signal.handler).ok_or_else(|| RenderError::HandlerNotFound {
            controller: self.controller.name().to_string(),
            handler: signal.handler.clone(),
        })?;
        self.env.factory().connect(widget, &signal.event, handler)
    }

    /// Render one `each` block under `parent` and keep it in sync with its list.
    fn each(
        &self,
        template: Rc<EachNode>,
        parent: &WidgetRef,
        anchor: Anchor,
        scope: &Scope,
    ) -> Result<Rc<EachState>, RenderError> {
        let list = match self.eval(&template.data_source, scope)? {
            Value::List(list) => list,
            other => {
                return Err(RenderError::type_error(format!(
                    "each needs an observable list, found {}",
                    other.type_name()
                )));
            }
        };
        log::debug!("each over {} item(s) using {}", list.len(), template.item_type);

        let state = Rc::new(EachState {
            nested: template.each_blocks.iter().cloned().map(Rc::new).collect(),
            template,
            parent: Rc::downgrade(parent),
            anchor,
            scope: scope.clone(),
            items: RefCell::new(Vec::new()),
        });
        for (index, value) in list.to_vec().into_iter().enumerate() {
            build_item(self.env, self.controller, &state, index, value)?;
        }

        // Owned by the handle's subscription bag; dispose unsubscribes it.
        let env = self.env.clone();
        let controller = self.controller.clone();
        let listener_state = state.clone();
        let id = list.subscribe(move |change| {
            let state = &listener_state;
            match change {
                ListChange::Add { index, value } | ListChange::Insert { index, value } => {
                    if let Err(e) = build_item(&env, &controller, state, *index, value.clone()) {
                        env.report(e);
                    }
                }
                ListChange::Remove { index, .. } => state.remove_item(*index, env.factory()),
            }
        });
        self.subs.add(Subscription::List(list, id));
        Ok(state)
    }
}

/// A `:=` property. Every evaluation re-subscribes from scratch, so a
/// replaced intermediate object stops being watched and its successor
/// starts.
struct LiveBinding {
    env: Rc<Environment>,
    controller: Rc<ControllerHandle>,
    widget: Weak<Widget>,
    key: String,
    expr: Expr,
    scope: Scope,
    subs: Rc<Subscriptions>,
    /// Bumped per evaluation; listeners from older rounds ignore changes.
    generation: Cell<u64>,
    busy: Cell<bool>,
}

impl LiveBinding {
    fn evaluate(self: &Rc<Self>) -> Result<Value, RenderError> {
        self.subs.cancel_all();
        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        let this = self.clone();
        let refresh: Rc<dyn Fn()> = Rc::new(move || {
            if this.generation.get() == generation {
                this.refresh();
            }
        });
        let binder = Binder::new(refresh, self.subs.clone());
        Evaluator::new(&self.env, Some(&self.controller), &self.scope).binding(&binder).eval(&self.expr)
    }

    fn refresh(self: &Rc<Self>) {
        let Some(widget) = self.widget.upgrade() else {
            log::debug!("binding '{}' outlived its widget; unsubscribing", self.key);
            self.subs.cancel_all();
            return;
        };
        if self.busy.replace(true) {
            log::warn!("binding '{}' changed its own inputs while refreshing; skipped", self.key);
            return;
        }
        let result = self.evaluate().and_then(|value| apply(self.env.factory(), &widget, &self.key, value));
        self.busy.set(false);
        match result {
            Ok(()) => log::trace!("refreshed {}.{}", widget.class_name(), self.key),
            Err(e) => self.env.report(e),
        }
    }
}

// ── each blocks ───────────────────────────────────────────────────────────

/// Where a block's first widget goes: right after the widget this resolves
/// to, or at index 0 when it resolves to nothing.
enum Anchor {
    Start,
    Widget(Weak<Widget>),
    /// After everything a sibling block rendered.
    Block(Weak<EachState>),
    /// After everything rendered before one item of an enclosing block.
    ItemStart(Weak<EachState>, Weak<Item>),
}

impl Anchor {
    fn resolve(&self) -> Option<WidgetRef> {
        match self {
            Anchor::Start => None,
            Anchor::Widget(w) => w.upgrade(),
            Anchor::Block(block) => block.upgrade().and_then(|b| b.end()),
            Anchor::ItemStart(block, item) => {
                let (block, item) = (block.upgrade()?, item.upgrade()?);
                block.before(&item)
            }
        }
    }
}

/// One instantiated element: its top-level widgets plus nested blocks.
#[derive(Default)]
struct Item {
    widgets: RefCell<Vec<WidgetRef>>,
    nested: RefCell<Vec<Rc<EachState>>>,
    subs: Rc<Subscriptions>,
}

impl Item {
    fn last(&self) -> Option<WidgetRef> {
        let nested = self.nested.borrow().iter().rev().find_map(|b| b.last());
        nested.or_else(|| self.widgets.borrow().last().cloned())
    }

    fn teardown(&self, factory: &dyn WidgetFactory) {
        let nested = std::mem::take(&mut *self.nested.borrow_mut());
        for block in &nested {
            block.teardown(factory);
        }
        self.subs.cancel_all();
        let widgets = std::mem::take(&mut *self.widgets.borrow_mut());
        for widget in &widgets {
            if let Some(parent) = widget.parent() {
                factory.remove_child(&parent, widget);
            }
        }
    }
}

struct EachState {
    template: Rc<EachNode>,
    nested: Vec<Rc<EachNode>>,
    parent: Weak<Widget>,
    anchor: Anchor,
    /// Scope in effect where the block appears.
    scope: Scope,
    items: RefCell<Vec<Rc<Item>>>,
}

impl Drop for Item {
    fn drop(&mut self) {
        self.subs.cancel_all();
    }
}

impl EachState {
    fn last(&self) -> Option<WidgetRef> {
        self.items.borrow().iter().rev().find_map(|i| i.last())
    }

    /// Last widget of this block, or of whatever precedes it.
    fn end(&self) -> Option<WidgetRef> {
        self.last().or_else(|| self.anchor.resolve())
    }

    /// Last widget rendered before `item`.
    fn before(&self, item: &Rc<Item>) -> Option<WidgetRef> {
        let preceding = {
            let items = self.items.borrow();
            let at = items.iter().position(|i| Rc::ptr_eq(i, item)).unwrap_or(items.len());
            items[..at].iter().rev().find_map(|i| i.last())
        };
        preceding.or_else(|| self.anchor.resolve())
    }

    fn remove_item(&self, index: usize, factory: &dyn WidgetFactory) {
        let item = {
            let mut items = self.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        };
        match item {
            Some(item) => item.teardown(factory),
            None => log::warn!("each block has no item {index} to remove"),
        }
    }

    fn teardown(&self, factory: &dyn WidgetFactory) {
        let items = std::mem::take(&mut *self.items.borrow_mut());
        for item in &items {
            item.teardown(factory);
        }
    }
}

/// Instantiate the block's template for the element now at `index`.
///
/// The index variable is a snapshot; later inserts and removals before this
/// item do not renumber it.
fn build_item(
    env: &Rc<Environment>,
    controller: &Rc<ControllerHandle>,
    state: &Rc<EachState>,
    index: usize,
    value: Value,
) -> Result<(), RenderError> {
    let Some(parent) = state.parent.upgrade() else {
        log::debug!("each block's parent is gone; item {index} not built");
        return Ok(());
    };
    let item = Rc::new(Item::default());
    {
        let mut items = state.items.borrow_mut();
        let at = index.min(items.len());
        items.insert(at, item.clone());
    }

    let template = &state.template;
    let scope = state.scope.push(vec![
        (template.index_var.clone(), Value::Int(index as i64)),
        (template.value_var.clone(), value),
    ]);
    let renderer = Renderer { env, controller, subs: &item.subs };
    let result = renderer.fill(state, &item, &parent, &scope);
    if result.is_err() {
        item.teardown(env.factory());
        state.items.borrow_mut().retain(|i| !Rc::ptr_eq(i, &item));
    }
    result
}

impl Renderer<'_> {
    fn fill(&self, state: &Rc<EachState>, item: &Rc<Item>, parent: &WidgetRef, scope: &Scope) -> Result<(), RenderError> {
        let factory = self.env.factory();
        for child in &state.template.children {
            let widget = self.node(child, scope)?;
            let after = item.last().or_else(|| state.before(item));
            let at = after.and_then(|w| parent.index_of(&w)).map_or(0, |i| i + 1);
            factory.add_child(parent, &widget);
            factory.move_child(parent, &widget, at);
            item.widgets.borrow_mut().push(widget);
        }

        for nested in &state.nested {
            let anchor = {
                let blocks = item.nested.borrow();
                let widgets = item.widgets.borrow();
                match (blocks.last(), widgets.last()) {
                    (Some(block), _) => Anchor::Block(Rc::downgrade(block)),
                    (None, Some(w)) => Anchor::Widget(Rc::downgrade(w)),
                    (None, None) => Anchor::ItemStart(Rc::downgrade(state), Rc::downgrade(item)),
                }
            };
            let block = self.each(nested.clone(), parent, anchor, scope)?;
            item.nested.borrow_mut().push(block);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::RegistryFactory;
    use crate::list::ObservableList;
    use crate::object::{Object, PropertyBag};
    use crate::widget::{Handler, StyleKind, WidgetRegistry};
    use crate::widgets::{button, container, textbox};

    fn host() -> WidgetRef {
        Widget::new(container::control_class())
    }

    fn text(w: &WidgetRef) -> String {
        w.property("text").unwrap().to_string()
    }

    fn texts(parent: &WidgetRef) -> Vec<String> {
        parent.children().iter().map(text).collect()
    }

    fn render(env: &Rc<Environment>, src: &str, controller: Rc<dyn Controller>) -> Result<Rc<ControllerHandle>, RenderError> {
        env.render_str(src, controller, &host())
    }

    fn bag() -> Rc<PropertyBag> {
        Rc::new(PropertyBag::new("MainController"))
    }

    /// Counts creations and property writes.
    struct CountingFactory {
        inner: RegistryFactory,
        created: Rc<Cell<usize>>,
        writes: Rc<RefCell<Vec<String>>>,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self { inner: RegistryFactory::headless(), created: Rc::default(), writes: Rc::default() }
        }
    }

    impl WidgetFactory for CountingFactory {
        fn create(&self, type_name: &str) -> Result<WidgetRef, RenderError> {
            self.created.set(self.created.get() + 1);
            self.inner.create(type_name)
        }

        fn set_property(&self, widget: &WidgetRef, name: &str, value: Value) -> Result<(), RenderError> {
            self.writes.borrow_mut().push(format!("{name}={value}"));
            widget.set_property(name, value)
        }
    }

    #[test]
    fn renders_tree_in_source_order() {
        let env = Rc::new(Environment::new());
        let root = host();
        let handle = env
            .render_str(
                r#"VBox { @title: Label { text: "a" } Label { text: "b" } HBox { Button { text: "c" } } }"#,
                bag(),
                &root,
            )
            .unwrap();
        let vbox = root.child(0).unwrap();
        assert_eq!(vbox.class_name(), "VBox");
        assert_eq!((text(&vbox.child(0).unwrap()), text(&vbox.child(1).unwrap())), ("a".into(), "b".into()));
        assert_eq!(text(&vbox.child(2).unwrap().child(0).unwrap()), "c");
        assert!(Rc::ptr_eq(&handle.node("title").unwrap(), &vbox.child(0).unwrap()));
        assert!(Rc::ptr_eq(&handle.root().unwrap(), &vbox));
    }

    #[test]
    fn unknown_component_and_property() {
        let env = Rc::new(Environment::new());
        let root = host();
        let e = env.render_str("VBox { Spinner { } }", bag(), &root).unwrap_err();
        assert_eq!(e, RenderError::ComponentNotFound { name: "Spinner".into() });
        assert_eq!(root.child_count(), 0);

        let e = render(&env, "Label { colour: 1 }", bag()).unwrap_err();
        assert_eq!(e, RenderError::property("Label", "colour"));
    }

    #[test]
    fn reactive_binding_updates_in_place() {
        let factory = CountingFactory::new();
        let (created, writes) = (factory.created.clone(), factory.writes.clone());
        let env = Rc::new(Environment::with_factory(factory));
        let state = Rc::new(PropertyBag::new("MainController").with("count", 1));
        let root = host();
        env.render_str(
            r#"VBox { Label { text := "n=" + $controller.count } Label { text: "static" } }"#,
            state.clone(),
            &root,
        )
        .unwrap();
        assert_eq!(created.get(), 3);
        let label = root.child(0).unwrap().child(0).unwrap();
        assert_eq!(text(&label), "n=1");

        writes.borrow_mut().clear();
        state.set("count", 2);
        assert_eq!(text(&label), "n=2");
        assert_eq!(created.get(), 3);
        assert_eq!(*writes.borrow(), ["text=n=2"]);

        state.set("unrelated", 0);
        assert_eq!(writes.borrow().len(), 1);
    }

    #[test]
    fn binding_follows_another_widget() {
        let env = Rc::new(Environment::new());
        let root = host();
        let handle = env
            .render_str(
                r#"VBox { @input: LineEdit { text: "hi" } Label { text := @input.text + "!" } }"#,
                bag(),
                &root,
            )
            .unwrap();
        let label = root.child(0).unwrap().child(1).unwrap();
        assert_eq!(text(&label), "hi!");
        textbox::input(&handle.node("input").unwrap(), "hello").unwrap();
        assert_eq!(text(&label), "hello!");
    }

    #[test]
    fn forward_alias_reference_fails() {
        let env = Rc::new(Environment::new());
        let e = render(&env, r#"VBox { Label { text: @later.text } @later: Label { } }"#, bag()).unwrap_err();
        assert_eq!(e, RenderError::reference(guml_markup::RefKind::LocalAlias, "later"));
    }

    #[test]
    fn refresh_errors_are_reported() {
        let env = Rc::new(Environment::new());
        let state = Rc::new(PropertyBag::new("MainController").with("d", 2));
        render(&env, "Label { text := 10 / $controller.d }", state.clone()).unwrap();
        state.set("d", 0);
        assert_eq!(env.take_errors(), [RenderError::DivisionByZero]);
    }

    #[test]
    fn object_literal_merges_onto_current_value() {
        let env = Rc::new(Environment::new());
        let state = Rc::new(PropertyBag::new("MainController").with("s", Value::Map(vec![("font_size".into(), 20.into())])));
        let root = host();
        env.render_str("Label { label_settings := $controller.s }", state.clone(), &root).unwrap();
        let label = root.child(0).unwrap();
        assert_eq!(label.property("label_settings").unwrap().entry("font_size"), Some(&Value::Float(20.0)));

        state.set("s", Value::Map(vec![("outline_size".into(), 2.into())]));
        let settings = label.property("label_settings").unwrap();
        assert_eq!(settings.entry("font_size"), Some(&Value::Float(20.0)));
        assert_eq!(settings.entry("outline_size"), Some(&Value::Float(2.0)));

        let e = render(&env, "Label { label_settings: { glow: 1 } }", bag()).unwrap_err();
        assert_eq!(e, RenderError::property("LabelSettings", "glow"));
    }

    #[test]
    fn theme_overrides_use_style_table() {
        let env = Rc::new(Environment::new());
        let root = host();
        env.render_str(
            "Label { theme_overrides: { font_color: color(1, 0, 0), font_size: 18 } }",
            bag(),
            &root,
        )
        .unwrap();
        let label = root.child(0).unwrap();
        assert_eq!(label.style_override("font_size"), Some((StyleKind::FontSize, Value::Int(18))));
        assert_eq!(label.style_override("font_color").map(|(k, _)| k), Some(StyleKind::Color));

        let e = render(&env, "Label { theme_overrides: { shadow: 1 } }", bag()).unwrap_err();
        assert_eq!(e, RenderError::property("Label theme", "shadow"));
    }

    struct Clicks {
        state: PropertyBag,
        count: Cell<u32>,
    }

    impl Object for Clicks {
        fn type_name(&self) -> &str {
            "ClickController"
        }

        fn get(&self, name: &str) -> Option<Value> {
            self.state.get(name)
        }
    }

    impl Controller for Clicks {
        fn handler(self: Rc<Self>, name: &str) -> Option<Handler> {
            match name {
                "on_click" => Some(Rc::new(move |_: &[Value]| self.count.set(self.count.get() + 1))),
                _ => None,
            }
        }
    }

    #[test]
    fn signals_bind_to_controller_handlers() {
        let env = Rc::new(Environment::new());
        let clicks = Rc::new(Clicks { state: PropertyBag::new("state"), count: Cell::new(0) });
        let handle = env
            .render_str(r#"VBox { @go: Button { #pressed: "on_click" } }"#, clicks.clone(), &host())
            .unwrap();
        button::press(&handle.node("go").unwrap()).unwrap();
        button::press(&handle.node("go").unwrap()).unwrap();
        assert_eq!(clicks.count.get(), 2);

        let e = render(&env, r#"Label { #pressed: "on_click" }"#, clicks.clone()).unwrap_err();
        assert_eq!(e, RenderError::SignalNotFound { widget: "Label".into(), signal: "pressed".into() });
        let e = render(&env, r#"Button { #pressed: "on_missing" }"#, clicks).unwrap_err();
        assert_eq!(
            e,
            RenderError::HandlerNotFound { controller: "ClickController".into(), handler: "on_missing".into() }
        );
    }

    fn list_env(items: &ObservableList) -> (Rc<Environment>, WidgetRef) {
        let env = Rc::new(Environment::new());
        env.set_global("items", items.clone());
        (env, host())
    }

    #[test]
    fn each_tracks_add_and_remove() {
        let items: ObservableList = ["a", "b"].into_iter().collect();
        let (env, root) = list_env(&items);
        env.render_str(
            "VBox { Label { text: \"head\" } each $items using Label { |i, name| Label { text: i + \":\" + name } } }",
            bag(),
            &root,
        )
        .unwrap();
        let vbox = root.child(0).unwrap();
        assert_eq!(texts(&vbox), ["head", "0:a", "1:b"]);
        let (first, second) = (vbox.child(1).unwrap(), vbox.child(2).unwrap());

        items.push("c");
        assert_eq!(texts(&vbox), ["head", "0:a", "1:b", "2:c"]);
        assert!(Rc::ptr_eq(&vbox.child(1).unwrap(), &first));
        assert!(Rc::ptr_eq(&vbox.child(2).unwrap(), &second));

        items.remove(0);
        assert_eq!(texts(&vbox), ["head", "1:b", "2:c"]);
        assert!(first.parent().is_none());
        assert!(Rc::ptr_eq(&vbox.child(1).unwrap(), &second));
    }

    #[test]
    fn each_insert_lands_at_index() {
        let items: ObservableList = ["a", "c"].into_iter().collect();
        let (env, root) = list_env(&items);
        env.render_str(
            "VBox { each $items using Item { |i, v| Label { text: v } Button { text: v } } }",
            bag(),
            &root,
        )
        .unwrap();
        let vbox = root.child(0).unwrap();
        items.insert(1, "b");
        assert_eq!(texts(&vbox), ["a", "a", "b", "b", "c", "c"]);
        items.insert(0, "_");
        assert_eq!(texts(&vbox)[..2], ["_", "_"]);
        items.clear();
        assert_eq!(vbox.child_count(), 0);
    }

    #[test]
    fn sibling_blocks_keep_their_slots() {
        let xs: ObservableList = ["x"].into_iter().collect();
        let ys: ObservableList = ["y"].into_iter().collect();
        let env = Rc::new(Environment::new());
        env.set_global("xs", xs.clone());
        env.set_global("ys", ys.clone());
        let root = host();
        env.render_str(
            "VBox { each $xs using Entry { |i, v| Label { text: v } } each $ys using Entry { |i, v| Label { text: v } } }",
            bag(),
            &root,
        )
        .unwrap();
        let vbox = root.child(0).unwrap();
        xs.push("x2");
        ys.insert(0, "y0");
        assert_eq!(texts(&vbox), ["x", "x2", "y0", "y"]);
    }

    #[test]
    fn nested_each_and_shadowing() {
        let row_a: ObservableList = ["a1", "a2"].into_iter().collect();
        let row_b: ObservableList = ["b1"].into_iter().collect();
        let rows: ObservableList = [row_a.clone(), row_b.clone()].into_iter().collect();
        let (env, root) = list_env(&rows);
        env.render_str(
            "VBox { each $items using Row { |i, row| Label { text: \"row\" + i } each row using Cell { |i, cell| Label { text: cell + \"@\" + i } } } }",
            bag(),
            &root,
        )
        .unwrap();
        let vbox = root.child(0).unwrap();
        assert_eq!(texts(&vbox), ["row0", "a1@0", "a2@1", "row1", "b1@0"]);

        row_a.push("a3");
        assert_eq!(texts(&vbox), ["row0", "a1@0", "a2@1", "a3@2", "row1", "b1@0"]);
        rows.remove(0);
        assert_eq!(texts(&vbox), ["row1", "b1@0"]);
        assert_eq!(row_a.listener_count(), 0);
        row_b.insert(0, "b0");
        assert_eq!(texts(&vbox), ["row1", "b0@0", "b1@0"]);
    }

    #[test]
    fn each_requires_a_list() {
        let env = Rc::new(Environment::new());
        env.set_global("n", 3);
        let e = render(&env, "VBox { each $n using Entry { |i, v| Label { } } }", bag()).unwrap_err();
        assert!(matches!(e, RenderError::Type { .. }));
    }

    #[test]
    fn dispose_cancels_listeners() {
        let items: ObservableList = ["a"].into_iter().collect();
        let (env, root) = list_env(&items);
        let state = Rc::new(PropertyBag::new("MainController").with("t", "x"));
        let handle = env
            .render_str(
                "VBox { Label { text := $controller.t } each $items using Entry { |i, v| Label { text := v + $controller.t } } }",
                state.clone(),
                &root,
            )
            .unwrap();
        assert_eq!(handle.subscription_count(), 2);
        assert_eq!(state.notifier().map(|n| n.listener_count()), Some(2));

        handle.dispose();
        assert_eq!(handle.subscription_count(), 0);
        assert_eq!(items.listener_count(), 0);
        assert_eq!(root.child_count(), 0);
        assert_eq!(state.notifier().map(|n| n.listener_count()), Some(0));
    }

    #[test]
    fn each_keeps_running_after_handle_is_dropped() {
        let items: ObservableList = ["a"].into_iter().collect();
        let (env, root) = list_env(&items);
        let handle = env
            .render_str("VBox { each $items using Entry { |i, v| Label { text: v } } }", bag(), &root)
            .unwrap();
        drop(handle);
        items.push("b");
        items.insert(0, "_");
        assert_eq!(texts(&root.child(0).unwrap()), ["_", "a", "b"]);
        assert_eq!(items.listener_count(), 1);
    }

    #[test]
    fn failed_render_releases_listeners() {
        let items: ObservableList = ["a"].into_iter().collect();
        let (env, root) = list_env(&items);
        let state = Rc::new(PropertyBag::new("MainController").with("t", "x"));
        let e = env
            .render_str(
                r#"VBox { #ready: "on_missing" Label { text := $controller.t } each $items using Entry { |i, v| Label { text := v + $controller.t } } }"#,
                state.clone(),
                &root,
            )
            .unwrap_err();
        assert_eq!(e, RenderError::HandlerNotFound { controller: "MainController".into(), handler: "on_missing".into() });
        assert_eq!(root.child_count(), 0);
        assert_eq!(items.listener_count(), 0);
        assert_eq!(state.notifier().map(|n| n.listener_count()), Some(0));
    }

    #[test]
    fn binding_rewatches_replaced_intermediate() {
        let old = Rc::new(PropertyBag::new("Inner").with("v", "old"));
        let state = Rc::new(PropertyBag::new("MainController").with("inner", old.clone()));
        let env = Rc::new(Environment::new());
        let root = host();
        let _handle = env.render_str("Label { text := $controller.inner.v }", state.clone(), &root).unwrap();
        let label = root.child(0).unwrap();
        assert_eq!(text(&label), "old");

        let fresh = Rc::new(PropertyBag::new("Inner").with("v", "new1"));
        state.set("inner", fresh.clone());
        assert_eq!(text(&label), "new1");
        assert_eq!(old.notifier().map(|n| n.listener_count()), Some(0));

        fresh.set("v", "new2");
        assert_eq!(text(&label), "new2");
        old.set("v", "stale");
        assert_eq!(text(&label), "new2");
        assert_eq!(state.notifier().map(|n| n.listener_count()), Some(1));
        assert!(env.take_errors().is_empty());
    }

    #[test]
    fn load_resolves_imports_and_controllers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.guml"),
            r#"import "setting_panel" import_top "overlay" VBox { @title: Label { text: "main" } }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("setting_panel.guml"), r#"Panel { Label { text := $controller.mode } }"#).unwrap();
        std::fs::write(dir.path().join("overlay.guml"), r#"using "HudController" Label { text: "hud" }"#).unwrap();

        let mut env = Environment::new();
        env.register_controller("MainController", || Rc::new(PropertyBag::new("Main")));
        env.register_controller("SettingPanelController", || Rc::new(PropertyBag::new("Setting").with("mode", "dark")));
        env.register_controller("HudController", || Rc::new(PropertyBag::new("Hud")));
        let env = Rc::new(env);

        let root = host();
        let main = env.load(&root, &dir.path().join("main.guml")).unwrap();
        assert_eq!(main.name(), "MainController");

        let vbox = main.root().unwrap();
        let panel = vbox.child(1).unwrap();
        assert_eq!(panel.class_name(), "Panel");
        assert_eq!(text(&panel.child(0).unwrap()), "dark");

        assert_eq!(root.children().iter().map(|w| w.class_name().to_string()).collect::<Vec<_>>(), ["Label", "VBox"]);
        assert_eq!(env.top_controller_names(), ["HudController"]);
        let setting = main.import("SettingPanelController").unwrap();
        assert_eq!(setting.get("mode"), Some(Value::Str("dark".into())));
        assert!(matches!(main.get("SettingPanelController"), Some(Value::Object(_))));
    }

    #[test]
    fn load_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("about.guml"), "Label { }").unwrap();
        std::fs::write(dir.path().join("broken.guml"), "Label {").unwrap();
        let env = Rc::new(Environment::new());
        let root = host();

        let e = env.load(&root, &dir.path().join("about.guml")).unwrap_err();
        assert_eq!(e, RenderError::ControllerNotFound { name: "AboutController".into() });
        assert!(matches!(env.load(&root, &dir.path().join("broken.guml")), Err(RenderError::Parse(_))));
        assert!(matches!(env.load(&root, &dir.path().join("nope.guml")), Err(RenderError::Io { .. })));
    }

    #[test]
    fn controller_names_from_paths() {
        assert_eq!(controller_name(Path::new("ui/main.guml")), "MainController");
        assert_eq!(controller_name(Path::new("main_menu.guml")), "MainMenuController");
    }

    #[test]
    fn custom_registry() {
        let mut registry = WidgetRegistry::new();
        registry.register(container::panel_class());
        let env = Rc::new(Environment::with_factory(RegistryFactory::new(registry)));
        assert!(render(&env, "Panel { }", bag()).is_ok());
        assert!(matches!(render(&env, "Label { }", bag()), Err(RenderError::ComponentNotFound { .. })));
    }
}
