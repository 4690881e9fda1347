use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use guml_engine::coords::Vec2;
use guml_engine::paint::Color;
use guml_markup::convert::to_snake_case;

use crate::error::RenderError;
use crate::object::{Notifier, Object};
use crate::value::Value;

/// A live widget handle. Parents own their children; children point back weakly.
pub type WidgetRef = Rc<Widget>;

/// A bound signal listener. Receives the event's arguments.
pub type Handler = Rc<dyn Fn(&[Value])>;

/// How a theme-override entry is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    Constant,
    Color,
    Font,
    FontSize,
    Icon,
    Style,
}

// ── Widget data ───────────────────────────────────────────────────────────

/// Properties every widget class shares.
#[derive(Debug, Clone)]
pub struct BaseProps {
    pub name: String,
    pub visible: bool,
    pub position: Vec2,
    pub size: Vec2,
    pub modulate: Color,
    pub tooltip: String,
}

impl Default for BaseProps {
    fn default() -> Self {
        Self {
            name: String::new(),
            visible: true,
            position: Vec2::zero(),
            size: Vec2::zero(),
            modulate: Color::WHITE,
            tooltip: String::new(),
        }
    }
}

pub struct WidgetData {
    pub base: BaseProps,
    /// Class-specific state; its concrete type is fixed by the class builder.
    pub state: Box<dyn Any>,
}

// ── WidgetClass ───────────────────────────────────────────────────────────

type Getter = Rc<dyn Fn(&WidgetData) -> Value>;
type Setter = Rc<dyn Fn(&mut WidgetData, Value) -> Result<(), RenderError>>;

struct PropertySlot {
    name: String,
    get: Getter,
    set: Setter,
}

/// The capability table of one widget type: its properties, events and
/// theme-override keys, all looked up by name.
///
/// Lookups accept the registered `snake_case` name or any spelling that
/// normalises to it (`FontSize` finds `font_size`).
pub struct WidgetClass {
    name: String,
    properties: Vec<PropertySlot>,
    events: Vec<String>,
    styles: Vec<(String, StyleKind)>,
    init: Box<dyn Fn() -> Box<dyn Any>>,
}

impl WidgetClass {
    /// Start a class whose widgets carry state of type `S`.
    ///
    /// The base properties and the `ready` event are pre-registered.
    pub fn builder<S: Default + 'static>(name: impl Into<String>) -> ClassBuilder<S> {
        let class = WidgetClass {
            name: name.into(),
            properties: Vec::new(),
            events: vec!["ready".to_string()],
            styles: Vec::new(),
            init: Box::new(|| Box::new(S::default())),
        };
        ClassBuilder { class, _state: PhantomData }.with_base_properties()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.canonical_event(name).is_some()
    }

    pub fn style_kind(&self, key: &str) -> Option<StyleKind> {
        let snake = to_snake_case(key);
        self.styles.iter().find(|(k, _)| k == key || *k == snake).map(|(_, kind)| *kind)
    }

    fn slot(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.iter().find(|p| p.name == name).or_else(|| {
            let snake = to_snake_case(name);
            self.properties.iter().find(|p| p.name == snake)
        })
    }

    fn canonical_event(&self, name: &str) -> Option<&str> {
        let snake = to_snake_case(name);
        self.events.iter().find(|e| *e == name || **e == snake).map(String::as_str)
    }
}

/// Typed front end for building a [`WidgetClass`].
///
/// ```rust
/// use guml_ui::value::Value;
/// use guml_ui::widget::{StyleKind, Widget, WidgetClass};
///
/// #[derive(Default)]
/// struct Badge { count: i64 }
///
/// let class = WidgetClass::builder::<Badge>("Badge")
///     .property("count", |s| Value::Int(s.count), |s, v| { s.count = v.to_i64()?; Ok(()) })
///     .event("cleared")
///     .style("font_color", StyleKind::Color)
///     .build();
///
/// let badge = Widget::new(class);
/// badge.set_property("count", Value::Int(3)).unwrap();
/// assert_eq!(badge.property("count").unwrap(), Value::Int(3));
/// ```
pub struct ClassBuilder<S> {
    class: WidgetClass,
    _state: PhantomData<fn() -> S>,
}

impl<S: Default + 'static> ClassBuilder<S> {
    pub fn property(
        mut self,
        name: impl Into<String>,
        get: impl Fn(&S) -> Value + 'static,
        set: impl Fn(&mut S, Value) -> Result<(), RenderError> + 'static,
    ) -> Self {
        let name = name.into();
        let class_name = self.class.name.clone();
        let get: Getter = Rc::new(move |data: &WidgetData| data.state.downcast_ref::<S>().map_or(Value::Null, &get));
        let property = name.clone();
        let set: Setter = Rc::new(move |data: &mut WidgetData, value: Value| match data.state.downcast_mut::<S>() {
            Some(state) => set(state, value),
            None => Err(RenderError::property(class_name.clone(), property.clone())),
        });
        self.class.properties.push(PropertySlot { name, get, set });
        self
    }

    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.class.events.push(name.into());
        self
    }

    pub fn style(mut self, key: impl Into<String>, kind: StyleKind) -> Self {
        self.class.styles.push((key.into(), kind));
        self
    }

    pub fn build(self) -> Rc<WidgetClass> {
        Rc::new(self.class)
    }

    fn base(mut self, name: &str, get: fn(&BaseProps) -> Value, set: fn(&mut BaseProps, Value) -> Result<(), RenderError>) -> Self {
        self.class.properties.push(PropertySlot {
            name: name.to_string(),
            get: Rc::new(move |data: &WidgetData| get(&data.base)),
            set: Rc::new(move |data: &mut WidgetData, value| set(&mut data.base, value)),
        });
        self
    }

    fn with_base_properties(self) -> Self {
        self.base("name", |b| Value::Str(b.name.clone()), |b, v| Ok(b.name = v.to_text()?))
            .base("visible", |b| Value::Bool(b.visible), |b, v| Ok(b.visible = v.to_bool()?))
            .base("position", |b| Value::Vec2(b.position), |b, v| Ok(b.position = v.to_vec2()?))
            .base("size", |b| Value::Vec2(b.size), |b, v| Ok(b.size = v.to_vec2()?))
            .base("modulate", |b| Value::Color(b.modulate), |b, v| Ok(b.modulate = v.to_color()?))
            .base("tooltip", |b| Value::Str(b.tooltip.clone()), |b, v| Ok(b.tooltip = v.to_text()?))
    }
}

// ── WidgetRegistry ────────────────────────────────────────────────────────

/// Widget classes by type name.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    classes: HashMap<String, Rc<WidgetClass>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in headless toolkit.
    pub fn headless() -> Self {
        let mut registry = Self::new();
        crate::widgets::register_all(&mut registry);
        registry
    }

    /// Register `class`, replacing any class of the same name.
    pub fn register(&mut self, class: Rc<WidgetClass>) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<Rc<WidgetClass>> {
        self.classes.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ── Widget ────────────────────────────────────────────────────────────────

/// One live widget instance.
pub struct Widget {
    class: Rc<WidgetClass>,
    data: RefCell<WidgetData>,
    children: RefCell<Vec<WidgetRef>>,
    parent: RefCell<Weak<Widget>>,
    connections: RefCell<Vec<(String, Handler)>>,
    style_overrides: RefCell<Vec<(String, StyleKind, Value)>>,
    notifier: Notifier,
}

impl Widget {
    pub fn new(class: Rc<WidgetClass>) -> WidgetRef {
        let state = (class.init)();
        Rc::new(Widget {
            class,
            data: RefCell::new(WidgetData { base: BaseProps::default(), state }),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            connections: RefCell::new(Vec::new()),
            style_overrides: RefCell::new(Vec::new()),
            notifier: Notifier::new(),
        })
    }

    pub fn class(&self) -> &WidgetClass {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// The `name` base property.
    pub fn name(&self) -> String {
        self.data.borrow().base.name.clone()
    }

    // ── Properties ────────────────────────────────────────────────────────

    pub fn property(&self, name: &str) -> Result<Value, RenderError> {
        let slot = self.class.slot(name).ok_or_else(|| RenderError::property(self.class_name(), name))?;
        let data = self.data.borrow();
        Ok((slot.get)(&*data))
    }

    /// Set a property and notify listeners of its canonical name.
    pub fn set_property(&self, name: &str, value: Value) -> Result<(), RenderError> {
        let slot = self.class.slot(name).ok_or_else(|| RenderError::property(self.class_name(), name))?;
        {
            let mut data = self.data.borrow_mut();
            (slot.set)(&mut *data, value)?;
        }
        self.notifier.notify(&slot.name);
        Ok(())
    }

    /// Read the class-specific state, if it has type `S`.
    pub fn with_state<S: 'static, R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.data.borrow().state.downcast_ref::<S>().map(f)
    }

    /// Mutate the class-specific state, then notify `changed`.
    pub fn update_state<S: 'static, R>(&self, changed: &str, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let result = self.data.borrow_mut().state.downcast_mut::<S>().map(f);
        if result.is_some() {
            self.notifier.notify(changed);
        }
        result
    }

    // ── Tree ──────────────────────────────────────────────────────────────

    pub fn children(&self) -> Vec<WidgetRef> {
        self.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn child(&self, index: usize) -> Option<WidgetRef> {
        self.children.borrow().get(index).cloned()
    }

    pub fn parent(&self) -> Option<WidgetRef> {
        self.parent.borrow().upgrade()
    }

    pub fn index_of(&self, child: &WidgetRef) -> Option<usize> {
        self.children.borrow().iter().position(|c| Rc::ptr_eq(c, child))
    }

    /// Append `child`, detaching it from any previous parent.
    pub fn add_child(self: &Rc<Self>, child: WidgetRef) {
        child.detach();
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child);
    }

    pub fn remove_child(&self, child: &WidgetRef) -> bool {
        let Some(index) = self.index_of(child) else {
            return false;
        };
        let removed = self.children.borrow_mut().remove(index);
        *removed.parent.borrow_mut() = Weak::new();
        true
    }

    /// Move an existing child to `index` (clamped to the last position).
    pub fn move_child(&self, child: &WidgetRef, index: usize) {
        let Some(from) = self.index_of(child) else {
            return;
        };
        let mut children = self.children.borrow_mut();
        let c = children.remove(from);
        let to = index.min(children.len());
        children.insert(to, c);
    }

    /// Remove this widget from its parent, if any.
    pub fn detach(self: &Rc<Self>) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Depth-first search for a descendant (or self) whose `name` matches.
    pub fn find(self: &Rc<Self>, name: &str) -> Option<WidgetRef> {
        if self.data.borrow().base.name == name {
            return Some(self.clone());
        }
        self.children().iter().find_map(|c| c.find(name))
    }

    // ── Signals ───────────────────────────────────────────────────────────

    pub fn connect(&self, event: &str, handler: Handler) -> Result<(), RenderError> {
        let Some(event) = self.class.canonical_event(event) else {
            return Err(RenderError::SignalNotFound { widget: self.class_name().to_string(), signal: event.to_string() });
        };
        self.connections.borrow_mut().push((event.to_string(), handler));
        Ok(())
    }

    /// Invoke every handler connected to `event`, in connection order.
    pub fn emit(&self, event: &str, args: &[Value]) -> Result<(), RenderError> {
        let Some(event) = self.class.canonical_event(event) else {
            return Err(RenderError::SignalNotFound { widget: self.class_name().to_string(), signal: event.to_string() });
        };
        let handlers: Vec<Handler> =
            self.connections.borrow().iter().filter(|(e, _)| e == event).map(|(_, h)| h.clone()).collect();
        log::trace!("{}.{event}: {} handler(s)", self.class_name(), handlers.len());
        for handler in handlers {
            handler(args);
        }
        Ok(())
    }

    pub fn connection_count(&self, event: &str) -> usize {
        self.connections.borrow().iter().filter(|(e, _)| e == event).count()
    }

    // ── Theme overrides ───────────────────────────────────────────────────

    pub fn apply_style_override(&self, key: &str, kind: StyleKind, value: Value) {
        let mut overrides = self.style_overrides.borrow_mut();
        match overrides.iter_mut().find(|(k, _, _)| k == key) {
            Some(entry) => *entry = (key.to_string(), kind, value),
            None => overrides.push((key.to_string(), kind, value)),
        }
    }

    pub fn style_override(&self, key: &str) -> Option<(StyleKind, Value)> {
        self.style_overrides.borrow().iter().find(|(k, _, _)| k == key).map(|(_, kind, v)| (*kind, v.clone()))
    }

    // ── Debug output ──────────────────────────────────────────────────────

    /// Indented outline of this subtree: class, `#name`, and `text` if the
    /// class has one.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.write_outline(&mut out, 0);
        out
    }

    fn write_outline(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{:indent$}{}", "", self.class_name(), indent = depth * 2);
        let name = self.name();
        if !name.is_empty() {
            let _ = write!(out, " #{name}");
        }
        if let Ok(Value::Str(text)) = self.property("text") {
            let _ = write!(out, " {text:?}");
        }
        out.push('\n');
        for child in self.children() {
            child.write_outline(out, depth + 1);
        }
    }
}

impl std::fmt::Debug for Widget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("class", &self.class_name())
            .field("children", &self.child_count())
            .finish_non_exhaustive()
    }
}

impl Object for Widget {
    fn type_name(&self) -> &str {
        self.class_name()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.property(name).ok()
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.notifier)
    }
}
