//! GUML UI runtime: renders parsed `.guml` documents into live, reactive
//! widget trees.
//!
//! # Quick start
//!
//! ```rust
//! use std::rc::Rc;
//! use guml_ui::prelude::*;
//!
//! let state = Rc::new(PropertyBag::new("CounterController").with("count", 0));
//! let host = Widget::new(WidgetRegistry::headless().get("Control").unwrap());
//!
//! let (_env, _handle) = Application::new()
//!     .render_str(
//!         r#"VBox { @label: Label { text := "Clicked " + $controller.count + " times" } }"#,
//!         state.clone(),
//!         &host,
//!     )
//!     .unwrap();
//!
//! state.set("count", 3);
//! let label = host.child(0).unwrap().child(0).unwrap();
//! assert_eq!(label.property("text").unwrap(), Value::from("Clicked 3 times"));
//! ```
//!
//! # Extending with custom widgets
//!
//! Describe a widget once as a [`WidgetClass`](widget::WidgetClass): its
//! typed properties, events and style keys. Register it with
//! [`Application::widget`], or implement [`WidgetFactory`](factory::WidgetFactory)
//! to back GUML with a different toolkit entirely.
//!
//! ```rust
//! use guml_ui::prelude::*;
//!
//! #[derive(Default)]
//! struct Gauge { ratio: f32 }
//!
//! let gauge = WidgetClass::builder::<Gauge>("Gauge")
//!     .property("ratio", |s| Value::Float(s.ratio.into()), |s, v| Ok(s.ratio = v.to_f32()?))
//!     .event("filled")
//!     .build();
//! let app = Application::new().widget(gauge);
//! ```

pub mod app;
pub mod controller;
pub mod env;
pub mod error;
mod eval;
pub mod factory;
pub mod list;
pub mod object;
mod render;
pub mod scope;
mod subscription;
pub mod value;
pub mod widget;
pub mod widgets;

pub use app::Application;
pub use render::controller_name;

/// Everything needed to drive a GUML session from host code.
pub mod prelude {
    pub use crate::app::Application;
    pub use crate::controller::{Controller, ControllerHandle};
    pub use crate::env::{Environment, FileLoader, ResourceLoader};
    pub use crate::error::RenderError;
    pub use crate::factory::{RegistryFactory, WidgetFactory};
    pub use crate::list::{ListChange, ObservableList};
    pub use crate::object::{Notifier, Object, PropertyBag};
    pub use crate::scope::Scope;
    pub use crate::value::{Resource, StyleBox, Value};
    pub use crate::widget::{Handler, StyleKind, Widget, WidgetClass, WidgetRef, WidgetRegistry};

    // Re-export the engine primitives property values are built from.
    pub use guml_engine::coords::Vec2;
    pub use guml_engine::paint::Color;
}
