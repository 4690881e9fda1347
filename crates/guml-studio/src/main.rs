use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::{Rc, Weak};

use anyhow::{Context, Result};

use guml_engine::logging::{init_logging, LoggingConfig};
use guml_ui::prelude::*;
use guml_ui::widgets::{button, textbox};

// ── Controllers ───────────────────────────────────────────────────────────

/// Backs `ui/main.guml`: a task list plus the text being typed.
struct MainController {
    state: PropertyBag,
    tasks: ObservableList,
    draft: RefCell<String>,
    draft_box: RefCell<Weak<Widget>>,
}

impl MainController {
    fn new() -> Self {
        Self {
            state: PropertyBag::new("MainController").with("count", 0),
            tasks: ObservableList::new(),
            draft: RefCell::new(String::new()),
            draft_box: RefCell::new(Weak::new()),
        }
    }

    fn sync_count(&self) {
        self.state.set("count", self.tasks.len() as i64);
    }

    fn add(&self) {
        let text = self.draft.borrow().trim().to_string();
        if text.is_empty() {
            log::warn!("ignoring empty task");
            return;
        }
        self.tasks.push(text);
        self.draft.borrow_mut().clear();
        if let Some(field) = self.draft_box.borrow().upgrade() {
            if let Err(e) = field.set_property("text", Value::from("")) {
                log::error!("clearing draft: {e}");
            }
        }
        self.sync_count();
    }
}

impl Object for MainController {
    fn type_name(&self) -> &str {
        "MainController"
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "tasks" => Some(Value::List(self.tasks.clone())),
            _ => self.state.get(name),
        }
    }

    fn notifier(&self) -> Option<&Notifier> {
        self.state.notifier()
    }
}

impl Controller for MainController {
    fn handler(self: Rc<Self>, name: &str) -> Option<Handler> {
        let handler: Handler = match name {
            "on_add" => Rc::new(move |_: &[Value]| self.add()),
            "on_clear" => Rc::new(move |_: &[Value]| {
                self.tasks.clear();
                self.sync_count();
            }),
            "on_draft_changed" => Rc::new(move |args: &[Value]| {
                let text = args.first().and_then(Value::as_str).unwrap_or_default();
                *self.draft.borrow_mut() = text.to_string();
            }),
            _ => return None,
        };
        Some(handler)
    }

    fn created(&self, handle: &ControllerHandle) {
        if let Some(field) = handle.node("draft") {
            *self.draft_box.borrow_mut() = Rc::downgrade(&field);
        }
        log::info!("main view ready, aliases: {}", handle.node_names().join(", "));
    }

    fn dispose(&self) {
        log::info!("main view disposed with {} task(s)", self.tasks.len());
    }
}

// ── Session ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let ui_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("ui"));

    let control = WidgetRegistry::headless().get("Control").context("headless toolkit has no Control")?;
    let host = Widget::new(control);

    let main_ctl = Rc::new(MainController::new());
    let status = Rc::new(PropertyBag::new("StatusBarController").with("message", "ready"));

    let (main_for_ctor, status_for_ctor) = (main_ctl.clone(), status.clone());
    let (env, handle) = Application::new()
        .global("app_name", "GUML Studio")
        .controller("MainController", move || main_for_ctor.clone())
        .controller("StatusBarController", move || status_for_ctor.clone())
        .load(&host, ui_dir.join("main.guml"))
        .with_context(|| format!("loading {}", ui_dir.join("main.guml").display()))?;

    println!("── initial tree ──\n{}", host.outline());

    let draft = handle.node("draft").context("main.guml declares no @draft")?;
    let add = handle.node("add").context("main.guml declares no @add")?;
    for task in ["write the tokenizer", "bind widgets", "ship it"] {
        textbox::input(&draft, task)?;
        button::press(&add)?;
    }
    main_ctl.tasks.remove(1);
    main_ctl.tasks.insert(0, "triage");
    main_ctl.sync_count();
    status.set("message", format!("{} task(s) on the board", main_ctl.tasks.len()));
    handle.update(1.0 / 60.0);

    println!("── after scripted session ──\n{}", host.outline());

    let errors = env.take_errors();
    for e in &errors {
        log::warn!("deferred error: {e}");
    }
    handle.dispose();
    anyhow::ensure!(errors.is_empty(), "{} binding error(s) during the session", errors.len());
    Ok(())
}
