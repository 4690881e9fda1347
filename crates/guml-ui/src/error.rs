use std::fmt;

use guml_markup::{ParseError, RefKind};

/// Everything that can abort a render, or fail inside a change callback.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    Parse(ParseError),
    Io { path: String, message: String },
    /// No widget class is registered under this type name.
    ComponentNotFound { name: String },
    /// No controller constructor is registered under this name.
    ControllerNotFound { name: String },
    /// `target` has no readable or writable property `property`.
    PropertyNotFound { target: String, property: String },
    SignalNotFound { widget: String, signal: String },
    HandlerNotFound { controller: String, handler: String },
    ReferenceNotFound { kind: RefKind, name: String },
    Type { message: String },
    DivisionByZero,
    Resource { path: String, message: String },
}

impl RenderError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        RenderError::Type { message: message.into() }
    }

    pub(crate) fn property(target: impl Into<String>, property: impl Into<String>) -> Self {
        RenderError::PropertyNotFound { target: target.into(), property: property.into() }
    }

    pub(crate) fn reference(kind: RefKind, name: impl Into<String>) -> Self {
        RenderError::ReferenceNotFound { kind, name: name.into() }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Parse(e) => write!(f, "{e}"),
            RenderError::Io { path, message } => write!(f, "cannot read {path}: {message}"),
            RenderError::ComponentNotFound { name } => write!(f, "unknown component '{name}'"),
            RenderError::ControllerNotFound { name } => write!(f, "unknown controller '{name}'"),
            RenderError::PropertyNotFound { target, property } => {
                write!(f, "property '{property}' not found on {target}")
            }
            RenderError::SignalNotFound { widget, signal } => write!(f, "{widget} has no signal '{signal}'"),
            RenderError::HandlerNotFound { controller, handler } => {
                write!(f, "{controller} has no handler '{handler}'")
            }
            RenderError::ReferenceNotFound { kind, name } => write!(f, "unresolved {kind} reference '{name}'"),
            RenderError::Type { message } => write!(f, "type error: {message}"),
            RenderError::DivisionByZero => f.write_str("division by zero"),
            RenderError::Resource { path, message } => write!(f, "cannot load resource {path}: {message}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ParseError> for RenderError {
    fn from(e: ParseError) -> Self {
        RenderError::Parse(e)
    }
}
