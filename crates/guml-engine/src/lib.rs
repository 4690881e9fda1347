//! GUML engine crate.
//!
//! Owns the host-side primitives every higher layer agrees on: logger
//! initialisation, 2D coordinates and colors.

pub mod coords;
pub mod logging;
pub mod paint;
