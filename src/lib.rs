//! pymove: move Python definitions between modules.
//!
//! Moves a top-level function or class from one module to another and
//! repairs imports in the target, the source, and every module that
//! imported the symbol from its old location.

// Core infrastructure - re-exported from pymove-core
pub use pymove_core::diff;
pub use pymove_core::edit;
pub use pymove_core::error;
pub use pymove_core::output;
pub use pymove_core::text;
pub use pymove_core::types;

// Python layer
pub use pymove_python as python;

// Front door
pub mod cli;
