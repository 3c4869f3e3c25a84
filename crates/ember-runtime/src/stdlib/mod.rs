//! System function library
//!
//! The builtin catalog the Ember evaluator exposes to scripts: value
//! adapters, formatted strings, randomness and noise, clock and calendar
//! queries, variable introspection, tasks and synchronization, and
//! process-wide globals. `register` installs the whole catalog on an
//! `Expression`.

pub mod clock;
pub mod concurrency;
pub mod convert;
pub mod fmt;
pub mod globals;
pub mod random;
pub mod vars;

use crate::expression::Expression;

/// Install the complete system catalog into `expr`
pub fn register(expr: &mut Expression) {
    convert::register(expr);
    fmt::register(expr);
    random::register(expr);
    clock::register(expr);
    vars::register(expr);
    concurrency::register(expr);
    globals::register(expr);
}
