//! Behavioural suites and shared test support.

pub(crate) mod support;
