//! Unit coverage for the client runtime.

mod support;
mod unit;
