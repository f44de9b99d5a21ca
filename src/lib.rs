#[macro_use]
extern crate tracing;

pub mod cluster;
pub mod context;
pub mod error;
pub mod ingresses;
pub mod reconcile;
pub mod refs;
pub mod resources;
pub mod watches;

#[cfg(test)]
pub(crate) mod testing;
