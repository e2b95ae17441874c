//! Core container implementation for autowire.

pub mod builder;
pub mod callback;
pub mod catalog;
pub mod config;
pub mod container;
pub mod contextual;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod id;
pub mod lifetime;
pub mod parameter;
pub mod provider;
mod registry;
mod trace;
pub mod value;

#[cfg(test)]
pub(crate) mod fixtures;

#[doc(hidden)]
pub use inventory;

pub use container::{Container, ContainerBuilder, prelude};
pub use error::{Error, ErrorKind, Result};
pub use id::Identifier;
pub use lifetime::Lifetime;
pub use value::{Arguments, Instance, Value};
