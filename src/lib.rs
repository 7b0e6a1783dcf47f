#![doc = include_str!("../README.md")]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod executor;
pub mod explicit_module;
pub mod invocation;
pub mod job;
pub mod mode;
pub mod module_graph;
pub mod output_file_map;
pub mod path;
pub mod planner;
pub mod report;

#[cfg(test)]
mod testutil;

pub use config::{BuildConfiguration, BuildConfigurationBuilder};
pub use error::{DriverError, Result};
pub use job::{Argument, Job, JobKind, ProducerMap};
pub use mode::{resolve_mode, CompilerMode, DriverKind, ModeOptions, ResolvedMode};
pub use path::{FileType, Location, TypedPath};
pub use planner::{plan_jobs, PlanOptions};
