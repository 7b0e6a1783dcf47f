//! The job model: a typed description of one child-process invocation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};
use crate::path::TypedPath;

/// The closed set of job kinds the planner can emit and the executor can
/// report on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    ScanDependencies,
    GeneratePrecompiledModule,
    CompileModuleFromInterface,
    Compile,
    EmitModule,
    MergeModule,
    GeneratePch,
    Link,
    AutolinkExtract,
    Repl,
    VerifyInterface,
    VersionRequest,
}

impl JobKind {
    /// Jobs of these kinds replace the driver process rather than returning
    /// control to it.
    pub fn requires_in_place_execution_by_default(self) -> bool {
        matches!(self, JobKind::Repl | JobKind::VersionRequest)
    }
}

/// One token of a job's command line. Paths stay opaque typed values; only
/// the argument-resolution collaborator (outside this crate) stringifies them.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Flag(String),
    Path(TypedPath),
    ResponseFilePath(PathBuf),
    JoinedOptionAndPath(String, TypedPath),
}

/// One child-process invocation in a build plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub kind: JobKind,
    pub tool: TypedPath,
    pub arguments: Vec<Argument>,
    pub inputs: Vec<TypedPath>,
    pub display_inputs: Vec<TypedPath>,
    pub primary_inputs: Vec<TypedPath>,
    pub outputs: Vec<TypedPath>,
    pub extra_environment: BTreeMap<String, String>,
    pub requires_in_place_execution: bool,
    pub supports_response_files: bool,
    pub output_cache_keys: BTreeMap<String, String>,
}

impl Job {
    pub fn new(kind: JobKind, tool: TypedPath) -> Self {
        let requires_in_place_execution = kind.requires_in_place_execution_by_default();
        Self {
            kind,
            tool,
            arguments: Vec::new(),
            inputs: Vec::new(),
            display_inputs: Vec::new(),
            primary_inputs: Vec::new(),
            outputs: Vec::new(),
            extra_environment: BTreeMap::new(),
            requires_in_place_execution,
            supports_response_files: matches!(
                kind,
                JobKind::Compile
                    | JobKind::EmitModule
                    | JobKind::CompileModuleFromInterface
                    | JobKind::GeneratePrecompiledModule
                    | JobKind::Link
            ),
            output_cache_keys: BTreeMap::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: Vec<Argument>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<TypedPath>) -> Self {
        self.display_inputs = inputs.clone();
        self.inputs = inputs;
        self
    }

    pub fn with_primary_inputs(mut self, primaries: Vec<TypedPath>) -> Self {
        self.primary_inputs = primaries;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<TypedPath>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn is_batch(&self) -> bool {
        self.primary_inputs.len() > 1
    }
}

/// Maps each output typed path to the job that produces it. Built once per
/// plan and read-only thereafter; constructing it is how the executor (and
/// the planner's own self-check) discovers the DAG's edges.
#[derive(Debug, Default, Clone)]
pub struct ProducerMap {
    producers: BTreeMap<String, usize>,
}

impl ProducerMap {
    /// Builds the map from a plan, failing if two jobs claim the same output.
    pub fn build(jobs: &[Job]) -> Result<Self> {
        let mut producers = BTreeMap::new();
        for (idx, job) in jobs.iter().enumerate() {
            for output in &job.outputs {
                let key = output.key();
                if producers.insert(key.clone(), idx).is_some() {
                    return Err(DriverError::DuplicateJobOutput(key));
                }
            }
        }
        Ok(Self { producers })
    }

    pub fn producer_of(&self, path: &TypedPath) -> Option<usize> {
        self.producers.get(&path.key()).copied()
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{FileType, Location};

    fn tool() -> TypedPath {
        TypedPath::absolute("/usr/bin/swift-frontend", FileType::Executable)
    }

    #[test]
    fn producer_map_rejects_duplicate_outputs() {
        let out = TypedPath::temporary("a.o", FileType::Object);
        let j1 = Job::new(JobKind::Compile, tool()).with_outputs(vec![out.clone()]);
        let j2 = Job::new(JobKind::Compile, tool()).with_outputs(vec![out]);
        let err = ProducerMap::build(&[j1, j2]).unwrap_err();
        assert!(matches!(err, DriverError::DuplicateJobOutput(_)));
    }

    #[test]
    fn producer_map_resolves_by_location_key() {
        let out = TypedPath::temporary("a.o", FileType::Object);
        let j1 = Job::new(JobKind::Compile, tool()).with_outputs(vec![out.clone()]);
        let map = ProducerMap::build(&[j1]).unwrap();
        assert_eq!(map.producer_of(&out), Some(0));
        let missing = TypedPath::temporary("b.o", FileType::Object);
        assert_eq!(map.producer_of(&missing), None);
    }

    #[test]
    fn batch_job_detected_by_primary_count() {
        let loc = Location::Temporary("x".into());
        let j = Job::new(JobKind::Compile, tool()).with_primary_inputs(vec![
            TypedPath::new(loc.clone(), FileType::Source),
            TypedPath::new(loc, FileType::Source),
        ]);
        assert!(j.is_batch());
    }
}
