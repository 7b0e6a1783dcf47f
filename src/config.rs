//! The build configuration digest: an immutable bag of everything the mode
//! resolver, planner and explicit-module planner need, built once per
//! invocation. Mirrors the teacher's `Project`/`ProjectBuilder` shape.

use std::path::PathBuf;

use crate::mode::DriverKind;
use crate::output_file_map::OutputFileMap;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ModuleOutputInfo {
    pub output_form: ModuleOutputForm,
    pub module_name: String,
    pub name_is_fallback: bool,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModuleOutputForm {
    None,
    SingleFile,
    ModuleOnly,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DebugInfo {
    pub level: DebugInfoLevel,
    pub format: DebugInfoFormat,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum DebugInfoLevel {
    #[default]
    None,
    LineTables,
    AstTypes,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum DebugInfoFormat {
    #[default]
    Dwarf,
    Codeview,
}

/// Immutable digest read by every planning stage. Constructed once via
/// [`BuildConfigurationBuilder`].
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub driver_kind: DriverKind,
    pub inputs: Vec<PathBuf>,
    pub output_file_map: Option<OutputFileMap>,
    /// The single `-o` path, when the invocation named one. Only meaningful
    /// when the plan produces exactly one compilation output (or a link
    /// output); the planner rejects it otherwise (§4.C).
    pub output_path: Option<PathBuf>,
    pub target_triple: String,
    pub host_triple: String,
    pub module_output_info: ModuleOutputInfo,
    pub debug_info: DebugInfo,
    pub sanitizers: Vec<String>,
    pub num_parallel_jobs: usize,
    pub threads_per_job: usize,
    pub file_list_threshold: usize,
    pub incremental: bool,
    pub caching_enabled: bool,
    pub chained_bridging_header_content: Option<String>,
    pub explicit_module_build: bool,
    pub save_temps: bool,
    pub continue_building_after_errors: bool,
    pub terminate_timeout_secs: u64,
}

impl BuildConfiguration {
    pub fn builder() -> BuildConfigurationBuilder {
        BuildConfigurationBuilder::default()
    }
}

#[derive(Debug, Clone)]
pub struct BuildConfigurationBuilder {
    driver_kind: DriverKind,
    inputs: Vec<PathBuf>,
    output_file_map: Option<OutputFileMap>,
    output_path: Option<PathBuf>,
    target_triple: String,
    host_triple: String,
    module_output_info: ModuleOutputInfo,
    debug_info: DebugInfo,
    sanitizers: Vec<String>,
    num_parallel_jobs: Option<usize>,
    threads_per_job: usize,
    file_list_threshold: usize,
    incremental: bool,
    caching_enabled: bool,
    chained_bridging_header_content: Option<String>,
    explicit_module_build: bool,
    save_temps: bool,
    continue_building_after_errors: bool,
    terminate_timeout_secs: u64,
}

impl Default for BuildConfigurationBuilder {
    fn default() -> Self {
        Self {
            driver_kind: DriverKind::Batch,
            inputs: Vec::new(),
            output_file_map: None,
            output_path: None,
            target_triple: String::new(),
            host_triple: String::new(),
            module_output_info: ModuleOutputInfo {
                output_form: ModuleOutputForm::None,
                module_name: "main".to_string(),
                name_is_fallback: true,
                aliases: Vec::new(),
            },
            debug_info: DebugInfo::default(),
            sanitizers: Vec::new(),
            num_parallel_jobs: None,
            threads_per_job: 0,
            file_list_threshold: 128,
            incremental: false,
            caching_enabled: false,
            chained_bridging_header_content: None,
            explicit_module_build: false,
            save_temps: false,
            continue_building_after_errors: false,
            terminate_timeout_secs: 5,
        }
    }
}

impl BuildConfigurationBuilder {
    pub fn driver_kind(mut self, kind: DriverKind) -> Self {
        self.driver_kind = kind;
        self
    }

    pub fn inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn output_file_map(mut self, map: OutputFileMap) -> Self {
        self.output_file_map = Some(map);
        self
    }

    pub fn output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }

    pub fn target_triple(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = triple.into();
        self
    }

    pub fn host_triple(mut self, triple: impl Into<String>) -> Self {
        self.host_triple = triple.into();
        self
    }

    pub fn module_output_info(mut self, info: ModuleOutputInfo) -> Self {
        self.module_output_info = info;
        self
    }

    pub fn debug_info(mut self, info: DebugInfo) -> Self {
        self.debug_info = info;
        self
    }

    pub fn num_parallel_jobs(mut self, n: usize) -> Self {
        self.num_parallel_jobs = Some(n);
        self
    }

    pub fn threads_per_job(mut self, n: usize) -> Self {
        self.threads_per_job = n;
        self
    }

    pub fn file_list_threshold(mut self, n: usize) -> Self {
        self.file_list_threshold = n;
        self
    }

    pub fn incremental(mut self, on: bool) -> Self {
        self.incremental = on;
        self
    }

    pub fn caching_enabled(mut self, on: bool) -> Self {
        self.caching_enabled = on;
        self
    }

    pub fn explicit_module_build(mut self, on: bool) -> Self {
        self.explicit_module_build = on;
        self
    }

    pub fn save_temps(mut self, on: bool) -> Self {
        self.save_temps = on;
        self
    }

    pub fn continue_building_after_errors(mut self, on: bool) -> Self {
        self.continue_building_after_errors = on;
        self
    }

    pub fn terminate_timeout_secs(mut self, secs: u64) -> Self {
        self.terminate_timeout_secs = secs;
        self
    }

    /// Resolves `num_parallel_jobs` from `std::thread::available_parallelism`
    /// when the caller didn't set one explicitly (Open Question 1, see
    /// DESIGN.md), matching the teacher's own default for `solc_jobs`.
    pub fn build(self) -> BuildConfiguration {
        let num_parallel_jobs = self.num_parallel_jobs.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        });

        BuildConfiguration {
            driver_kind: self.driver_kind,
            inputs: self.inputs,
            output_file_map: self.output_file_map,
            output_path: self.output_path,
            target_triple: self.target_triple,
            host_triple: self.host_triple,
            module_output_info: self.module_output_info,
            debug_info: self.debug_info,
            sanitizers: self.sanitizers,
            num_parallel_jobs,
            threads_per_job: self.threads_per_job,
            file_list_threshold: self.file_list_threshold,
            incremental: self.incremental,
            caching_enabled: self.caching_enabled,
            chained_bridging_header_content: self.chained_bridging_header_content,
            explicit_module_build: self.explicit_module_build,
            save_temps: self.save_temps,
            continue_building_after_errors: self.continue_building_after_errors,
            terminate_timeout_secs: self.terminate_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_in_parallelism_default() {
        let cfg = BuildConfiguration::builder().build();
        assert!(cfg.num_parallel_jobs >= 1);
    }

    #[test]
    fn builder_honors_explicit_parallelism() {
        let cfg = BuildConfiguration::builder().num_parallel_jobs(7).build();
        assert_eq!(cfg.num_parallel_jobs, 7);
    }
}
