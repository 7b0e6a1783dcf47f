//! Build Planner (§4.C): turns inputs + mode into an ordered job list.
//!
//! Staged the way the teacher's `ProjectCompiler` (`compile/project.rs`)
//! moves through `PreprocessedState -> CompiledState -> ArtifactsState`,
//! generalized here to emit a job list instead of compiler artifacts.

pub mod batch;

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, instrument, trace};

use crate::config::BuildConfiguration;
use crate::error::{DriverError, Result};
use crate::explicit_module::{plan_explicit_module_jobs, ExplicitModuleBuildOptions};
use crate::job::{Argument, Job, JobKind};
use crate::mode::{CompilerMode, LinkerOutputType, ResolvedMode};
use crate::module_graph::ModuleDependencyGraph;
use crate::path::{FileType, Location, TypedPath};

/// A preprocessed view of the configuration's inputs: validated, deduplicated
/// by basename, and reduced to a file-list typed path when the count exceeds
/// the configured threshold. Mirrors the teacher's `PreprocessedState`.
pub struct PreprocessedInputs {
    pub files: Vec<TypedPath>,
    pub file_list: Option<TypedPath>,
}

#[instrument(skip(config))]
pub fn preprocess_inputs(config: &BuildConfiguration) -> Result<PreprocessedInputs> {
    if config.inputs.is_empty() {
        return Err(DriverError::NoInputFiles);
    }

    let mut seen_basenames: std::collections::HashMap<String, PathBuf> = Default::default();
    let mut files = Vec::new();
    for path in &config.inputs {
        let basename = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DriverError::InvalidInput(path.clone()))?
            .to_string();
        if let Some(first) = seen_basenames.get(&basename) {
            return Err(DriverError::TwoFilesSameName {
                basename,
                first: first.clone(),
                second: path.clone(),
            });
        }
        seen_basenames.insert(basename, path.clone());
        files.push(TypedPath::absolute(path.clone(), FileType::Source));
    }

    let file_list = if files.len() > config.file_list_threshold {
        let contents: Vec<String> = files.iter().map(|f| f.key()).collect();
        trace!(count = files.len(), "input count exceeds file-list threshold");
        Some(TypedPath::new(
            Location::FileList("inputs.filelist".into(), contents),
            FileType::Source,
        ))
    } else {
        None
    };

    Ok(PreprocessedInputs { files, file_list })
}

pub struct PlanOptions<'a> {
    pub config: &'a BuildConfiguration,
    pub resolved_mode: &'a ResolvedMode,
    pub swift_frontend: TypedPath,
    pub module_graph: Option<&'a ModuleDependencyGraph>,
    pub bridging_header: Option<PathBuf>,
    pub explicit_module_options: ExplicitModuleBuildOptions,
}

/// Produces the full, ordered job list for one invocation (§4.C).
#[instrument(skip_all)]
pub fn plan_jobs(opts: &PlanOptions<'_>) -> Result<Vec<Job>> {
    let config = opts.config;
    let preprocessed = preprocess_inputs(config)?;

    let has_multiple_compilation_outputs =
        opts.resolved_mode.mode.uses_primary_file_inputs() && preprocessed.files.len() > 1;
    if config.output_path.is_some()
        && has_multiple_compilation_outputs
        && opts.resolved_mode.linker_output_type == LinkerOutputType::None
    {
        return Err(DriverError::CannotSpecifyOForMultipleOutputs);
    }

    let mut jobs = Vec::new();

    let emit_module_separately = matches!(
        opts.resolved_mode.mode,
        CompilerMode::StandardCompile | CompilerMode::BatchCompile { .. }
    ) && config.module_output_info.output_form != crate::config::ModuleOutputForm::None;

    let needs_bridging_pch = opts.bridging_header.is_some()
        && opts.resolved_mode.mode.supports_bridging_pch()
        && !config.incremental; // incremental build-record decides PCH reuse externally; out of scope here

    if config.explicit_module_build {
        jobs.push(plan_scan_dependencies_job(opts)?);
    }

    // Command-line additions (disable-implicit-modules flags, prefix maps)
    // and extra module inputs that every job compiling the main module needs
    // in explicit-module-build mode, plus the serialized artifact manifest
    // itself (§4.D). Empty when there is no module graph to plan against.
    let mut explicit_module_args: Vec<Argument> = Vec::new();
    let mut explicit_module_inputs: Vec<TypedPath> = Vec::new();
    if let Some(graph) = opts.module_graph {
        let main_id = graph.main_module_id();
        let explicit_plan =
            plan_explicit_module_jobs(graph, &main_id, &opts.swift_frontend, &opts.explicit_module_options)?;
        jobs.extend(explicit_plan.jobs);

        explicit_module_args = explicit_plan.main_module_extra_args;
        explicit_module_inputs = explicit_plan.main_module_extra_inputs;

        if !explicit_plan.manifest.is_empty() {
            let manifest_json = serde_json::to_string(&explicit_plan.manifest)
                .map_err(|e| DriverError::msg(e.to_string()))?;
            let manifest_path = TypedPath::new(
                Location::TemporaryWithContents("explicit-module-map.json".into(), manifest_json.into_bytes()),
                FileType::JsonModuleArtifactManifest,
            );
            explicit_module_args.push(Argument::Flag("-explicit-swift-module-map-file".into()));
            explicit_module_args.push(Argument::Path(manifest_path.clone()));
            explicit_module_inputs.push(manifest_path);
        }
    }
    let explicit_module_additions = (explicit_module_args.as_slice(), explicit_module_inputs.as_slice());

    let mut pch_output = None;
    if needs_bridging_pch {
        let (job, output) = plan_generate_pch_job(opts)?;
        pch_output = Some(output);
        jobs.push(job);
    }

    let mut compile_outputs = Vec::new();
    match &opts.resolved_mode.mode {
        CompilerMode::StandardCompile => {
            for file in &preprocessed.files {
                let (job, outs) =
                    plan_compile_job(opts, &[file.clone()], pch_output.as_ref(), explicit_module_additions)?;
                compile_outputs.push(outs);
                jobs.push(job);
            }
        }
        CompilerMode::BatchCompile { seed, count, size_limit } => {
            let buckets = batch::partition(&preprocessed.files, *seed, *count, *size_limit);
            debug!(buckets = buckets.len(), "batch compile partitioned");
            for bucket in buckets {
                let (job, outs) = plan_compile_job(opts, &bucket, pch_output.as_ref(), explicit_module_additions)?;
                compile_outputs.push(outs);
                jobs.push(job);
            }
        }
        CompilerMode::SingleCompile => {
            let (job, outs) = plan_whole_module_compile_job(
                opts,
                &preprocessed.files,
                pch_output.as_ref(),
                explicit_module_additions,
            )?;
            compile_outputs.push(outs);
            jobs.push(job);
        }
        CompilerMode::Immediate | CompilerMode::Repl | CompilerMode::Intro => {
            jobs.push(plan_in_place_job(opts, &preprocessed.files, explicit_module_additions)?);
        }
        CompilerMode::CompilePcm | CompilerMode::DumpPcm => {
            jobs.push(plan_pcm_job(opts, &preprocessed.files)?);
        }
    }

    if emit_module_separately {
        jobs.push(plan_emit_module_job(opts, &preprocessed.files, pch_output.as_ref())?);
    } else if compile_outputs.len() > 1
        && config.module_output_info.output_form != crate::config::ModuleOutputForm::None
    {
        jobs.push(plan_merge_module_job(&compile_outputs, opts)?);
    }

    if opts.resolved_mode.linker_output_type != LinkerOutputType::None {
        jobs.push(plan_autolink_extract_job(opts, &compile_outputs)?);
        jobs.push(plan_link_job(opts, &compile_outputs)?);
    }

    Ok(jobs)
}

fn plan_scan_dependencies_job(opts: &PlanOptions<'_>) -> Result<Job> {
    let output = TypedPath::temporary("dependencies.json", FileType::JsonDependencies);
    Ok(Job::new(JobKind::ScanDependencies, opts.swift_frontend.clone())
        .with_arguments(vec![Argument::Flag("-scan-dependencies".into())])
        .with_outputs(vec![output]))
}

fn plan_generate_pch_job(opts: &PlanOptions<'_>) -> Result<(Job, TypedPath)> {
    let header = opts.bridging_header.clone().expect("checked by caller");
    let output = TypedPath::temporary("bridging-header.pch", FileType::PrecompiledHeader);
    let job = Job::new(JobKind::GeneratePch, opts.swift_frontend.clone())
        .with_arguments(vec![
            Argument::Flag("-emit-pch".into()),
            Argument::Path(TypedPath::absolute(header.clone(), FileType::ObjcHeader)),
        ])
        .with_inputs(vec![TypedPath::absolute(header, FileType::ObjcHeader)])
        .with_outputs(vec![output.clone()]);
    Ok((job, output))
}

fn output_for(opts: &PlanOptions<'_>, input_key: Option<&str>, file_type: FileType, fallback_name: &str) -> TypedPath {
    if let Some(map) = &opts.config.output_file_map {
        if let Some(path) = map.get_or_infer(input_key, file_type) {
            return TypedPath::absolute(path, file_type);
        }
    }
    TypedPath::temporary(fallback_name.to_string(), file_type)
}

fn plan_compile_job(
    opts: &PlanOptions<'_>,
    primaries: &[TypedPath],
    pch: Option<&TypedPath>,
    explicit_module_additions: (&[Argument], &[TypedPath]),
) -> Result<(Job, Vec<TypedPath>)> {
    let (extra_args, extra_inputs) = explicit_module_additions;

    let mut inputs = primaries.to_vec();
    if let Some(pch) = pch {
        inputs.push(pch.clone());
    }
    inputs.extend_from_slice(extra_inputs);

    let mut outputs = Vec::new();
    for primary in primaries {
        let key = primary.key();
        let out = output_for(opts, Some(&key), opts.resolved_mode.compiler_output_type, &format!("{key}.o"));
        outputs.push(out);
    }

    let mut arguments: Vec<Argument> = primaries.iter().map(|p| Argument::Path(p.clone())).collect();
    if let Some(pch) = pch {
        arguments.push(Argument::JoinedOptionAndPath("-import-objc-header=".into(), pch.clone()));
    }
    arguments.extend_from_slice(extra_args);

    let job = Job::new(JobKind::Compile, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(inputs)
        .with_primary_inputs(primaries.to_vec())
        .with_outputs(outputs.clone());

    Ok((job, outputs))
}

fn plan_whole_module_compile_job(
    opts: &PlanOptions<'_>,
    files: &[TypedPath],
    pch: Option<&TypedPath>,
    explicit_module_additions: (&[Argument], &[TypedPath]),
) -> Result<(Job, Vec<TypedPath>)> {
    let (extra_args, extra_inputs) = explicit_module_additions;

    let mut inputs = files.to_vec();
    if let Some(pch) = pch {
        inputs.push(pch.clone());
    }
    inputs.extend_from_slice(extra_inputs);

    let thread_count = opts.config.threads_per_job.max(1);
    let mut outputs = Vec::new();
    if thread_count > 1 {
        for file in files {
            let key = file.key();
            outputs.push(output_for(opts, Some(&key), opts.resolved_mode.compiler_output_type, &format!("{key}.o")));
        }
    } else if let Some(path) = single_output_override(opts) {
        outputs.push(path);
    } else {
        outputs.push(output_for(opts, None, opts.resolved_mode.compiler_output_type, "out.o"));
    }

    // Whole-module compiles emit the module directly (emit-module-separately
    // is always false for `SingleCompile`, per §4.C), so module outputs ride
    // along on this job rather than a separate emit-module job.
    if config_requests_module_output(opts) {
        let module_name = &opts.config.module_output_info.module_name;
        outputs.push(output_for(opts, None, FileType::SwiftModule, &format!("{module_name}.swiftmodule")));
        outputs.push(output_for(opts, None, FileType::SwiftModuleDoc, &format!("{module_name}.swiftdoc")));
        outputs.push(output_for(
            opts,
            None,
            FileType::SwiftModuleSourceInfo,
            &format!("{module_name}.swiftsourceinfo"),
        ));
    }

    let mut arguments: Vec<Argument> = files.iter().map(|f| Argument::Path(f.clone())).collect();
    arguments.extend_from_slice(extra_args);
    let job = Job::new(JobKind::Compile, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(inputs)
        .with_outputs(outputs.clone());
    Ok((job, outputs))
}

/// `-o` only overrides a whole-module compile's single object output when no
/// linker output is requested; otherwise `-o` names the link output instead.
fn single_output_override(opts: &PlanOptions<'_>) -> Option<TypedPath> {
    if opts.resolved_mode.linker_output_type != LinkerOutputType::None {
        return None;
    }
    opts.config
        .output_path
        .as_ref()
        .map(|path| TypedPath::absolute(path.clone(), opts.resolved_mode.compiler_output_type))
}

fn config_requests_module_output(opts: &PlanOptions<'_>) -> bool {
    opts.config.module_output_info.output_form != crate::config::ModuleOutputForm::None
}

fn plan_in_place_job(
    opts: &PlanOptions<'_>,
    files: &[TypedPath],
    explicit_module_additions: (&[Argument], &[TypedPath]),
) -> Result<Job> {
    let (extra_args, extra_inputs) = explicit_module_additions;
    let kind = match opts.resolved_mode.mode {
        CompilerMode::Repl => JobKind::Repl,
        _ => JobKind::VersionRequest,
    };
    let mut arguments: Vec<Argument> = files.iter().map(|f| Argument::Path(f.clone())).collect();
    arguments.extend_from_slice(extra_args);
    let mut inputs = files.to_vec();
    inputs.extend_from_slice(extra_inputs);
    Ok(Job::new(kind, opts.swift_frontend.clone()).with_arguments(arguments).with_inputs(inputs))
}

fn plan_pcm_job(opts: &PlanOptions<'_>, files: &[TypedPath]) -> Result<Job> {
    let output = TypedPath::temporary("out.pcm", FileType::PrecompiledModule);
    let arguments: Vec<Argument> = files.iter().map(|f| Argument::Path(f.clone())).collect();
    Ok(Job::new(JobKind::GeneratePrecompiledModule, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(files.to_vec())
        .with_outputs(vec![output]))
}

fn plan_emit_module_job(
    opts: &PlanOptions<'_>,
    files: &[TypedPath],
    pch: Option<&TypedPath>,
) -> Result<Job> {
    let mut inputs = files.to_vec();
    if let Some(pch) = pch {
        inputs.push(pch.clone());
    }
    let module_name = &opts.config.module_output_info.module_name;
    let output = output_for(opts, None, FileType::SwiftModule, &format!("{module_name}.swiftmodule"));
    let arguments: Vec<Argument> = files.iter().map(|f| Argument::Path(f.clone())).collect();
    Ok(Job::new(JobKind::EmitModule, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(inputs)
        .with_outputs(vec![output]))
}

fn plan_merge_module_job(partial_outputs: &[Vec<TypedPath>], opts: &PlanOptions<'_>) -> Result<Job> {
    let partial_modules: Vec<TypedPath> = partial_outputs
        .iter()
        .flatten()
        .filter(|p| p.file_type == FileType::SwiftModule)
        .cloned()
        .collect();
    let module_name = &opts.config.module_output_info.module_name;
    let output = output_for(opts, None, FileType::SwiftModule, &format!("{module_name}.swiftmodule"));
    let arguments: Vec<Argument> = partial_modules.iter().map(|p| Argument::Path(p.clone())).collect();
    Ok(Job::new(JobKind::MergeModule, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(partial_modules)
        .with_outputs(vec![output]))
}

fn plan_autolink_extract_job(opts: &PlanOptions<'_>, compile_outputs: &[Vec<TypedPath>]) -> Result<Job> {
    let objects: Vec<TypedPath> =
        compile_outputs.iter().flatten().filter(|p| p.file_type == FileType::Object).cloned().collect();
    let output = TypedPath::temporary("autolink.autolink", FileType::Autolink);
    let arguments: Vec<Argument> = objects.iter().map(|o| Argument::Path(o.clone())).collect();
    Ok(Job::new(JobKind::AutolinkExtract, opts.swift_frontend.clone())
        .with_arguments(arguments)
        .with_inputs(objects)
        .with_outputs(vec![output]))
}

fn plan_link_job(opts: &PlanOptions<'_>, compile_outputs: &[Vec<TypedPath>]) -> Result<Job> {
    let objects: Vec<TypedPath> = compile_outputs
        .iter()
        .flatten()
        .filter(|p| matches!(p.file_type, FileType::Object | FileType::LlvmBitcode))
        .cloned()
        .collect();

    let output_type = match opts.resolved_mode.linker_output_type {
        LinkerOutputType::Executable => FileType::Executable,
        LinkerOutputType::DynamicLibrary => FileType::DynamicLibrary,
        LinkerOutputType::StaticLibrary => FileType::StaticLibrary,
        LinkerOutputType::None => unreachable!("caller only plans a link job when a linker output is requested"),
    };
    let output = match &opts.config.output_path {
        Some(path) => TypedPath::absolute(path.clone(), output_type),
        None => output_for(opts, None, output_type, &opts.config.module_output_info.module_name),
    };

    let arguments: Vec<Argument> = objects.iter().map(|o| Argument::Path(o.clone())).collect();
    let linker = TypedPath::absolute("/usr/bin/clang", FileType::Executable);
    Ok(Job::new(JobKind::Link, linker)
        .with_arguments(arguments)
        .with_inputs(objects)
        .with_outputs(vec![output]))
}

/// Every output typed path produced anywhere in `jobs`, sorted, for quick
/// membership checks by tests and by [`crate::report`].
pub fn all_outputs(jobs: &[Job]) -> BTreeSet<String> {
    jobs.iter().flat_map(|j| j.outputs.iter().map(|o| o.key())).collect()
}
