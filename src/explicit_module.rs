//! Explicit Module Build Planner (§4.D): turns an inter-module dependency
//! graph into compile-from-interface and generate-pcm jobs, and emits the
//! explicit module artifact manifest consumed by the main module's compile
//! job.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::error::{DriverError, Result};
use crate::job::{Argument, Job, JobKind};
use crate::module_graph::{ModuleDependencyGraph, ModuleDetails, ModuleId, ModuleInfo};
use crate::path::{FileType, TypedPath};

#[derive(Debug, Clone, Default)]
pub struct ExplicitModuleBuildOptions {
    pub supports_scanner_prefix_map_paths: bool,
    pub prefix_map: Vec<(String, String)>,
    pub integrated_driver: bool,
}

/// One entry of the explicit module artifact manifest (§6), pre-sort.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Swift {
        #[serde(rename = "moduleName")]
        module_name: String,
        #[serde(rename = "modulePath")]
        module_path: String,
        #[serde(rename = "docPath", skip_serializing_if = "Option::is_none")]
        doc_path: Option<String>,
        #[serde(rename = "sourceInfoPath", skip_serializing_if = "Option::is_none")]
        source_info_path: Option<String>,
        #[serde(rename = "isFramework")]
        is_framework: bool,
        #[serde(rename = "moduleCacheKey", skip_serializing_if = "Option::is_none")]
        module_cache_key: Option<String>,
    },
    Clang {
        #[serde(rename = "moduleName")]
        module_name: String,
        #[serde(rename = "clangModulePath")]
        clang_module_path: String,
        #[serde(rename = "clangModuleMapPath")]
        clang_module_map_path: String,
        #[serde(rename = "isFramework")]
        is_framework: bool,
        #[serde(rename = "isBridgingHeaderDependency")]
        is_bridging_header_dependency: bool,
        #[serde(rename = "clangModuleCacheKey", skip_serializing_if = "Option::is_none")]
        clang_module_cache_key: Option<String>,
    },
}

impl ManifestEntry {
    fn sort_key(&self) -> (u8, &str) {
        match self {
            ManifestEntry::Swift { module_name, .. } => (0, module_name.as_str()),
            ManifestEntry::Clang { module_name, .. } => (1, module_name.as_str()),
        }
    }
}

pub struct ExplicitModulePlan {
    pub jobs: Vec<Job>,
    pub manifest: Vec<ManifestEntry>,
    /// The same command-line additions and extra inputs every dependency job
    /// above receives, computed for the main module itself. The caller is
    /// responsible for threading these (plus a manifest file built from
    /// `manifest`) into the main module's own compile job(s).
    pub main_module_extra_args: Vec<Argument>,
    pub main_module_extra_inputs: Vec<TypedPath>,
}

/// Computes the explicit-module-dependency command-line additions and
/// manifest entries shared by every compile job that references `target`'s
/// reachable set.
#[instrument(skip(graph, opts))]
pub fn explicit_module_dependency_additions(
    graph: &ModuleDependencyGraph,
    target: &ModuleId,
    bridging_header_closure: &BTreeSet<ModuleId>,
    opts: &ExplicitModuleBuildOptions,
) -> Result<(Vec<Argument>, Vec<ManifestEntry>, Vec<TypedPath>)> {
    let reachable = graph.reachable_from(target)?;
    let mut manifest: BTreeSet<ManifestEntry> = BTreeSet::new();
    let mut inputs = Vec::new();

    for id in &reachable {
        if id == target {
            continue;
        }
        let info = graph
            .get(id)
            .ok_or_else(|| DriverError::MissingModuleDependency(id.name().to_string()))?;
        match (&info.details, id.is_clang()) {
            (ModuleDetails::SwiftTextual(d), false) => {
                let module_path = info
                    .module_path
                    .clone()
                    .ok_or_else(|| DriverError::MalformedModuleDependency {
                        module_name: id.name().to_string(),
                        reason: "missing module path".into(),
                    })?;
                manifest.insert(ManifestEntry::Swift {
                    module_name: id.name().to_string(),
                    module_path: module_path.clone(),
                    doc_path: None,
                    source_info_path: None,
                    is_framework: d.is_framework,
                    module_cache_key: d.cache_key.clone(),
                });
                inputs.push(TypedPath::absolute(module_path, FileType::SwiftModule));
            }
            (ModuleDetails::SwiftBinary(d), false) => {
                manifest.insert(ManifestEntry::Swift {
                    module_name: id.name().to_string(),
                    module_path: d.compiled_module_path.clone(),
                    doc_path: d.module_doc_path.clone(),
                    source_info_path: d.module_source_info_path.clone(),
                    is_framework: d.is_framework,
                    module_cache_key: d.cache_key.clone(),
                });
                inputs.push(TypedPath::absolute(d.compiled_module_path.clone(), FileType::SwiftModule));
            }
            (ModuleDetails::Clang(d), true) => {
                let module_path = info
                    .module_path
                    .clone()
                    .ok_or_else(|| DriverError::MalformedModuleDependency {
                        module_name: id.name().to_string(),
                        reason: "missing precompiled module path".into(),
                    })?;
                manifest.insert(ManifestEntry::Clang {
                    module_name: id.name().to_string(),
                    clang_module_path: module_path.clone(),
                    clang_module_map_path: d.module_map_path.clone(),
                    is_framework: false,
                    is_bridging_header_dependency: bridging_header_closure.contains(id),
                    clang_module_cache_key: d.cache_key.clone(),
                });
                inputs.push(TypedPath::absolute(module_path, FileType::PrecompiledModule));
            }
            (ModuleDetails::SwiftPlaceholder(_), _) => {
                return Err(DriverError::MalformedModuleDependency {
                    module_name: id.name().to_string(),
                    reason: "unresolved placeholder dependency at plan time".into(),
                });
            }
            _ => {
                return Err(DriverError::MalformedModuleDependency {
                    module_name: id.name().to_string(),
                    reason: "module id tag does not match its details variant".into(),
                })
            }
        }
    }

    let mut manifest: Vec<ManifestEntry> = manifest.into_iter().collect();
    manifest.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    // Every job that compiles against this reachable set, `target` itself
    // included, must refuse to fall back to the implicit module builder.
    let mut args = vec![
        Argument::Flag("-disable-implicit-swift-modules".into()),
        Argument::Flag("-Xcc".into()),
        Argument::Flag("-fno-implicit-modules".into()),
        Argument::Flag("-Xcc".into()),
        Argument::Flag("-fno-implicit-module-maps".into()),
    ];
    for (from, to) in &opts.prefix_map {
        if opts.supports_scanner_prefix_map_paths {
            args.push(Argument::Flag("-cache-replay-prefix-map".into()));
            args.push(Argument::Flag(to.clone()));
            args.push(Argument::Flag(from.clone()));
        } else {
            args.push(Argument::Flag("-cache-replay-prefix-map".into()));
            args.push(Argument::Flag(format!("{to}={from}")));
        }
    }

    Ok((args, manifest, inputs))
}

/// Builds one compile-from-interface job per reachable Swift dependency and
/// one generate-pcm job per reachable Clang dependency of `main_module`.
#[instrument(skip(graph, tool, opts))]
pub fn plan_explicit_module_jobs(
    graph: &ModuleDependencyGraph,
    main_module: &ModuleId,
    tool: &TypedPath,
    opts: &ExplicitModuleBuildOptions,
) -> Result<ExplicitModulePlan> {
    let reachable = graph.reachable_from(main_module)?;
    let bridging_closure = graph.bridging_header_dependency_closure(&reachable);

    let mut jobs = Vec::new();

    for id in &reachable {
        if id == main_module {
            continue;
        }
        let info = graph
            .get(id)
            .ok_or_else(|| DriverError::MissingModuleDependency(id.name().to_string()))?;

        match &info.details {
            ModuleDetails::SwiftTextual(details) => {
                jobs.push(plan_swift_interface_job(id, info, details, tool, graph, opts)?);
            }
            ModuleDetails::Clang(details) => {
                jobs.push(plan_clang_pcm_job(id, info, details, tool, graph, opts)?);
            }
            ModuleDetails::SwiftBinary(_) => {
                // Already built; no job needed, only a manifest entry (built by
                // the caller via `explicit_module_dependency_additions`).
            }
            ModuleDetails::SwiftPlaceholder(_) => {
                return Err(DriverError::MalformedModuleDependency {
                    module_name: id.name().to_string(),
                    reason: "placeholder dependency must be resolved before planning".into(),
                });
            }
        }
    }

    let (main_module_extra_args, manifest, main_module_extra_inputs) =
        explicit_module_dependency_additions(graph, main_module, &bridging_closure, opts)?;

    debug!(jobs = jobs.len(), manifest_entries = manifest.len(), "explicit module plan built");

    Ok(ExplicitModulePlan { jobs, manifest, main_module_extra_args, main_module_extra_inputs })
}

fn plan_swift_interface_job(
    id: &ModuleId,
    info: &ModuleInfo,
    details: &crate::module_graph::SwiftTextualDetails,
    tool: &TypedPath,
    graph: &ModuleDependencyGraph,
    opts: &ExplicitModuleBuildOptions,
) -> Result<Job> {
    let interface_path = details.module_interface_path.clone().ok_or_else(|| {
        DriverError::MalformedModuleDependency {
            module_name: id.name().to_string(),
            reason: "missing module interface path".into(),
        }
    })?;

    let reachable = graph.reachable_from(id)?;
    let bridging_closure = graph.bridging_header_dependency_closure(&reachable);
    let (extra_args, _manifest, extra_inputs) =
        explicit_module_dependency_additions(graph, id, &bridging_closure, opts)?;

    let mut inputs = vec![TypedPath::absolute(interface_path.clone(), FileType::SwiftInterface)];
    for candidate in &details.compiled_module_candidates {
        inputs.push(TypedPath::absolute(candidate.clone(), FileType::SwiftModule));
    }
    inputs.extend(extra_inputs);

    let mut arguments: Vec<Argument> =
        details.command_line.iter().cloned().map(Argument::Flag).collect();
    arguments.extend(extra_args);

    let output_path =
        info.module_path.clone().unwrap_or_else(|| format!("{}.swiftmodule", id.name()));
    let output = TypedPath::absolute(output_path, FileType::SwiftModule);

    let mut job = Job::new(JobKind::CompileModuleFromInterface, tool.clone())
        .with_arguments(arguments)
        .with_inputs(inputs)
        .with_outputs(vec![output.clone()]);

    if let Some(key) = &details.cache_key {
        job.output_cache_keys.insert(output.key(), key.clone());
    }

    Ok(job)
}

fn plan_clang_pcm_job(
    id: &ModuleId,
    info: &ModuleInfo,
    details: &crate::module_graph::ClangDetails,
    tool: &TypedPath,
    graph: &ModuleDependencyGraph,
    opts: &ExplicitModuleBuildOptions,
) -> Result<Job> {
    let reachable = graph.reachable_from(id)?;
    let bridging_closure = graph.bridging_header_dependency_closure(&reachable);
    let (extra_args, _manifest, extra_inputs) =
        explicit_module_dependency_additions(graph, id, &bridging_closure, opts)?;

    let mut inputs = vec![TypedPath::absolute(details.module_map_path.clone(), FileType::Source)];
    inputs.extend(extra_inputs);

    let mut arguments: Vec<Argument> =
        details.command_line.iter().cloned().map(Argument::Flag).collect();
    arguments.extend(extra_args);

    let output_path = info
        .module_path
        .clone()
        .unwrap_or_else(|| format!("{}-{}.pcm", id.name(), &details.context_hash));
    let output = TypedPath::absolute(output_path, FileType::PrecompiledModule);

    let mut job = Job::new(JobKind::GeneratePrecompiledModule, tool.clone())
        .with_arguments(arguments)
        .with_inputs(inputs)
        .with_outputs(vec![output.clone()]);

    if let Some(key) = &details.cache_key {
        job.output_cache_keys.insert(output.key(), key.clone());
    }

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_graph::{ClangDetails, SwiftTextualDetails};
    use std::collections::BTreeMap;

    fn tool() -> TypedPath {
        TypedPath::absolute("/usr/bin/swift-frontend", FileType::Executable)
    }

    fn simple_graph() -> ModuleDependencyGraph {
        let mut modules = BTreeMap::new();
        modules.insert(
            ModuleId::Swift("Main".into()),
            ModuleInfo {
                module_path: None,
                source_files: vec!["main.swift".into()],
                direct_dependencies: vec![ModuleId::Swift("Dep".into()), ModuleId::Clang("CDep".into())],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails::default()),
            },
        );
        modules.insert(
            ModuleId::Swift("Dep".into()),
            ModuleInfo {
                module_path: Some("Dep.swiftmodule".into()),
                source_files: vec![],
                direct_dependencies: vec![],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails {
                    module_interface_path: Some("Dep.swiftinterface".into()),
                    ..Default::default()
                }),
            },
        );
        modules.insert(
            ModuleId::Clang("CDep".into()),
            ModuleInfo {
                module_path: Some("CDep.pcm".into()),
                source_files: vec![],
                direct_dependencies: vec![],
                link_libraries: vec![],
                details: ModuleDetails::Clang(ClangDetails {
                    module_map_path: "CDep/module.modulemap".into(),
                    context_hash: "abc123".into(),
                    command_line: vec!["-emit-pcm".into()],
                    cache_key: None,
                }),
            },
        );
        ModuleDependencyGraph { main_module_name: "Main".into(), modules }
    }

    #[test]
    fn plans_one_job_per_reachable_dependency() {
        let graph = simple_graph();
        let plan = plan_explicit_module_jobs(
            &graph,
            &ModuleId::Swift("Main".into()),
            &tool(),
            &ExplicitModuleBuildOptions::default(),
        )
        .unwrap();
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.manifest.len(), 2);
    }

    #[test]
    fn manifest_is_sorted_swift_first_then_by_name() {
        let graph = simple_graph();
        let plan = plan_explicit_module_jobs(
            &graph,
            &ModuleId::Swift("Main".into()),
            &tool(),
            &ExplicitModuleBuildOptions::default(),
        )
        .unwrap();
        assert!(matches!(plan.manifest[0], ManifestEntry::Swift { .. }));
        assert!(matches!(plan.manifest[1], ManifestEntry::Clang { .. }));
    }

    #[test]
    fn missing_interface_path_is_malformed_error() {
        let mut graph = simple_graph();
        graph.modules.insert(
            ModuleId::Swift("Dep".into()),
            ModuleInfo {
                module_path: Some("Dep.swiftmodule".into()),
                source_files: vec![],
                direct_dependencies: vec![],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails::default()),
            },
        );
        let err = plan_explicit_module_jobs(
            &graph,
            &ModuleId::Swift("Main".into()),
            &tool(),
            &ExplicitModuleBuildOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DriverError::MalformedModuleDependency { .. }));
    }
}
