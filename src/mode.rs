//! Compilation Mode Resolver (§4.A): classifies the requested compilation and
//! derives the compiler/linker output file types.

use tracing::{instrument, warn};

use crate::error::{DriverError, Result};
use crate::path::FileType;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DriverKind {
    Interactive,
    Batch,
}

/// The requested compilation's shape.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CompilerMode {
    StandardCompile,
    BatchCompile { seed: u64, count: Option<usize>, size_limit: Option<usize> },
    SingleCompile,
    Immediate,
    Repl,
    CompilePcm,
    DumpPcm,
    Intro,
}

impl CompilerMode {
    pub fn uses_primary_file_inputs(&self) -> bool {
        matches!(self, CompilerMode::StandardCompile | CompilerMode::BatchCompile { .. })
    }

    pub fn is_single_compilation(&self) -> bool {
        matches!(self, CompilerMode::SingleCompile)
    }

    pub fn supports_bridging_pch(&self) -> bool {
        matches!(
            self,
            CompilerMode::StandardCompile
                | CompilerMode::BatchCompile { .. }
                | CompilerMode::SingleCompile
        )
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, CompilerMode::BatchCompile { .. })
    }
}

/// Abstract view of the option table the resolver needs. The real option
/// parser lives outside this crate; tests and callers construct this
/// directly.
#[derive(Debug, Clone, Default)]
pub struct ModeOptions {
    pub emit_imported_modules: bool,
    pub repl: bool,
    pub emit_pcm: bool,
    pub dump_pcm: bool,
    pub integrated_repl_requested: bool,
    pub whole_module_optimization: bool,
    pub dump_ast: bool,
    pub index_file: bool,
    pub enable_batch_mode: bool,
    pub disable_batch_mode: bool,
    pub batch_seed: Option<u64>,
    pub batch_count: Option<usize>,
    pub batch_size_limit: Option<usize>,
    pub emit_executable: bool,
    pub emit_library: bool,
    pub static_library: bool,
    pub emit_object: bool,
    pub emit_assembly: bool,
    pub emit_sil: bool,
    pub emit_silgen: bool,
    pub emit_sib: bool,
    pub emit_sibgen: bool,
    pub emit_ir: bool,
    pub emit_irgen: bool,
    pub emit_bc: bool,
    pub emit_module_only: bool,
    pub embed_bitcode: bool,
    pub lto: bool,
    pub has_inputs: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LinkerOutputType {
    None,
    Executable,
    DynamicLibrary,
    StaticLibrary,
}

#[derive(Debug, Clone)]
pub struct ResolvedMode {
    pub mode: CompilerMode,
    pub compiler_output_type: FileType,
    pub linker_output_type: LinkerOutputType,
}

/// Runs the mode-resolution algorithm described in the specification.
#[instrument(skip(opts))]
pub fn resolve_mode(opts: &ModeOptions, driver_kind: DriverKind) -> Result<ResolvedMode> {
    if opts.integrated_repl_requested {
        return Err(DriverError::IntegratedReplRemoved);
    }

    let mode = if opts.emit_imported_modules {
        CompilerMode::StandardCompile // scan-dependencies rides the standard pipeline; output type below selects the json
    } else if opts.repl && driver_kind == DriverKind::Interactive {
        CompilerMode::Repl
    } else if opts.emit_pcm {
        CompilerMode::CompilePcm
    } else if opts.dump_pcm {
        CompilerMode::DumpPcm
    } else {
        match driver_kind {
            DriverKind::Interactive => {
                if !opts.has_inputs && !opts.repl {
                    CompilerMode::Intro
                } else if opts.has_inputs {
                    CompilerMode::Immediate
                } else {
                    CompilerMode::Repl
                }
            }
            DriverKind::Batch => resolve_batch_mode(opts)?,
        }
    };

    let compiler_output_type = resolve_compiler_output_type(opts);
    let linker_output_type = resolve_linker_output_type(opts);

    Ok(ResolvedMode { mode, compiler_output_type, linker_output_type })
}

fn resolve_batch_mode(opts: &ModeOptions) -> Result<CompilerMode> {
    let mut wmo = opts.whole_module_optimization;

    if wmo && opts.dump_ast {
        warn!("-dump-ast conflicts with whole module optimization; -wmo is ignored");
        wmo = false;
    }
    if opts.index_file && opts.dump_ast {
        warn!("-dump-ast conflicts with -index-file; -index-file is ignored");
        return Ok(CompilerMode::StandardCompile);
    }

    if wmo || opts.index_file {
        if opts.enable_batch_mode {
            warn!("-enable-batch-mode has no effect in whole-module or index-file mode");
        }
        return Ok(CompilerMode::SingleCompile);
    }

    if opts.enable_batch_mode && !opts.disable_batch_mode {
        let seed = opts.batch_seed.unwrap_or(0);
        return Ok(CompilerMode::BatchCompile {
            seed,
            count: opts.batch_count,
            size_limit: opts.batch_size_limit,
        });
    }

    Ok(CompilerMode::StandardCompile)
}

fn resolve_compiler_output_type(opts: &ModeOptions) -> FileType {
    if opts.emit_imported_modules {
        return FileType::JsonDependencies;
    }
    if opts.dump_ast {
        return FileType::Ast;
    }
    if opts.emit_sil {
        return FileType::Sil;
    }
    if opts.emit_silgen {
        return FileType::Sil;
    }
    if opts.emit_sib {
        return FileType::Sib;
    }
    if opts.emit_sibgen {
        return FileType::Sib;
    }
    if opts.emit_ir || opts.emit_irgen {
        return FileType::Assembly;
    }
    if opts.emit_bc {
        return FileType::LlvmBitcode;
    }
    if opts.emit_pcm {
        return FileType::PrecompiledModule;
    }
    if opts.emit_assembly {
        return FileType::Assembly;
    }
    if opts.emit_object || opts.emit_module_only {
        if opts.emit_module_only {
            return FileType::SwiftModule;
        }
        return FileType::Object;
    }
    if opts.lto {
        return FileType::LlvmBitcode;
    }
    FileType::Object
}

fn resolve_linker_output_type(opts: &ModeOptions) -> LinkerOutputType {
    if opts.embed_bitcode {
        warn!("-embed-bitcode is deprecated and has no effect");
    }
    if opts.emit_executable {
        LinkerOutputType::Executable
    } else if opts.emit_library {
        if opts.static_library {
            LinkerOutputType::StaticLibrary
        } else {
            LinkerOutputType::DynamicLibrary
        }
    } else {
        LinkerOutputType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ModeOptions {
        ModeOptions::default()
    }

    #[test]
    fn integrated_repl_is_rejected() {
        let o = ModeOptions { integrated_repl_requested: true, ..opts() };
        let err = resolve_mode(&o, DriverKind::Interactive).unwrap_err();
        assert!(matches!(err, DriverError::IntegratedReplRemoved));
    }

    #[test]
    fn interactive_with_no_inputs_is_intro() {
        let o = opts();
        let r = resolve_mode(&o, DriverKind::Interactive).unwrap();
        assert_eq!(r.mode, CompilerMode::Intro);
    }

    #[test]
    fn interactive_with_inputs_is_immediate() {
        let o = ModeOptions { has_inputs: true, ..opts() };
        let r = resolve_mode(&o, DriverKind::Interactive).unwrap();
        assert_eq!(r.mode, CompilerMode::Immediate);
    }

    #[test]
    fn wmo_wins_over_dump_ast() {
        let o = ModeOptions { whole_module_optimization: true, dump_ast: true, ..opts() };
        let r = resolve_mode(&o, DriverKind::Batch).unwrap();
        assert_eq!(r.mode, CompilerMode::StandardCompile);
    }

    #[test]
    fn wmo_alone_is_single_compile() {
        let o = ModeOptions { whole_module_optimization: true, ..opts() };
        let r = resolve_mode(&o, DriverKind::Batch).unwrap();
        assert_eq!(r.mode, CompilerMode::SingleCompile);
    }

    #[test]
    fn batch_mode_reads_sub_options() {
        let o = ModeOptions {
            enable_batch_mode: true,
            batch_seed: Some(42),
            batch_count: Some(4),
            ..opts()
        };
        let r = resolve_mode(&o, DriverKind::Batch).unwrap();
        match r.mode {
            CompilerMode::BatchCompile { seed, count, .. } => {
                assert_eq!(seed, 42);
                assert_eq!(count, Some(4));
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn disable_batch_mode_overrides_enable() {
        let o = ModeOptions { enable_batch_mode: true, disable_batch_mode: true, ..opts() };
        let r = resolve_mode(&o, DriverKind::Batch).unwrap();
        assert_eq!(r.mode, CompilerMode::StandardCompile);
    }

    #[test]
    fn default_batch_driver_mode_is_standard_compile() {
        let o = opts();
        let r = resolve_mode(&o, DriverKind::Batch).unwrap();
        assert_eq!(r.mode, CompilerMode::StandardCompile);
    }
}
