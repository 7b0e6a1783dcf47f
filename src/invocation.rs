//! Invocation-run-mode detection (§6): decides, from `argv`, whether the
//! process should dispatch to a `swift-<subcommand>` executable instead of
//! running the driver directly.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RunMode {
    /// Run the driver normally with the given argv (unchanged).
    Normal,
    /// Replace argv with the given subcommand executable name and the
    /// remaining arguments; the caller is expected to locate and exec it.
    Subcommand { executable_name: String, arguments: Vec<String> },
}

/// Implements the dispatch rule from §6. `argv` must include the program
/// name at index 0.
pub fn detect_run_mode(argv: &[String]) -> RunMode {
    let Some(program) = argv.first() else { return RunMode::Normal };
    let basename = executable_basename(program);
    if basename != "swift" && basename != "swiftc" {
        return RunMode::Normal;
    }

    let Some(first_arg) = argv.get(1) else { return RunMode::Normal };

    if first_arg == "-frontend" || first_arg == "-modulewrap" {
        return RunMode::Subcommand {
            executable_name: "swift-frontend".to_string(),
            arguments: argv[1..].to_vec(),
        };
    }

    if looks_like_option_or_path(first_arg) {
        return RunMode::Normal;
    }

    if first_arg == "repl" {
        // Dispatches as a normal invocation with a synthesized `-repl` flag;
        // threading that flag into the option table is handled outside this crate.
        return RunMode::Normal;
    }

    RunMode::Subcommand {
        executable_name: format!("swift-{first_arg}"),
        arguments: argv[2..].to_vec(),
    }
}

fn looks_like_option_or_path(arg: &str) -> bool {
    arg.starts_with('-') || arg.starts_with('/') || arg.contains('.')
}

fn executable_basename(program: &str) -> String {
    let path = Path::new(program);
    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or(program);
    name.to_string()
}

/// Resolves a subcommand executable name to a path: first beside the driver
/// executable, then via `PATH`.
pub fn resolve_subcommand_path(driver_path: &Path, executable_name: &str) -> Option<PathBuf> {
    if let Some(dir) = driver_path.parent() {
        let candidate = dir.join(platform_executable_name(executable_name));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(platform_executable_name(executable_name)))
        .find(|candidate| candidate.is_file())
}

#[cfg(windows)]
fn platform_executable_name(name: &str) -> String {
    format!("{name}.exe")
}

#[cfg(not(windows))]
fn platform_executable_name(name: &str) -> String {
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn frontend_dispatches_to_swift_frontend() {
        let mode = detect_run_mode(&argv(&["swift", "-frontend", "-c"]));
        match mode {
            RunMode::Subcommand { executable_name, .. } => assert_eq!(executable_name, "swift-frontend"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn option_like_first_arg_is_normal_invocation() {
        let mode = detect_run_mode(&argv(&["swiftc", "-c", "main.swift"]));
        assert_eq!(mode, RunMode::Normal);
    }

    #[test]
    fn path_like_first_arg_is_normal_invocation() {
        let mode = detect_run_mode(&argv(&["swift", "main.swift"]));
        assert_eq!(mode, RunMode::Normal);
    }

    #[test]
    fn bare_token_dispatches_to_subcommand() {
        let mode = detect_run_mode(&argv(&["swift", "build"]));
        match mode {
            RunMode::Subcommand { executable_name, .. } => assert_eq!(executable_name, "swift-build"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_driver_program_name_is_normal() {
        let mode = detect_run_mode(&argv(&["some-other-tool", "build"]));
        assert_eq!(mode, RunMode::Normal);
    }
}
