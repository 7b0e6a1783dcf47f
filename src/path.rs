//! Typed paths: every file the driver refers to is a `(Location, FileType)` pair.

use std::fmt;
use std::path::{Path, PathBuf};

use path_slash::PathExt as _;
use serde::{Deserialize, Serialize};

/// Where a typed path's bytes actually live.
///
/// Equality and hashing are derived on the whole enum: two `Temporary` values
/// with the same name are the same location, regardless of type, which is
/// what lets the producer map key purely on `TypedPath`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Location {
    Absolute(PathBuf),
    Relative(PathBuf),
    StandardInput,
    StandardOutput,
    Temporary(String),
    TemporaryWithContents(String, Vec<u8>),
    FileList(String, Vec<String>),
}

impl Location {
    /// Best-effort string form used for JSON interfaces and for keying
    /// sorted maps. Slash-normalized so output is stable across platforms.
    pub fn display_string(&self) -> String {
        match self {
            Location::Absolute(p) | Location::Relative(p) => {
                p.to_slash_lossy().into_owned()
            }
            Location::StandardInput => "-".to_string(),
            Location::StandardOutput => "-".to_string(),
            Location::Temporary(name)
            | Location::TemporaryWithContents(name, _)
            | Location::FileList(name, _) => name.clone(),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Location::Absolute(p) | Location::Relative(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

/// Closed set of file kinds the driver reasons about. New kinds require a
/// matching update to every planner that switches on this enum.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    Source,
    Object,
    Assembly,
    LlvmBitcode,
    PrecompiledModule,
    SwiftModule,
    SwiftModuleDoc,
    SwiftModuleSourceInfo,
    SwiftInterface,
    PrecompiledHeader,
    DependencyList,
    SerializedDiagnostics,
    OptimizationRecord,
    JsonDependencies,
    JsonArtifacts,
    JsonModuleArtifactManifest,
    ReferenceDependencies,
    ConstValues,
    Tbd,
    ObjcHeader,
    Executable,
    DynamicLibrary,
    StaticLibrary,
    Autolink,
    Image,
    Ast,
    Sil,
    Sib,
    Indexdata,
    Remap,
    ResponseFile,
}

impl FileType {
    /// Conventional filename extension, used when the planner synthesizes a
    /// path that was not present in the output file map.
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Source => "swift",
            FileType::Object => "o",
            FileType::Assembly => "s",
            FileType::LlvmBitcode => "bc",
            FileType::PrecompiledModule => "pcm",
            FileType::SwiftModule => "swiftmodule",
            FileType::SwiftModuleDoc => "swiftdoc",
            FileType::SwiftModuleSourceInfo => "swiftsourceinfo",
            FileType::SwiftInterface => "swiftinterface",
            FileType::PrecompiledHeader => "pch",
            FileType::DependencyList => "d",
            FileType::SerializedDiagnostics => "dia",
            FileType::OptimizationRecord => "opt.yaml",
            FileType::JsonDependencies => "json",
            FileType::JsonArtifacts => "json",
            FileType::JsonModuleArtifactManifest => "json",
            FileType::ReferenceDependencies => "swiftdeps",
            FileType::ConstValues => "swiftconstvalues",
            FileType::Tbd => "tbd",
            FileType::ObjcHeader => "h",
            FileType::Executable => "",
            FileType::DynamicLibrary => "dylib",
            FileType::StaticLibrary => "a",
            FileType::Autolink => "autolink",
            FileType::Image => "out",
            FileType::Ast => "ast",
            FileType::Sil => "sil",
            FileType::Sib => "sib",
            FileType::Indexdata => "indexdata",
            FileType::Remap => "remap",
            FileType::ResponseFile => "resp",
        }
    }

    pub fn is_primary_output_candidate(self) -> bool {
        matches!(
            self,
            FileType::Object
                | FileType::LlvmBitcode
                | FileType::Assembly
                | FileType::Sil
                | FileType::Sib
                | FileType::Ast
        )
    }
}

/// A reference to a single file that carries its semantic type alongside its
/// location, so planners never need to re-derive a file's kind from its
/// extension.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TypedPath {
    pub location: Location,
    pub file_type: FileType,
}

impl TypedPath {
    pub fn new(location: Location, file_type: FileType) -> Self {
        Self { location, file_type }
    }

    pub fn absolute(path: impl Into<PathBuf>, file_type: FileType) -> Self {
        Self::new(Location::Absolute(path.into()), file_type)
    }

    pub fn temporary(name: impl Into<String>, file_type: FileType) -> Self {
        Self::new(Location::Temporary(name.into()), file_type)
    }

    pub fn key(&self) -> String {
        self.location.display_string()
    }
}

impl fmt::Display for TypedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_string_normalizes_to_slashes() {
        let p = Location::Relative(PathBuf::from("a/b/c.swift"));
        assert_eq!(p.display_string(), "a/b/c.swift");
    }

    #[test]
    fn typed_path_key_is_location_only() {
        let a = TypedPath::temporary("t1", FileType::Object);
        let b = TypedPath::temporary("t1", FileType::Assembly);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn extension_table_is_exhaustive_for_primary_candidates() {
        for ft in [FileType::Object, FileType::LlvmBitcode, FileType::Assembly, FileType::Sil, FileType::Sib, FileType::Ast] {
            assert!(ft.is_primary_output_candidate());
        }
        assert!(!FileType::SwiftModule.is_primary_output_candidate());
    }
}
