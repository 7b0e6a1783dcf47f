//! Test-only builders for module-dependency graphs and build configurations,
//! grounded on the teacher's `project_util` convention of small test-only
//! scaffolding living inside the library crate.

#![cfg(test)]

use std::collections::BTreeMap;

use crate::module_graph::{
    ClangDetails, ModuleDependencyGraph, ModuleDetails, ModuleId, ModuleInfo, SwiftTextualDetails,
};

pub struct GraphBuilder {
    main_module_name: String,
    modules: BTreeMap<ModuleId, ModuleInfo>,
}

impl GraphBuilder {
    pub fn new(main_module_name: impl Into<String>) -> Self {
        Self { main_module_name: main_module_name.into(), modules: BTreeMap::new() }
    }

    pub fn with_main_swift_deps(mut self, deps: Vec<ModuleId>) -> Self {
        self.modules.insert(
            ModuleId::Swift(self.main_module_name.clone()),
            ModuleInfo {
                module_path: None,
                source_files: vec![],
                direct_dependencies: deps,
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails::default()),
            },
        );
        self
    }

    pub fn with_swift_textual(mut self, name: &str, interface_path: &str) -> Self {
        self.modules.insert(
            ModuleId::Swift(name.to_string()),
            ModuleInfo {
                module_path: Some(format!("{name}.swiftmodule")),
                source_files: vec![],
                direct_dependencies: vec![],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails {
                    module_interface_path: Some(interface_path.to_string()),
                    ..Default::default()
                }),
            },
        );
        self
    }

    pub fn with_clang(mut self, name: &str, module_map_path: &str) -> Self {
        self.modules.insert(
            ModuleId::Clang(name.to_string()),
            ModuleInfo {
                module_path: Some(format!("{name}.pcm")),
                source_files: vec![],
                direct_dependencies: vec![],
                link_libraries: vec![],
                details: ModuleDetails::Clang(ClangDetails {
                    module_map_path: module_map_path.to_string(),
                    context_hash: "hash".to_string(),
                    command_line: vec!["-emit-pcm".to_string()],
                    cache_key: None,
                }),
            },
        );
        self
    }

    pub fn build(self) -> ModuleDependencyGraph {
        ModuleDependencyGraph { main_module_name: self.main_module_name, modules: self.modules }
    }
}
