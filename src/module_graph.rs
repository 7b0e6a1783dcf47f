//! Inter-module dependency graph: the scanner's product, consumed by the
//! Explicit Module Build Planner (§4.D) and serialized per §6.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name")]
pub enum ModuleId {
    Swift(String),
    SwiftPrebuiltExternal(String),
    SwiftPlaceholder(String),
    Clang(String),
}

impl ModuleId {
    pub fn name(&self) -> &str {
        match self {
            ModuleId::Swift(n)
            | ModuleId::SwiftPrebuiltExternal(n)
            | ModuleId::SwiftPlaceholder(n)
            | ModuleId::Clang(n) => n,
        }
    }

    pub fn is_clang(&self) -> bool {
        matches!(self, ModuleId::Clang(_))
    }

    pub fn is_swift(&self) -> bool {
        !self.is_clang()
    }

    /// Wire encoding used by the scanner JSON (§6): `swiftTextual:name`, etc.
    pub fn wire_string(&self) -> String {
        let (tag, name) = match self {
            ModuleId::Swift(n) => ("swiftTextual", n),
            ModuleId::SwiftPrebuiltExternal(n) => ("swiftBinary", n),
            ModuleId::SwiftPlaceholder(n) => ("swiftPlaceholder", n),
            ModuleId::Clang(n) => ("clang", n),
        };
        format!("{tag}:{name}")
    }

    pub fn from_wire_string(s: &str) -> Result<Self> {
        let (tag, name) = s
            .split_once(':')
            .ok_or_else(|| DriverError::msg(format!("malformed module id '{s}'")))?;
        Ok(match tag {
            "swiftTextual" => ModuleId::Swift(name.to_string()),
            "swiftBinary" => ModuleId::SwiftPrebuiltExternal(name.to_string()),
            "swiftPlaceholder" => ModuleId::SwiftPlaceholder(name.to_string()),
            "clang" => ModuleId::Clang(name.to_string()),
            other => return Err(DriverError::msg(format!("unknown module id tag '{other}'"))),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwiftTextualDetails {
    pub module_interface_path: Option<String>,
    pub compiled_module_candidates: Vec<String>,
    pub bridging_header_path: Option<String>,
    pub bridging_header_dependencies: Vec<ModuleId>,
    pub command_line: Vec<String>,
    pub bridging_pch_command_line: Vec<String>,
    pub context_hash: Option<String>,
    pub is_framework: bool,
    pub extra_pcm_args: Vec<String>,
    pub cache_key: Option<String>,
    pub chained_bridging_header_path: Option<String>,
    pub chained_bridging_header_content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwiftBinaryDetails {
    pub compiled_module_path: String,
    pub module_doc_path: Option<String>,
    pub module_source_info_path: Option<String>,
    pub header_dependencies: Vec<String>,
    pub header_dependency_module_dependencies: Vec<ModuleId>,
    pub is_framework: bool,
    pub cache_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwiftPlaceholderDetails {
    pub module_doc_path: Option<String>,
    pub module_source_info_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClangDetails {
    pub module_map_path: String,
    pub context_hash: String,
    pub command_line: Vec<String>,
    pub cache_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleDetails {
    SwiftTextual(SwiftTextualDetails),
    SwiftBinary(SwiftBinaryDetails),
    SwiftPlaceholder(SwiftPlaceholderDetails),
    Clang(ClangDetails),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub module_path: Option<String>,
    pub source_files: Vec<String>,
    pub direct_dependencies: Vec<ModuleId>,
    pub link_libraries: Vec<String>,
    pub details: ModuleDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDependencyGraph {
    pub main_module_name: String,
    pub modules: BTreeMap<ModuleId, ModuleInfo>,
}

impl ModuleDependencyGraph {
    pub fn main_module_id(&self) -> ModuleId {
        ModuleId::Swift(self.main_module_name.clone())
    }

    pub fn get(&self, id: &ModuleId) -> Option<&ModuleInfo> {
        self.modules.get(id)
    }

    /// Transitive closure of direct dependencies from `root`, including
    /// `root` itself. Returns an error if a cycle is encountered, and an
    /// error if any id in the closure has no corresponding graph entry.
    pub fn reachable_from(&self, root: &ModuleId) -> Result<Vec<ModuleId>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut order = Vec::new();
        self.dfs(root, &mut visited, &mut on_stack, &mut order)?;
        Ok(order)
    }

    fn dfs(
        &self,
        id: &ModuleId,
        visited: &mut HashSet<ModuleId>,
        on_stack: &mut HashSet<ModuleId>,
        order: &mut Vec<ModuleId>,
    ) -> Result<()> {
        if visited.contains(id) {
            return Ok(());
        }
        if on_stack.contains(id) {
            return Err(DriverError::ModuleDependencyCycle(id.name().to_string()));
        }
        on_stack.insert(id.clone());

        let info = self
            .modules
            .get(id)
            .ok_or_else(|| DriverError::MissingModuleDependency(id.name().to_string()))?;
        for dep in &info.direct_dependencies {
            self.dfs(dep, visited, on_stack, order)?;
        }

        on_stack.remove(id);
        visited.insert(id.clone());
        order.push(id.clone());
        Ok(())
    }

    /// BFS over the bridging-header dependency sub-graph starting from the
    /// main module's recorded `bridgingHeaderDependencies`, plus every
    /// reachable Swift-binary dep's `headerDependencyModuleDependencies`.
    pub fn bridging_header_dependency_closure(&self, reachable: &[ModuleId]) -> HashSet<ModuleId> {
        let mut roots: Vec<ModuleId> = Vec::new();

        if let Some(ModuleInfo { details: ModuleDetails::SwiftTextual(d), .. }) =
            self.modules.get(&self.main_module_id())
        {
            roots.extend(d.bridging_header_dependencies.iter().cloned());
        }

        for id in reachable {
            if let Some(ModuleInfo { details: ModuleDetails::SwiftBinary(d), .. }) =
                self.modules.get(id)
            {
                roots.extend(d.header_dependency_module_dependencies.iter().cloned());
            }
        }

        let mut closure = HashSet::new();
        let mut queue: VecDeque<ModuleId> = roots.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            if !closure.insert(id.clone()) {
                continue;
            }
            if let Some(info) = self.modules.get(&id) {
                for dep in &info.direct_dependencies {
                    if dep.is_clang() && !closure.contains(dep) {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }
        closure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_cycle() -> ModuleDependencyGraph {
        let mut modules = BTreeMap::new();
        modules.insert(
            ModuleId::Swift("A".into()),
            ModuleInfo {
                module_path: None,
                source_files: vec![],
                direct_dependencies: vec![ModuleId::Swift("B".into())],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails::default()),
            },
        );
        modules.insert(
            ModuleId::Swift("B".into()),
            ModuleInfo {
                module_path: None,
                source_files: vec![],
                direct_dependencies: vec![ModuleId::Swift("A".into())],
                link_libraries: vec![],
                details: ModuleDetails::SwiftTextual(SwiftTextualDetails::default()),
            },
        );
        ModuleDependencyGraph { main_module_name: "A".into(), modules }
    }

    #[test]
    fn detects_dependency_cycles() {
        let graph = graph_with_cycle();
        let err = graph.reachable_from(&ModuleId::Swift("A".into())).unwrap_err();
        assert!(matches!(err, DriverError::ModuleDependencyCycle(_)));
    }

    #[test]
    fn wire_string_round_trips() {
        for id in [
            ModuleId::Swift("Foo".into()),
            ModuleId::SwiftPrebuiltExternal("Foo".into()),
            ModuleId::SwiftPlaceholder("Foo".into()),
            ModuleId::Clang("Foo".into()),
        ] {
            let s = id.wire_string();
            assert_eq!(ModuleId::from_wire_string(&s).unwrap(), id);
        }
    }

}
