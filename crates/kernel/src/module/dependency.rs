//! Module dependency resolution using topological sort.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use super::error::ModuleError;
use super::manifest::ModuleManifest;

/// Drop modules whose dependencies are not available.
///
/// Dropping a module can leave its dependents unsatisfied, so this repeats
/// until nothing changes. Returns the dropped modules with the dependency
/// they missed.
pub fn remove_unsatisfied(
    modules: &mut BTreeMap<String, ModuleManifest>,
) -> Vec<(String, String)> {
    let mut removed = Vec::new();

    loop {
        let unsatisfied: Vec<(String, String)> = modules
            .values()
            .filter_map(|m| {
                m.dependencies
                    .iter()
                    .find(|dep| !modules.contains_key(*dep))
                    .map(|dep| (m.name.clone(), dep.clone()))
            })
            .collect();

        if unsatisfied.is_empty() {
            return removed;
        }

        for (module, dependency) in unsatisfied {
            warn!(
                module = %module,
                dependency = %dependency,
                "skipping module with unsatisfied dependency"
            );
            modules.remove(&module);
            removed.push((module, dependency));
        }
    }
}

/// Check that every dependency of `module` is in `available`.
pub fn check_dependencies(
    module: &ModuleManifest,
    available: &BTreeMap<String, ModuleManifest>,
) -> Result<(), ModuleError> {
    match module
        .dependencies
        .iter()
        .find(|dep| !available.contains_key(*dep))
    {
        Some(dep) => Err(ModuleError::MissingDependency {
            module: module.name.clone(),
            dependency: dep.clone(),
        }),
        None => Ok(()),
    }
}

/// Order modules so that dependencies come before their dependents.
///
/// Kahn's algorithm; modules that become ready at the same time are taken
/// alphabetically, so the order is stable across runs.
pub fn resolve_load_order(
    modules: &BTreeMap<String, ModuleManifest>,
) -> Result<Vec<String>, ModuleError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (name, manifest) in modules {
        check_dependencies(manifest, modules)?;
        in_degree.insert(name, manifest.dependencies.len());
        for dep in &manifest.dependencies {
            dependents.entry(dep.as_str()).or_default().push(name);
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(modules.len());

    while let Some(module) = ready.pop_first() {
        order.push(module.to_string());

        for dependent in dependents.get(module).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != modules.len() {
        let cycle: Vec<&str> = modules
            .keys()
            .map(String::as_str)
            .filter(|name| !order.iter().any(|o| o == name))
            .collect();
        return Err(ModuleError::CircularDependency {
            cycle: cycle.join(", "),
        });
    }

    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn modules(specs: &[(&str, &[&str])]) -> BTreeMap<String, ModuleManifest> {
        specs
            .iter()
            .map(|(name, deps)| {
                let mut manifest = ModuleManifest::fallback(name);
                manifest.dependencies = deps.iter().map(|d| d.to_string()).collect();
                (name.to_string(), manifest)
            })
            .collect()
    }

    #[test]
    fn independent_modules_are_alphabetical() {
        let order = resolve_load_order(&modules(&[("c", &[]), ("a", &[]), ("b", &[])])).unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn dependencies_come_first() {
        let order = resolve_load_order(&modules(&[
            ("a", &["monitoring"]),
            ("monitoring", &["graphs"]),
            ("graphs", &[]),
            ("z", &[]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["graphs", "monitoring", "a", "z"]);
    }

    #[test]
    fn diamond() {
        let order = resolve_load_order(&modules(&[
            ("a", &["b", "c"]),
            ("b", &["d"]),
            ("c", &["d"]),
            ("d", &[]),
        ]))
        .unwrap();
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn cycles_are_reported() {
        let err = resolve_load_order(&modules(&[("a", &["b"]), ("b", &["a"]), ("c", &[])]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "circular dependency detected involving modules: a, b"
        );
    }

    #[test]
    fn missing_dependencies_cascade() {
        let mut set = modules(&[("a", &["b"]), ("b", &["gone"]), ("c", &[])]);
        let removed = remove_unsatisfied(&mut set);
        assert_eq!(
            removed,
            vec![
                ("b".to_string(), "gone".to_string()),
                ("a".to_string(), "b".to_string())
            ]
        );
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn missing_dependency_is_an_error_for_ordering() {
        let err = resolve_load_order(&modules(&[("a", &["missing"])])).unwrap_err();
        assert!(matches!(err, ModuleError::MissingDependency { .. }));
    }
}
