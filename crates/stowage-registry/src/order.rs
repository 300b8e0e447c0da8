use std::collections::{BTreeMap, BTreeSet};

use stowage_core::{PackageDescriptor, PackageKey};

/// Orders packages so that dependencies come before their dependents.
///
/// Dependencies outside the given set are ignored. A cycle is broken at the
/// package first reached in key order, so the result is deterministic.
pub(crate) fn dependencies_first<'a>(packages: &[&'a PackageDescriptor]) -> Vec<&'a PackageKey> {
    let by_lookup: BTreeMap<String, &'a PackageDescriptor> = packages
        .iter()
        .map(|package| (package.key().lookup_form(), *package))
        .collect();

    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(by_lookup.len());
    for package in by_lookup.values().copied() {
        visit(package, &by_lookup, &mut visited, &mut ordered);
    }
    ordered
}

fn visit<'a>(
    package: &'a PackageDescriptor,
    by_lookup: &BTreeMap<String, &'a PackageDescriptor>,
    visited: &mut BTreeSet<String>,
    ordered: &mut Vec<&'a PackageKey>,
) {
    if !visited.insert(package.key().lookup_form()) {
        return;
    }
    for dependency in package.dependencies() {
        if let Some(dependency) = by_lookup.get(&dependency.lookup_form()).copied() {
            visit(dependency, by_lookup, visited, ordered);
        }
    }
    ordered.push(package.key());
}
