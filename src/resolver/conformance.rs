//! Assignability of one type to another across module boundaries.
//!
//! The walk follows base types and implemented interfaces with an explicit worklist. Type
//! references of other assemblies are resolved through the catalog; a reference that can not
//! be resolved still matches when it names the capability's declaring assembly and full name.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use crate::{
    catalog::{ModuleCatalog, ModuleDescriptor, TypeDescriptor},
    metadata::typedef::{ExternalType, TypeReference, TypeScope, TypeTarget},
};

/// Outcome of following one [`TypeReference`].
enum Step {
    Resolved(TypeDescriptor),
    Unresolved(ExternalType),
}

/// `true` if `candidate` is `capability`, derives from it or implements it. A reference to a
/// closed generic instantiation counts as its generic definition.
pub(crate) fn conforms(
    catalog: &ModuleCatalog,
    candidate: &TypeDescriptor,
    capability: &TypeDescriptor,
) -> bool {
    let mut queue = VecDeque::from([candidate.clone()]);
    let mut seen = HashSet::new();

    while let Some(current) = queue.pop_front() {
        if current == *capability {
            return true;
        }
        if !seen.insert(current.clone()) {
            continue;
        }

        let type_def = current.type_def();
        for reference in type_def.extends.iter().chain(type_def.interfaces.iter()) {
            match follow(catalog, current.module(), reference) {
                Some(Step::Resolved(next)) => queue.push_back(next),
                Some(Step::Unresolved(external)) => {
                    if names(&external, current.module(), capability) {
                        return true;
                    }
                }
                None => {}
            }
        }
    }

    false
}

fn follow(
    catalog: &ModuleCatalog,
    module: &Arc<ModuleDescriptor>,
    reference: &TypeReference,
) -> Option<Step> {
    match &reference.target {
        TypeTarget::Local(token) => TypeDescriptor::new(module, *token).map(Step::Resolved),
        TypeTarget::External(external) => Some(
            catalog
                .resolve_external(module, external)
                .map_or_else(|| Step::Unresolved(external.clone()), Step::Resolved),
        ),
    }
}

fn names(external: &ExternalType, from: &ModuleDescriptor, capability: &TypeDescriptor) -> bool {
    let declaring = capability.module().identity();
    let same_assembly = match &external.scope {
        TypeScope::Assembly(name) => declaring.same_name(name),
        TypeScope::CurrentModule => from.identity().same_name(&declaring.name),
    };

    same_assembly && external.full_name() == capability.full_name()
}
