//! Graph traversal over model instances.
//!
//! Every walk is depth-first, pre-order, visits each instance once (cycles
//! are cut by identity), and reads children after visiting the parent. No
//! instance lock is held while a visitor runs.

use crate::model::Model;
use std::{collections::HashSet, convert::Infallible};

// ============================================================================
// Scope
// ============================================================================

///
/// Scope
///
/// Submodels → the root plus plain models reachable without crossing an
///             entity. Entities met on the way are not entered.
/// Graph     → everything reachable, entities included.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    Submodels,
    Graph,
}

impl Scope {
    fn enters(self, model: &Model) -> bool {
        match self {
            Self::Submodels => !model.class().is_entity(),
            Self::Graph => true,
        }
    }
}

// ============================================================================
// Walks
// ============================================================================

/// Visit every instance in scope, stopping at the first error.
pub fn try_for_each<E>(
    root: &Model,
    scope: Scope,
    mut visit: impl FnMut(&Model) -> Result<(), E>,
) -> Result<(), E> {
    let mut seen = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(model) = stack.pop() {
        if !seen.insert(model.addr()) {
            continue;
        }

        visit(&model)?;

        let children = model.held_models();
        stack.extend(
            children
                .into_iter()
                .rev()
                .filter(|child| scope.enters(child) && !seen.contains(&child.addr())),
        );
    }

    Ok(())
}

pub fn for_each(root: &Model, scope: Scope, mut visit: impl FnMut(&Model)) {
    let result = try_for_each::<Infallible>(root, scope, |model| {
        visit(model);
        Ok(())
    });

    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// True as soon as `pred` holds for some instance in scope.
pub fn any(root: &Model, scope: Scope, mut pred: impl FnMut(&Model) -> bool) -> bool {
    try_for_each(root, scope, |model| if pred(model) { Err(()) } else { Ok(()) }).is_err()
}

/// Every instance in scope, root first.
#[must_use]
pub fn collect(root: &Model, scope: Scope) -> Vec<Model> {
    let mut out = Vec::new();
    for_each(root, scope, |model| out.push(model.clone()));

    out
}
