//! Input key → declared name resolution.
//!
//! Two passes, both deterministic regardless of hash order:
//!
//! 1. Exact: every input key equal to a declared name claims it.
//! 2. Fold (skipped in strict mode): each declared name, in declaration
//!    order, takes the remaining input keys that equal it under ASCII case
//!    folding. Exactly one such key maps; more than one is a collision. A
//!    folded key that competes with an exact match is a collision too. The
//!    fold never replaces the exact key, and neither is mapped.

use std::collections::{BTreeSet, HashMap};

use crate::model::fold_name;

/// Two or more input keys competing for one declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Collision<'a> {
    pub declared: &'a str,
    /// Sorted.
    pub keys: Vec<&'a str>,
}

#[derive(Debug, Default)]
pub(crate) struct NameMatch<'a> {
    /// declared name → input key
    pub mapped: HashMap<&'a str, &'a str>,
    pub collisions: Vec<Collision<'a>>,
    /// Input keys nobody claimed, sorted.
    pub unclaimed: Vec<&'a str>,
    /// `(input key, declared name)` pairs mapped by folding.
    pub normalized: Vec<(&'a str, &'a str)>,
}

impl<'a> NameMatch<'a> {
    pub fn get(&self, declared: &str) -> Option<&'a str> {
        self.mapped.get(declared).copied()
    }
}

pub(crate) fn match_names<'a>(
    declared: &[&'a str],
    input: impl IntoIterator<Item = &'a str>,
    strict: bool,
) -> NameMatch<'a> {
    let keys: BTreeSet<&'a str> = input.into_iter().collect();
    let mut result = NameMatch::default();
    let mut claimed: BTreeSet<&'a str> = BTreeSet::new();

    for &name in declared {
        if keys.contains(name) && claimed.insert(name) {
            result.mapped.insert(name, name);
        }
    }

    if !strict {
        let mut by_fold: HashMap<String, Vec<&'a str>> = HashMap::new();
        for &k in keys.iter().filter(|k| !claimed.contains(*k)) {
            by_fold.entry(fold_name(k)).or_default().push(k);
        }

        for &name in declared {
            let Some(candidates) = by_fold.remove(&fold_name(name)) else {
                continue;
            };
            // `keys` is ordered, so `candidates` already is.
            claimed.extend(candidates.iter().copied());
            if let Some(exact) = result.mapped.get(name).copied() {
                result.mapped.remove(name);
                let mut all = candidates;
                all.push(exact);
                all.sort_unstable();
                result.collisions.push(Collision { declared: name, keys: all });
            } else if candidates.len() == 1 {
                result.mapped.insert(name, candidates[0]);
                result.normalized.push((candidates[0], name));
            } else {
                result.collisions.push(Collision { declared: name, keys: candidates });
            }
        }
    }

    result.unclaimed = keys.into_iter().filter(|k| !claimed.contains(k)).collect();
    result
}
