//! Pruning and narrowing of raw errors
//!
//! A failing document usually produces many more raw errors than a person
//! wants to read. An `anyOf` with five branches reports every branch, and
//! a wrong value deep in a tree also fails every combinator above it.
//! These passes keep the errors closest to the actual mistake.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use yamlmeta_annotated::PathSegment;

use crate::text::join_alternatives;
use crate::validator::{ErrorParams, RawError};

/// Keyword of an invalid-key error once it is attached to the key itself.
pub(crate) const INVALID_PROPERTY: &str = "_custom_invalidProperty";

fn is_proper_prefix(prefix: &[PathSegment], path: &[PathSegment]) -> bool {
    prefix.len() < path.len() && path.starts_with(prefix)
}

fn has_segment(path: &[PathSegment], keyword: &str) -> bool {
    path.iter()
        .any(|s| matches!(s, PathSegment::Key(k) if k == keyword))
}

/// Reorder errors so that errors sharing an instance path are adjacent,
/// groups in order of first appearance.
pub(crate) fn group_by_instance_path(errors: Vec<RawError<'_>>) -> Vec<RawError<'_>> {
    let mut groups: IndexMap<Vec<PathSegment>, Vec<RawError<'_>>> = IndexMap::new();
    for error in errors {
        groups
            .entry(error.instance_path.clone())
            .or_default()
            .push(error);
    }
    groups.into_values().flatten().collect()
}

/// Whether two errors come from different branches of the same `anyOf`.
fn competing(a: &RawError<'_>, b: &RawError<'_>) -> bool {
    for (x, y) in a.branches.iter().zip(&b.branches) {
        if x.site != y.site {
            return false;
        }
        if x.branch != y.branch {
            return true;
        }
    }
    false
}

/// Drop errors whose instance path is a proper prefix of another error's
/// instance path: the deeper error is the more specific one.
///
/// Errors of competing `anyOf` branches are alternatives rather than
/// containers of one another; narrowing decides between them.
pub(crate) fn prune_prefixes(errors: Vec<RawError<'_>>) -> Vec<RawError<'_>> {
    let keep: Vec<bool> = errors
        .iter()
        .map(|e| {
            !errors.iter().any(|other| {
                is_proper_prefix(&e.instance_path, &other.instance_path) && !competing(e, other)
            })
        })
        .collect();
    errors
        .into_iter()
        .zip(keep)
        .filter_map(|(e, keep)| keep.then_some(e))
        .collect()
}

/// Attach invalid-key errors to the offending key: the key joins the
/// instance path. Returns whether anything was rewritten.
pub(crate) fn rewrite_invalid_properties(errors: &mut [RawError<'_>]) -> bool {
    let mut changed = false;
    for error in errors.iter_mut() {
        let ErrorParams::InvalidKey { key } = &error.params else {
            continue;
        };
        if error.keyword == INVALID_PROPERTY {
            continue;
        }
        let key = key.clone();
        error.message = format!("property {} not allowed in object", key);
        error.instance_path.push(PathSegment::Key(key));
        error.schema_path.push(PathSegment::from(INVALID_PROPERTY));
        error.keyword = INVALID_PROPERTY.to_string();
        changed = true;
    }
    changed
}

/// How much an error looks like the real mistake. Lower is better.
fn error_quality(error: &RawError<'_>) -> f64 {
    if let Some(importance) = error.schema.error_importance() {
        return importance;
    }
    if has_segment(&error.schema_path, "propertyNames") {
        return 10.0;
    }
    if error.keyword == "required" {
        return 0.0;
    }
    let parent = error
        .schema_path
        .len()
        .checked_sub(2)
        .and_then(|i| error.schema_path.get(i));
    if error.keyword == "type" && matches!(parent, Some(PathSegment::Key(k)) if k == "null") {
        return 10.0;
    }
    1.0
}

fn invalid_key<'e>(error: &'e RawError<'_>) -> Option<&'e str> {
    match &error.params {
        ErrorParams::InvalidKey { key } => Some(key.as_str()),
        _ => None,
    }
}

enum Choice<'a> {
    /// Keep these errors of the site, drop the rest.
    Keep(Vec<usize>),
    /// Replace every error of the site by one error.
    Merge(RawError<'a>),
}

/// Decide what survives of one failing `anyOf`. `groups` holds the indices
/// into `errors` of each failing branch, in branch order.
fn choose<'a>(errors: &[RawError<'a>], groups: &[Vec<usize>], depth: usize) -> Choice<'a> {
    let all = |pred: &dyn Fn(&RawError<'a>) -> bool| {
        groups.iter().flatten().all(|&i| pred(&errors[i]))
    };

    // The same key is rejected by every branch: report it once.
    if all(&|e| e.keyword == INVALID_PROPERTY) {
        let mut common: Option<BTreeSet<&str>> = None;
        for group in groups {
            let keys: BTreeSet<&str> = group
                .iter()
                .filter_map(|&i| invalid_key(&errors[i]))
                .collect();
            common = Some(match common {
                None => keys,
                Some(previous) => previous.intersection(&keys).copied().collect(),
            });
        }
        if let Some(common) = common
            && !common.is_empty()
        {
            return Choice::Keep(
                groups[0]
                    .iter()
                    .copied()
                    .filter(|&i| invalid_key(&errors[i]).is_some_and(|k| common.contains(k)))
                    .collect(),
            );
        }
    }

    // Every branch wants a different required property on the same object.
    let first = &errors[groups[0][0]];
    if all(&|e| e.keyword == "required" && e.instance_path == first.instance_path) {
        let mut alternatives: Vec<String> = Vec::new();
        let mut properties: Vec<String> = Vec::new();
        for group in groups {
            let mut missing: Vec<String> = Vec::new();
            for &i in group {
                if let ErrorParams::MissingProperty { properties: p } = &errors[i].params {
                    missing.extend(p.iter().cloned());
                }
            }
            let alternative = missing.join(" and ");
            if !alternatives.contains(&alternative) {
                alternatives.push(alternative);
            }
            for property in missing {
                if !properties.contains(&property) {
                    properties.push(property);
                }
            }
        }
        let mut merged = first.clone();
        merged.message = format!(
            "object is missing required property {}",
            join_alternatives(&alternatives)
        );
        merged.params = ErrorParams::MissingProperty { properties };
        merged.branches.truncate(depth);
        return Choice::Merge(merged);
    }

    // A missing property explains a bad key name better than the key does.
    let leads_with = |pred: &dyn Fn(&RawError<'a>) -> bool| {
        groups.iter().position(|g| pred(&errors[g[0]]))
    };
    if let Some(required) = leads_with(&|e| e.keyword == "required")
        && leads_with(&|e| has_segment(&e.schema_path, "propertyNames")).is_some()
    {
        return Choice::Keep(groups[required].clone());
    }

    // Otherwise the branch whose worst error is best, then the one whose
    // errors cover the least text.
    let score = |group: &Vec<usize>| {
        let quality = group
            .iter()
            .map(|&i| error_quality(&errors[i]))
            .fold(f64::NEG_INFINITY, f64::max);
        let span: usize = group
            .iter()
            .map(|&i| errors[i].violating.span().len())
            .sum();
        (quality, span)
    };
    let mut best = 0;
    let mut best_score = score(&groups[0]);
    for (index, group) in groups.iter().enumerate().skip(1) {
        let candidate = score(group);
        let better = match candidate.0.total_cmp(&best_score.0) {
            Ordering::Less => true,
            Ordering::Equal => candidate.1 < best_score.1,
            Ordering::Greater => false,
        };
        if better {
            best = index;
            best_score = candidate;
        }
    }
    Choice::Keep(groups[best].clone())
}

/// Narrow every `anyOf` whose errors come from two or more branches down
/// to one branch (or one merged error). Inner combinators go first.
///
/// Returns whether any site was narrowed.
pub(crate) fn narrow_any_of(errors: Vec<RawError<'_>>) -> (Vec<RawError<'_>>, bool) {
    let mut sites: Vec<(usize, usize)> = errors
        .iter()
        .flat_map(|e| e.branches.iter().enumerate().map(|(depth, m)| (depth, m.site)))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    sites.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut errors = errors;
    let mut changed = false;
    for (depth, site) in sites {
        let mut by_branch: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, error) in errors.iter().enumerate() {
            if let Some(mark) = error.branches.get(depth)
                && mark.site == site
            {
                by_branch.entry(mark.branch).or_default().push(index);
            }
        }
        if by_branch.len() < 2 {
            continue;
        }
        let groups: Vec<Vec<usize>> = by_branch.into_values().collect();
        let under: HashSet<usize> = groups.iter().flatten().copied().collect();
        tracing::trace!(site, branches = groups.len(), "Narrowing anyOf errors");
        let (keep, mut merged): (HashSet<usize>, Option<RawError<'_>>) =
            match choose(&errors, &groups, depth) {
                Choice::Keep(indices) => (indices.into_iter().collect(), None),
                Choice::Merge(error) => (HashSet::new(), Some(error)),
            };
        let mut next = Vec::with_capacity(errors.len());
        for (index, error) in errors.into_iter().enumerate() {
            if !under.contains(&index) || keep.contains(&index) {
                next.push(error);
            } else if let Some(error) = merged.take() {
                next.push(error);
            }
        }
        errors = next;
        changed = true;
    }
    (errors, changed)
}

/// Drop `anyOf`/`allOf` branch indices from a schema path.
fn normalize_schema_path(path: &[PathSegment]) -> Vec<&PathSegment> {
    let mut out = Vec::with_capacity(path.len());
    let mut after_combinator = false;
    for segment in path {
        if after_combinator && matches!(segment, PathSegment::Index(_)) {
            after_combinator = false;
            continue;
        }
        after_combinator = matches!(segment, PathSegment::Key(k) if k == "anyOf" || k == "allOf");
        out.push(segment);
    }
    out
}

/// Within each instance path, keep the errors with the most general
/// normalized schema paths and drop duplicates of the same complaint about
/// the same node.
pub(crate) fn keep_most_general(errors: Vec<RawError<'_>>) -> Vec<RawError<'_>> {
    let normalized: Vec<Vec<&PathSegment>> = errors
        .iter()
        .map(|e| normalize_schema_path(&e.schema_path))
        .collect();
    let mut keep = vec![true; errors.len()];
    let mut seen = HashSet::new();
    for (i, error) in errors.iter().enumerate() {
        let shadowed = errors.iter().enumerate().any(|(j, other)| {
            j != i
                && other.instance_path == error.instance_path
                && normalized[j].len() < normalized[i].len()
                && normalized[i].starts_with(&normalized[j])
        });
        let duplicate = !seen.insert((
            error.instance_path.clone(),
            normalized[i].clone(),
            error.message.clone(),
            error.violating.start,
        ));
        keep[i] = !shadowed && !duplicate;
    }
    errors
        .into_iter()
        .zip(keep)
        .filter_map(|(e, keep)| keep.then_some(e))
        .collect()
}
