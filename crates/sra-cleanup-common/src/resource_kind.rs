//! Resource type catalog and teardown ordering
//!
//! Each kind declares the kinds that must be attempted before it inside one
//! account. The per-account plan is resolved from those declarations rather
//! than from source order.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Types of resources the cleanup tool knows how to tear down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// CloudFormation stack (per region, asynchronous delete)
    Stack,
    /// Lambda function (per region)
    Function,
    /// IAM role (global, policies must be removed first)
    Role,
    /// SSM parameter (per region, batched deletes)
    Parameter,
    /// CloudWatch log group (per region)
    LogGroup,
    /// S3 bucket (global, must be emptied first)
    Bucket,
    /// CloudFormation stack set (global, master account only)
    StackSet,
}

/// Whether a resource type is listed per region or once per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Regional,
    Global,
}

/// Error resolving a teardown order
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The declared predecessors form a cycle among these nodes
    #[error("Dependency cycle among: {}", nodes.join(", "))]
    Cycle { nodes: Vec<String> },
}

impl ResourceKind {
    /// The full catalog, in declaration order
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Stack,
        ResourceKind::Function,
        ResourceKind::Role,
        ResourceKind::Parameter,
        ResourceKind::LogGroup,
        ResourceKind::Bucket,
        ResourceKind::StackSet,
    ];

    /// Short machine-friendly identifier
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Stack => "stack",
            ResourceKind::Function => "function",
            ResourceKind::Role => "role",
            ResourceKind::Parameter => "parameter",
            ResourceKind::LogGroup => "log_group",
            ResourceKind::Bucket => "bucket",
            ResourceKind::StackSet => "stack_set",
        }
    }

    /// Human-readable label used in reports
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Stack => "CloudFormation Stack",
            ResourceKind::Function => "Lambda Function",
            ResourceKind::Role => "IAM Role",
            ResourceKind::Parameter => "SSM Parameter",
            ResourceKind::LogGroup => "CloudWatch Log Group",
            ResourceKind::Bucket => "S3 Bucket",
            ResourceKind::StackSet => "CloudFormation StackSet",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            ResourceKind::Role | ResourceKind::Bucket | ResourceKind::StackSet => Scope::Global,
            _ => Scope::Regional,
        }
    }

    /// Stack sets are owned by the management account and only handled there
    pub fn is_master_only(self) -> bool {
        matches!(self, ResourceKind::StackSet)
    }

    /// Kinds whose teardown must have been attempted before this one.
    ///
    /// Compute and orchestration resources go first, bare storage and
    /// configuration primitives after, and stack sets last.
    pub fn predecessors(self) -> &'static [ResourceKind] {
        match self {
            ResourceKind::Stack => &[],
            ResourceKind::Function => &[ResourceKind::Stack],
            ResourceKind::Role => &[ResourceKind::Stack, ResourceKind::Function],
            ResourceKind::Parameter => &[ResourceKind::Role],
            ResourceKind::LogGroup => &[ResourceKind::Parameter],
            ResourceKind::Bucket => &[ResourceKind::LogGroup],
            ResourceKind::StackSet => &[ResourceKind::Bucket],
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolve the teardown order for a subset of kinds.
///
/// Predecessors outside the subset are ignored, so filtering out a kind
/// (e.g. stack sets outside the master account) keeps the rest ordered.
pub fn teardown_order(kinds: &[ResourceKind]) -> Result<Vec<ResourceKind>, OrderError> {
    resolve_order(kinds, |k| k.predecessors().to_vec())
}

/// Deterministic topological sort (Kahn's algorithm).
///
/// Among nodes that are ready at the same time, the smallest by `Ord` comes
/// first, which for `ResourceKind` is catalog order.
pub fn resolve_order<T, F>(nodes: &[T], predecessors: F) -> Result<Vec<T>, OrderError>
where
    T: Copy + Ord + std::fmt::Debug,
    F: Fn(T) -> Vec<T>,
{
    let members: BTreeSet<T> = nodes.iter().copied().collect();

    let mut pending: BTreeMap<T, usize> = BTreeMap::new();
    let mut successors: BTreeMap<T, Vec<T>> = BTreeMap::new();
    for &node in &members {
        let preds: Vec<T> = predecessors(node)
            .into_iter()
            .filter(|p| members.contains(p) && *p != node)
            .collect();
        pending.insert(node, preds.len());
        for pred in preds {
            successors.entry(pred).or_default().push(node);
        }
    }

    let mut ready: BTreeSet<T> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for next in successors.get(&node).into_iter().flatten() {
            if let Some(count) = pending.get_mut(next) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*next);
                }
            }
        }
    }

    if order.len() != members.len() {
        let nodes = pending
            .iter()
            .filter(|(node, count)| **count > 0 && !order.contains(*node))
            .map(|(node, _)| format!("{node:?}"))
            .collect();
        return Err(OrderError::Cycle { nodes });
    }

    Ok(order)
}
