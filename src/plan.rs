//! Reconciliation planner
//!
//! Diffs the remote repository set against the local inventory and produces
//! the ordered list of actions for one run. Pure: no I/O, no logging.
//!
//! Ordering: every `Delete` comes first so a directory name is freed before
//! any relocation could reuse it, then one action per remote repository in
//! listing order. Names found in both partitions are left out of the action
//! list and reported as conflicts. Remote names that would escape their
//! partition directory are never planned and are reported as rejected.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::error::InconsistentLocalState;
use crate::github::RemoteRepository;
use crate::inventory::{self, LocalInventory, Partition};

/// One step of the reconciliation plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Clone {
        name: String,
        url: String,
        target: Partition,
    },
    Update {
        name: String,
        partition: Partition,
    },
    Move {
        name: String,
        from: Partition,
        to: Partition,
    },
    Delete {
        name: String,
        partition: Partition,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Clone,
    Update,
    Move,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Clone => "clone",
            ActionKind::Update => "update",
            ActionKind::Move => "move",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Clone { name, .. }
            | Action::Update { name, .. }
            | Action::Move { name, .. }
            | Action::Delete { name, .. } => name,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Clone { .. } => ActionKind::Clone,
            Action::Update { .. } => ActionKind::Update,
            Action::Move { .. } => ActionKind::Move,
            Action::Delete { .. } => ActionKind::Delete,
        }
    }

    /// Partition the repository ends up in (or is removed from, for deletes)
    pub fn partition(&self) -> Partition {
        match self {
            Action::Clone { target, .. } => *target,
            Action::Update { partition, .. } | Action::Delete { partition, .. } => *partition,
            Action::Move { to, .. } => *to,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Clone { name, target, .. } => write!(f, "clone {} into {}", name, target),
            Action::Update { name, partition } => write!(f, "update {} in {}", name, partition),
            Action::Move { name, from, to } => write!(f, "move {} from {} to {}", name, from, to),
            Action::Delete { name, partition } => write!(f, "delete {} from {}", name, partition),
        }
    }
}

/// Ordered actions for one run plus the names that could not be planned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub conflicts: Vec<InconsistentLocalState>,
    /// Remote names that are not usable as a directory name
    pub rejected: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.conflicts.is_empty() && self.rejected.is_empty()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }
}

/// Compute the reconciliation plan for `remote` against `local`
pub fn reconcile(remote: &[RemoteRepository], local: &LocalInventory) -> Plan {
    // First listing wins if the service ever reports a name twice
    let mut remote_by_name: HashMap<&str, &RemoteRepository> = HashMap::new();
    let mut remote_order = Vec::new();
    let mut rejected = Vec::new();
    for repo in remote {
        if remote_by_name.contains_key(repo.name.as_str()) {
            continue;
        }
        remote_by_name.insert(&repo.name, repo);
        if inventory::is_safe_name(&repo.name) {
            remote_order.push(repo);
        } else {
            rejected.push(repo.name.clone());
        }
    }

    let local_names: BTreeSet<&str> = local.all_names();
    let conflicted: HashSet<&str> = local_names
        .iter()
        .copied()
        .filter(|name| local.partitions_of(name).len() > 1)
        .collect();

    let mut plan = Plan {
        rejected,
        ..Plan::default()
    };

    for name in &local_names {
        if conflicted.contains(name) {
            plan.conflicts.push(InconsistentLocalState {
                name: name.to_string(),
            });
            continue;
        }
        if remote_by_name.contains_key(name) {
            continue;
        }
        for partition in local.partitions_of(name) {
            plan.actions.push(Action::Delete {
                name: name.to_string(),
                partition,
            });
        }
    }

    for repo in remote_order {
        if conflicted.contains(repo.name.as_str()) {
            continue;
        }

        let target = repo.target_partition();
        let action = match local.partitions_of(&repo.name).first() {
            None => Action::Clone {
                name: repo.name.clone(),
                url: repo.clone_url.clone(),
                target,
            },
            Some(&current) if current == target => Action::Update {
                name: repo.name.clone(),
                partition: current,
            },
            Some(&current) => Action::Move {
                name: repo.name.clone(),
                from: current,
                to: target,
            },
        };
        plan.actions.push(action);
    }

    plan
}
