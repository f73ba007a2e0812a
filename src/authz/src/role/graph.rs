//! Role inheritance graph walks
//!
//! Roles form a graph through their `inherits` edges. It must stay acyclic,
//! but every walk here carries a visited-set keyed by role id so that data
//! written around validation (legacy imports, concurrent admin edits) can
//! never cause non-termination.
//!
//! - [`InheritanceGraph::find_path`]: BFS used to reject cycle-creating edges
//! - [`InheritanceGraph::closure`]: BFS collecting a role and its ancestors
//! - [`InheritanceGraph::detect_cycles`]: three-colour DFS over all roles,
//!   for reporting corrupted data

use super::types::Role;
use crate::error::Result;
use crate::store::{RoleFilter, RoleStore};
use crate::types::RoleId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Walks over the role inheritance graph held by a [`RoleStore`]
pub struct InheritanceGraph<'a> {
    store: &'a dyn RoleStore,
}

impl<'a> InheritanceGraph<'a> {
    /// Create a graph view over a store
    pub fn new(store: &'a dyn RoleStore) -> Self {
        Self { store }
    }

    /// Shortest inheritance path from `from` to `target`, both included
    ///
    /// Follows edges of inactive roles too: cycle prevention is structural.
    /// Edges to missing roles are ignored.
    pub async fn find_path(&self, from: RoleId, target: RoleId) -> Result<Option<Vec<RoleId>>> {
        if from == target {
            return Ok(Some(vec![from]));
        }

        let mut visited: HashSet<RoleId> = HashSet::from([from]);
        let mut reached_from: HashMap<RoleId, RoleId> = HashMap::new();
        let mut frontier = vec![from];

        while !frontier.is_empty() {
            let roles = self.store.find(&RoleFilter::ids(frontier.iter().copied())).await?;
            let mut next = Vec::new();

            for role in roles {
                for parent in &role.inherits {
                    if !visited.insert(*parent) {
                        continue;
                    }
                    reached_from.insert(*parent, role.id);

                    if *parent == target {
                        return Ok(Some(Self::reconstruct(&reached_from, from, target)));
                    }
                    next.push(*parent);
                }
            }

            frontier = next;
        }

        Ok(None)
    }

    fn reconstruct(reached_from: &HashMap<RoleId, RoleId>, from: RoleId, target: RoleId) -> Vec<RoleId> {
        let mut path = vec![target];
        let mut current = target;

        while current != from {
            match reached_from.get(&current) {
                Some(previous) => {
                    path.push(*previous);
                    current = *previous;
                }
                None => break,
            }
        }

        path.reverse();
        path
    }

    /// `start` plus every role it transitively inherits from, in BFS order
    ///
    /// `start` is always included. With `active_only`, inactive ancestors
    /// are skipped and their edges are not followed.
    pub async fn closure(&self, start: &Role, active_only: bool) -> Result<Vec<Role>> {
        let mut visited: HashSet<RoleId> = HashSet::from([start.id]);
        let mut collected = vec![start.clone()];
        let mut frontier: Vec<RoleId> = start
            .inherits
            .iter()
            .copied()
            .filter(|id| visited.insert(*id))
            .collect();

        while !frontier.is_empty() {
            let roles = self.store.find(&RoleFilter::ids(frontier.iter().copied())).await?;
            let mut next = Vec::new();

            for role in roles {
                if active_only && !role.active {
                    continue;
                }
                for parent in &role.inherits {
                    if visited.insert(*parent) {
                        next.push(*parent);
                    }
                }
                collected.push(role);
            }

            frontier = next;
        }

        Ok(collected)
    }

    /// Render a path of role ids as `NAME -> NAME -> ...`
    pub async fn describe_path(&self, path: &[RoleId]) -> Result<String> {
        let roles = self.store.find(&RoleFilter::ids(path.iter().copied())).await?;
        let names: HashMap<RoleId, String> = roles.into_iter().map(|r| (r.id, r.name)).collect();

        Ok(path
            .iter()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
            .collect::<Vec<_>>()
            .join(" -> "))
    }

    /// Find inheritance cycles across every stored role
    ///
    /// Returns each cycle as a closed path (`[a, b, a]`). A healthy graph
    /// yields an empty list.
    pub async fn detect_cycles(&self) -> Result<Vec<Vec<RoleId>>> {
        let roles = self.store.find(&RoleFilter::default()).await?;
        let edges: BTreeMap<RoleId, Vec<RoleId>> = roles
            .into_iter()
            .map(|r| (r.id, r.inherits.into_iter().collect()))
            .collect();

        Ok(find_cycles(&edges))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// Three-colour DFS cycle search over an adjacency list
fn find_cycles(edges: &BTreeMap<RoleId, Vec<RoleId>>) -> Vec<Vec<RoleId>> {
    let mut colour: HashMap<RoleId, Colour> = edges.keys().map(|id| (*id, Colour::White)).collect();
    let mut cycles = Vec::new();

    for start in edges.keys() {
        if colour.get(start) == Some(&Colour::White) {
            let mut path = Vec::new();
            visit(*start, edges, &mut colour, &mut path, &mut cycles);
        }
    }

    cycles
}

fn visit(
    node: RoleId,
    edges: &BTreeMap<RoleId, Vec<RoleId>>,
    colour: &mut HashMap<RoleId, Colour>,
    path: &mut Vec<RoleId>,
    cycles: &mut Vec<Vec<RoleId>>,
) {
    match colour.get(&node) {
        Some(Colour::Grey) => {
            if let Some(start) = path.iter().position(|n| *n == node) {
                let mut cycle = path[start..].to_vec();
                cycle.push(node);
                cycles.push(cycle);
            }
            return;
        }
        Some(Colour::Black) | None => return,
        Some(Colour::White) => {}
    }

    colour.insert(node, Colour::Grey);
    path.push(node);

    if let Some(parents) = edges.get(&node) {
        for parent in parents {
            visit(*parent, edges, colour, path, cycles);
        }
    }

    colour.insert(node, Colour::Black);
    path.pop();
}
