// ABOUTME: Kahn's algorithm over service indices.
// ABOUTME: Ready nodes are taken lowest-index first, so order depends only on input order.

use std::collections::BTreeSet;

/// Order `count` nodes so every edge `(from, to)` has `from` before `to`.
///
/// Among nodes that are ready at the same time, the one declared first wins.
/// On a cycle, returns the nodes that could not be ordered.
pub fn topological_order(count: usize, edges: &[(usize, usize)]) -> Result<Vec<usize>, Vec<usize>> {
    let mut dependents = vec![Vec::new(); count];
    let mut in_degree = vec![0usize; count];
    for &(from, to) in edges {
        dependents[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == count {
        Ok(order)
    } else {
        Err((0..count).filter(|&i| in_degree[i] > 0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_nodes_keep_declaration_order() {
        assert_eq!(topological_order(3, &[]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn dependency_moves_node_later() {
        // 0 requires 1
        assert_eq!(topological_order(2, &[(1, 0)]).unwrap(), vec![1, 0]);
    }

    #[test]
    fn earliest_ready_node_wins_ties() {
        // 2 depends on 0; 1 is free. After 0, both 1 and 2 are ready.
        assert_eq!(topological_order(3, &[(0, 2)]).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn duplicate_edges_are_counted() {
        assert_eq!(topological_order(2, &[(0, 1), (0, 1)]).unwrap(), vec![0, 1]);
    }

    #[test]
    fn cycle_reports_unordered_nodes() {
        let remaining = topological_order(3, &[(0, 1), (1, 0)]).unwrap_err();
        assert_eq!(remaining, vec![0, 1]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        assert_eq!(topological_order(1, &[(0, 0)]).unwrap_err(), vec![0]);
    }
}
