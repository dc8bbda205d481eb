use std::collections::{BTreeSet, HashSet, VecDeque};
use crate::error::{Error, Result};
use crate::schema::{ForeignKeyEdge, SchemaRegistry};

/// Foreign-key graph over the declared tables.
///
/// Nodes are indexes into declaration order. `references[i]` holds the tables
/// `i` points at, `dependents[i]` the tables pointing at `i`.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    tables: Vec<String>,
    references: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    creation: Vec<usize>,
    rank: Vec<usize>,
}

impl DependencyGraph {
    pub fn from_registry(registry: &SchemaRegistry) -> Result<Self> {
        let tables: Vec<String> = registry.names().into_iter().map(String::from).collect();
        let mut references = vec![Vec::new(); tables.len()];
        let mut dependents = vec![Vec::new(); tables.len()];

        for (i, table) in registry.tables().iter().enumerate() {
            for referenced in table.referenced_tables() {
                let j = registry.position(referenced).ok_or_else(|| Error::UndeclaredReference {
                    table: table.name.clone(),
                    referenced: referenced.to_string(),
                })?;
                // self references never constrain drop order
                if i == j {
                    continue;
                }
                references[i].push(j);
                dependents[j].push(i);
            }
        }

        let creation = topological_order(&tables, &references, &dependents)?;
        let mut rank = vec![0; tables.len()];
        for (pos, &node) in creation.iter().enumerate() {
            rank[node] = pos;
        }

        Ok(Self {
            tables,
            references,
            dependents,
            creation,
            rank,
        })
    }

    fn index_of(&self, table: &str) -> Result<usize> {
        self.tables
            .iter()
            .position(|t| t.eq_ignore_ascii_case(table))
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    fn names(&self, nodes: impl IntoIterator<Item = usize>) -> Vec<String> {
        nodes.into_iter().map(|n| self.tables[n].clone()).collect()
    }

    /// Every table after all the tables it references; ties keep declaration order.
    pub fn creation_order(&self) -> Vec<String> {
        self.names(self.creation.iter().copied())
    }

    pub fn edges(&self) -> Vec<ForeignKeyEdge> {
        let mut edges = Vec::new();
        for (i, refs) in self.references.iter().enumerate() {
            for &j in refs {
                edges.push(ForeignKeyEdge {
                    dependent: self.tables[i].clone(),
                    referenced: self.tables[j].clone(),
                });
            }
        }
        edges
    }

    pub fn dependents_of(&self, table: &str) -> Result<Vec<String>> {
        let node = self.index_of(table)?;
        Ok(self.names(self.dependents[node].iter().copied()))
    }

    /// All tables that transitively reference `table`, deepest first.
    ///
    /// Reverse creation order restricted to the reachable subgraph, so no table
    /// is listed before a table that depends on it.
    pub fn cascade_for(&self, table: &str) -> Result<Vec<String>> {
        let start = self.index_of(table)?;

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut reached = Vec::new();

        while let Some(node) = queue.pop_front() {
            for &dependent in &self.dependents[node] {
                if seen.insert(dependent) {
                    reached.push(dependent);
                    queue.push_back(dependent);
                }
            }
        }

        reached.sort_by(|a, b| self.rank[*b].cmp(&self.rank[*a]));
        Ok(self.names(reached))
    }

    /// `cascade_for(table)` followed by the table itself.
    pub fn drop_order_for(&self, table: &str) -> Result<Vec<String>> {
        let node = self.index_of(table)?;
        let mut order = self.cascade_for(table)?;
        order.push(self.tables[node].clone());
        Ok(order)
    }
}

fn topological_order(
    tables: &[String],
    references: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Result<Vec<usize>> {
    let mut in_degree: Vec<usize> = references.iter().map(|r| r.len()).collect();
    let mut ready: BTreeSet<usize> = (0..tables.len()).filter(|&n| in_degree[n] == 0).collect();
    let mut order = Vec::with_capacity(tables.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &dependent in &dependents[node] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < tables.len() {
        let stuck = (0..tables.len())
            .filter(|n| !order.contains(n))
            .map(|n| tables[n].clone())
            .collect();
        return Err(Error::Cycle(stuck));
    }

    Ok(order)
}
