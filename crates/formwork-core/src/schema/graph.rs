//! Dependency graph over a schema's derived properties.

use crate::expression::Expression;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Static dependency structure of one widget type's derived properties.
///
/// Built once per schema compile. Properties on a cycle are excluded from
/// the evaluation order; everything else is topologically sorted with
/// cyclic properties treated as fixed inputs.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    cyclic: IndexSet<String>,
    cycles: Vec<Vec<String>>,
    /// Input name -> derived properties that read it directly.
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn build(derived: &IndexMap<String, Expression>) -> Self {
        let names: Vec<&str> = derived.keys().map(String::as_str).collect();
        let position: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, name)| (*name, i)).collect();

        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); names.len()];
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (i, expression) in derived.values().enumerate() {
            for dep in expression.dependencies() {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(names[i].to_string());
                if let Some(&j) = position.get(dep.as_str()) {
                    edges[i].push(j);
                }
            }
        }

        let mut tarjan = Tarjan::new(&edges);
        for v in 0..names.len() {
            if tarjan.indices[v].is_none() {
                tarjan.strong_connect(v);
            }
        }

        let mut cyclic = IndexSet::new();
        let mut cycles = Vec::new();
        for component in tarjan.components {
            let self_loop = component.len() == 1 && edges[component[0]].contains(&component[0]);
            if component.len() > 1 || self_loop {
                let mut members: Vec<usize> = component;
                members.sort_unstable();
                for &m in &members {
                    cyclic.insert(names[m].to_string());
                }
                cycles.push(members.into_iter().map(|m| names[m].to_string()).collect());
            }
        }
        cycles.sort();

        // Post-order DFS over the acyclic remainder, in declaration order.
        let mut order = Vec::with_capacity(names.len());
        let mut visited = vec![false; names.len()];
        for v in 0..names.len() {
            visit(v, &edges, &names, &cyclic, &mut visited, &mut order);
        }

        Self {
            order,
            cyclic,
            cycles,
            dependents,
        }
    }

    /// Evaluation order of the non-cyclic derived properties.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn is_cyclic(&self, name: &str) -> bool {
        self.cyclic.contains(name)
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Each strongly connected cycle, members in declaration order.
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Derived properties that read `name` directly.
    pub fn direct_dependents(&self, name: &str) -> &[String] {
        self.dependents.get(name).map_or(&[], Vec::as_slice)
    }

    /// Derived properties that read `name` directly or transitively.
    pub fn affected_by(&self, name: &str) -> IndexSet<String> {
        let mut affected = IndexSet::new();
        let mut queue: Vec<&str> = vec![name];
        while let Some(current) = queue.pop() {
            for dependent in self.direct_dependents(current) {
                if affected.insert(dependent.clone()) {
                    queue.push(dependent);
                }
            }
        }
        affected
    }
}

fn visit(
    v: usize,
    edges: &[Vec<usize>],
    names: &[&str],
    cyclic: &IndexSet<String>,
    visited: &mut [bool],
    order: &mut Vec<String>,
) {
    if visited[v] || cyclic.contains(names[v]) {
        return;
    }
    visited[v] = true;
    for &w in &edges[v] {
        visit(w, edges, names, cyclic, visited, order);
    }
    order.push(names[v].to_string());
}

/// Tarjan's strongly connected components.
struct Tarjan<'a> {
    edges: &'a [Vec<usize>],
    next_index: usize,
    indices: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    stack: Vec<usize>,
    on_stack: Vec<bool>,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn new(edges: &'a [Vec<usize>]) -> Self {
        let n = edges.len();
        Self {
            edges,
            next_index: 0,
            indices: vec![None; n],
            lowlink: vec![0; n],
            stack: Vec::new(),
            on_stack: vec![false; n],
            components: Vec::new(),
        }
    }

    fn strong_connect(&mut self, v: usize) {
        let v_index = self.next_index;
        self.indices[v] = Some(v_index);
        self.lowlink[v] = v_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        let edges = self.edges;
        for &w in &edges[v] {
            match self.indices[w] {
                None => {
                    self.strong_connect(w);
                    self.lowlink[v] = self.lowlink[v].min(self.lowlink[w]);
                }
                Some(w_index) if self.on_stack[w] => {
                    self.lowlink[v] = self.lowlink[v].min(w_index);
                }
                Some(_) => {}
            }
        }

        if self.lowlink[v] == v_index {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}
