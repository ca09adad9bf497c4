//! The dependency graph between site objects.
//!
//! An edge `dependency -> dependent` means "if `dependency` becomes outdated
//! in one of the edge's [`Props`], `dependent` is outdated too". Edges are
//! recorded with [`DependencyStore::record_dependency`], which takes the
//! dependent first.
//!
//! A single *unknown* vertex stands in for every object that existed when the
//! graph was persisted but is gone now. An edge from the unknown vertex always
//! causes outdatedness.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;

use kiln_model::{Dependency, Props, Reference};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::store::StoreFile;

const STORE_NAME: &str = "dependencies";
const STORE_VERSION: u32 = 1;

/// Persisted form of the graph.
///
/// Edge endpoints index into `vertices`; a `None` source is the unknown vertex.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedGraph {
    vertices: Vec<Reference>,
    edges: Vec<(Option<usize>, usize, Props)>,
}

/// A directed graph of "causes outdatedness of" edges with per-edge props.
#[derive(Debug)]
pub struct DependencyStore {
    graph: DiGraph<Option<Reference>, Props>,
    nodes: HashMap<Reference, NodeIndex>,
    unknown: Option<NodeIndex>,
    new_objects: Vec<Reference>,
    causing_memo: RefCell<HashMap<Reference, Vec<Option<Reference>>>>,
    outdated_memo: RefCell<HashMap<Reference, Vec<Reference>>>,
}

impl DependencyStore {
    /// Creates an empty graph with one vertex per object.
    pub fn new(objects: &[Reference]) -> Self {
        let mut store = Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            unknown: None,
            new_objects: Vec::new(),
            causing_memo: RefCell::new(HashMap::new()),
            outdated_memo: RefCell::new(HashMap::new()),
        };
        for object in objects {
            store.node_for(object);
        }
        store
    }

    /// Loads the graph persisted in `dir` and reconciles it with the current objects.
    ///
    /// See [`from_persisted`](Self::from_persisted) for the reconciliation rules.
    /// A missing or unreadable store gives an empty graph with no new objects.
    pub fn load(dir: &Path, objects: &[Reference], items: &[Reference]) -> Self {
        let data: Option<PersistedGraph> = StoreFile::new(dir, STORE_NAME, STORE_VERSION).load();
        match data {
            Some(data) => Self::from_persisted(objects, items, data),
            None => Self::new(objects),
        }
    }

    /// Rebuilds the graph from its persisted form.
    ///
    /// - previous vertices absent from `objects` become the unknown vertex;
    /// - edges whose dependent is gone are dropped;
    /// - every object absent from the previous vertices is *new*, and gets an
    ///   edge to every item in `items` with all props, so that a new object
    ///   an item might have matched by pattern makes that item outdated.
    fn from_persisted(objects: &[Reference], items: &[Reference], data: PersistedGraph) -> Self {
        let mut store = Self::new(objects);
        let current: HashSet<&Reference> = objects.iter().collect();

        let previous: Vec<NodeIndex> = data
            .vertices
            .iter()
            .map(|r| {
                if current.contains(r) {
                    store.node_for(r)
                } else {
                    store.unknown_node()
                }
            })
            .collect();

        for (from, to, props) in data.edges {
            let Some(&to_node) = previous.get(to) else {
                continue;
            };
            if Some(to_node) == store.unknown {
                continue;
            }
            let from_node = match from.and_then(|i| previous.get(i).copied()) {
                Some(node) => node,
                None => store.unknown_node(),
            };
            store.add_edge(from_node, to_node, props);
        }

        let known: HashSet<&Reference> = data.vertices.iter().collect();
        store.new_objects = objects
            .iter()
            .filter(|r| !known.contains(r))
            .cloned()
            .collect();
        for new_object in store.new_objects.clone() {
            let from = store.node_for(&new_object);
            for item in items {
                let to = store.node_for(item);
                store.add_edge(from, to, Props::all());
            }
        }
        if !store.new_objects.is_empty() {
            debug!(count = store.new_objects.len(), "new objects since last run");
        }
        store
    }

    /// Saves the graph into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        StoreFile::new(dir, STORE_NAME, STORE_VERSION).save(&self.to_persisted())
    }

    fn to_persisted(&self) -> PersistedGraph {
        let mut vertices = Vec::new();
        let mut positions = HashMap::new();
        for node in self.graph.node_indices() {
            if let Some(reference) = &self.graph[node] {
                positions.insert(node, vertices.len());
                vertices.push(reference.clone());
            }
        }
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (from, to) = self.graph.edge_endpoints(e)?;
                let to = *positions.get(&to)?;
                Some((positions.get(&from).copied(), to, self.graph[e]))
            })
            .collect();
        PersistedGraph { vertices, edges }
    }

    /// Records that `dependent` depends on the `props` aspects of `dependency`.
    ///
    /// Recording the same pair again merges the props. Self-dependencies are ignored.
    pub fn record_dependency(&mut self, dependent: &Reference, dependency: &Reference, props: Props) {
        if dependent == dependency || props.is_empty() {
            return;
        }
        let from = self.node_for(dependency);
        let to = self.node_for(dependent);
        self.add_edge(from, to, props);
    }

    /// Drops every dependency of `object`.
    ///
    /// Called before recompiling an item, so dependencies it no longer has do
    /// not survive into the next run.
    pub fn forget_dependencies_for(&mut self, object: &Reference) {
        let Some(&node) = self.nodes.get(object) else {
            return;
        };
        self.graph
            .retain_edges(|g, e| g.edge_endpoints(e).map_or(true, |(_, to)| to != node));
        self.invalidate();
    }

    /// Direct dependencies of `object`, with their props.
    pub fn dependencies_causing_outdatedness_of(&self, object: &Reference) -> Vec<Dependency> {
        let Some(&node) = self.nodes.get(object) else {
            return Vec::new();
        };
        let mut deps: Vec<Dependency> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| Dependency::new(self.graph[e.source()].clone(), object.clone(), *e.weight()))
            .collect();
        deps.sort_by(|a, b| a.from.cmp(&b.from));
        deps
    }

    /// Objects `object` depends on directly. `None` is a removed object.
    pub fn objects_causing_outdatedness_of(&self, object: &Reference) -> Vec<Option<Reference>> {
        self.dependencies_causing_outdatedness_of(object)
            .into_iter()
            .map(|d| d.from)
            .collect()
    }

    /// Objects that depend directly on `object`.
    pub fn objects_outdated_due_to(&self, object: &Reference) -> Vec<Reference> {
        let Some(&node) = self.nodes.get(object) else {
            return Vec::new();
        };
        let mut out: Vec<Reference> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .filter_map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every object `object` depends on, directly or transitively.
    pub fn all_objects_causing_outdatedness_of(&self, object: &Reference) -> Vec<Option<Reference>> {
        if let Some(hit) = self.causing_memo.borrow().get(object) {
            return hit.clone();
        }
        let result: Vec<Option<Reference>> = self
            .reachable(object, Direction::Incoming)
            .into_iter()
            .map(|n| self.graph[n].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.causing_memo
            .borrow_mut()
            .insert(object.clone(), result.clone());
        result
    }

    /// Every object depending on `object`, directly or transitively.
    pub fn all_objects_outdated_due_to(&self, object: &Reference) -> Vec<Reference> {
        if let Some(hit) = self.outdated_memo.borrow().get(object) {
            return hit.clone();
        }
        let result: Vec<Reference> = self
            .reachable(object, Direction::Outgoing)
            .into_iter()
            .filter_map(|n| self.graph[n].clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        self.outdated_memo
            .borrow_mut()
            .insert(object.clone(), result.clone());
        result
    }

    /// Objects present now but absent from the persisted graph.
    pub fn new_objects(&self) -> &[Reference] {
        &self.new_objects
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn reachable(&self, object: &Reference, direction: Direction) -> Vec<NodeIndex> {
        let Some(&start) = self.nodes.get(object) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, direction) {
                if seen.insert(next) {
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }
        out
    }

    fn node_for(&mut self, reference: &Reference) -> NodeIndex {
        if let Some(&node) = self.nodes.get(reference) {
            return node;
        }
        let node = self.graph.add_node(Some(reference.clone()));
        self.nodes.insert(reference.clone(), node);
        node
    }

    fn unknown_node(&mut self) -> NodeIndex {
        match self.unknown {
            Some(node) => node,
            None => {
                let node = self.graph.add_node(None);
                self.unknown = Some(node);
                node
            }
        }
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, props: Props) {
        if from == to {
            return;
        }
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                let merged = self.graph[edge].merge(props);
                self.graph[edge] = merged;
            }
            None => {
                self.graph.add_edge(from, to, props);
            }
        }
        self.invalidate();
    }

    fn invalidate(&self) {
        self.causing_memo.borrow_mut().clear();
        self.outdated_memo.borrow_mut().clear();
    }
}
