//! Points-to sets and the solver's worklist.

use std::collections::{HashSet, VecDeque};

use super::element::{CSCallSite, CSMethod, ObjIdx, PointerIdx};
use crate::callgraph::Edge;
use crate::options::WorklistOrder;

/// A set of abstract objects; it only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointsToSet {
    objs: HashSet<ObjIdx>,
}

impl PointsToSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(obj: ObjIdx) -> Self {
        let mut pts = Self::new();
        pts.add(obj);
        pts
    }

    pub fn add(&mut self, obj: ObjIdx) -> bool {
        self.objs.insert(obj)
    }

    /// Adds every object of `other` and returns those that were new.
    pub fn add_all(&mut self, other: &PointsToSet) -> PointsToSet {
        let mut diff = PointsToSet::new();
        for &obj in &other.objs {
            if self.objs.insert(obj) {
                diff.objs.insert(obj);
            }
        }
        diff
    }

    pub fn contains(&self, obj: ObjIdx) -> bool {
        self.objs.contains(&obj)
    }

    pub fn iter(&self) -> impl Iterator<Item = ObjIdx> + '_ {
        self.objs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub fn is_subset(&self, other: &PointsToSet) -> bool {
        self.objs.is_subset(&other.objs)
    }

    pub fn to_sorted_vec(&self) -> Vec<ObjIdx> {
        let mut objs: Vec<_> = self.iter().collect();
        objs.sort();
        objs
    }
}

impl FromIterator<ObjIdx> for PointsToSet {
    fn from_iter<I: IntoIterator<Item = ObjIdx>>(iter: I) -> Self {
        Self {
            objs: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub(super) enum WorkEntry {
    /// Objects that should flow into a pointer.
    Pointer(PointerIdx, PointsToSet),
    /// A discovered call edge from `caller`.
    CallEdge(CSMethod, Edge<CSCallSite, CSMethod>),
}

pub(super) struct WorkList {
    entries: VecDeque<WorkEntry>,
    order: WorklistOrder,
}

impl WorkList {
    pub(super) fn new(order: WorklistOrder) -> Self {
        Self {
            entries: VecDeque::new(),
            order,
        }
    }

    pub(super) fn add_pointer(&mut self, pointer: PointerIdx, pts: PointsToSet) {
        self.entries.push_back(WorkEntry::Pointer(pointer, pts));
    }

    pub(super) fn add_call_edge(&mut self, caller: CSMethod, edge: Edge<CSCallSite, CSMethod>) {
        self.entries.push_back(WorkEntry::CallEdge(caller, edge));
    }

    pub(super) fn poll(&mut self) -> Option<WorkEntry> {
        match self.order {
            WorklistOrder::Fifo => self.entries.pop_front(),
            WorklistOrder::Lifo => self.entries.pop_back(),
        }
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
