//! Textual dump of a method-level call graph, and comparison against a dump.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::info;

use super::CallGraph;
use crate::error::{Error, Result};
use crate::ir::{CallSiteIdx, Elements, MethodIdx};

/// Separator between a call site and its callees.
pub const CALL_EDGE_SEPARATOR: &str = " -> ";

type MethodCallGraph = CallGraph<CallSiteIdx, MethodIdx>;

/// Dumps the call graph to `output`, or to stdout when no file is given.
pub fn dump_call_graph(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    output: Option<&Path>,
) -> Result<()> {
    match output {
        Some(path) => {
            info!("Dumping call graph to {} ...", path.display());
            let io_error = |source| Error::Io {
                action: "write",
                path: path.to_owned(),
                source,
            };
            let file = File::create(path).map_err(io_error)?;
            let mut out = BufWriter::new(file);
            write_call_graph(call_graph, elements, &mut out).map_err(io_error)?;
            out.flush().map_err(io_error)
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_call_graph(call_graph, elements, &mut out).map_err(|source| Error::Io {
                action: "write",
                path: "<stdout>".into(),
                source,
            })
        }
    }
}

pub fn write_call_graph<W: Write>(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    out: &mut W,
) -> io::Result<()> {
    let methods = sorted_methods(call_graph, elements);
    writeln!(out, "#reachable methods: {}", call_graph.num_methods())?;
    writeln!(out, "---------- Reachable methods: ----------")?;
    for m in &methods {
        writeln!(out, "{}", elements.method_data(*m).signature)?;
    }
    writeln!(out)?;
    writeln!(out, "#call graph edges: {}", call_graph.num_edges())?;
    writeln!(out, "---------- Call graph edges: ----------")?;
    for m in &methods {
        for cs in sorted_call_sites(call_graph, elements, *m) {
            if call_graph.callees_of(cs).next().is_none() {
                continue;
            }
            writeln!(
                out,
                "{}{}{}",
                elements.call_site_string(cs),
                CALL_EDGE_SEPARATOR,
                callees_string(call_graph, elements, cs)
            )?;
        }
    }
    writeln!(out, "----------------------------------------")
}

/// Compares the call graph with a dump read from `input`.
pub fn compare_call_graph(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    input: &Path,
) -> Result<()> {
    info!("Comparing call graph with {} ...", input.display());
    let text = fs::read_to_string(input).map_err(|source| Error::Io {
        action: "read",
        path: input.to_owned(),
        source,
    })?;
    compare_call_graph_with(call_graph, elements, &text)
}

/// Compares the call graph with dump text.
/// All mismatches are collected into one [`Error::CallGraphMismatch`].
pub fn compare_call_graph_with(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    text: &str,
) -> Result<()> {
    let expected: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once(CALL_EDGE_SEPARATOR))
        .collect();
    let mut given = HashSet::new();
    let mut mismatches = Vec::new();
    for m in sorted_methods(call_graph, elements) {
        for cs in sorted_call_sites(call_graph, elements, m) {
            let call_site = elements.call_site_string(cs);
            let callees = callees_string(call_graph, elements, cs);
            let expected = expected.get(call_site.as_str()).copied();
            // dumps leave out call sites without callees
            let unresolved = call_graph.callees_of(cs).next().is_none();
            if expected != Some(callees.as_str()) && !(unresolved && expected.is_none()) {
                mismatches.push(format!(
                    "{}, expected: {}, given: {}",
                    call_site,
                    expected.unwrap_or("null"),
                    callees
                ));
            }
            given.insert(call_site);
        }
    }
    let mut missing: Vec<_> = expected
        .iter()
        .filter(|(call_site, _)| !given.contains(**call_site))
        .collect();
    missing.sort();
    for (call_site, callees) in missing {
        mismatches.push(format!(
            "{}, expected: {}, given: null",
            call_site, callees
        ));
    }
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(Error::CallGraphMismatch(mismatches))
    }
}

fn sorted_methods(call_graph: &MethodCallGraph, elements: &Elements<'_>) -> Vec<MethodIdx> {
    let mut methods: Vec<_> = call_graph.reachable_methods().collect();
    methods.sort_by(|a, b| {
        elements
            .method_data(*a)
            .signature
            .cmp(&elements.method_data(*b).signature)
    });
    methods
}

fn sorted_call_sites(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    method: MethodIdx,
) -> Vec<CallSiteIdx> {
    let mut call_sites = call_graph.call_sites_in(method).to_vec();
    call_sites.sort_by_key(|cs| elements.stmt(elements.call_site(*cs).call).index);
    call_sites
}

fn callees_string(
    call_graph: &MethodCallGraph,
    elements: &Elements<'_>,
    call_site: CallSiteIdx,
) -> String {
    let callees: BTreeSet<&str> = call_graph
        .callees_of(call_site)
        .map(|m| elements.method_data(m).signature.as_str())
        .collect();
    format!("[{}]", callees.into_iter().collect::<Vec<_>>().join(", "))
}
