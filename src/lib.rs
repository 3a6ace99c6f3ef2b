//! Whole-program points-to analysis with on-the-fly call-graph construction
//! for Java-like object-oriented programs.
//!
//! A [`frontend::Frontend`] supplies classes, methods and Jimple-like bodies.
//! [`ir::Elements`] turns them into a canonical IR on demand, and
//! [`pointer_analysis::Solver`] computes points-to sets, reachable methods
//! and call edges together until nothing changes.

pub mod callgraph;
pub mod error;
pub mod frontend;
pub mod ir;
pub mod options;
pub mod plugin;
pub mod pointer_analysis;
mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use options::AnalysisOptions;
pub use pointer_analysis::{AnalysisState, Solver};

use log::info;

use crate::callgraph::{compare_call_graph, dump_call_graph};
use crate::frontend::Frontend;
use crate::ir::Elements;
use crate::options::DumpTarget;
use crate::plugin::Plugin;

/// Runs the analysis over `frontend` without plugins.
pub fn analyze<'p>(frontend: &'p dyn Frontend, options: &AnalysisOptions) -> Result<AnalysisState<'p>> {
    analyze_with(Elements::new(frontend), options, Vec::new())
}

/// Runs the analysis with `plugins`, which may have been registered against `elements`.
///
/// After solving, the call graph is dumped and compared as `options` ask.
pub fn analyze_with<'p>(
    mut elements: Elements<'p>,
    options: &AnalysisOptions,
    plugins: Vec<Box<dyn Plugin>>,
) -> Result<AnalysisState<'p>> {
    let mut entries = Vec::new();
    for signature in &options.entries {
        match elements.resolve_method(signature)? {
            Some(method) => entries.push(method),
            None => return Err(Error::UnknownEntry(signature.clone())),
        }
    }
    info!(
        "Pointer analysis from {} entries ({:?} worklist, {:?} contexts)",
        entries.len(),
        options.worklist,
        options.context
    );
    let mut solver = Solver::new(
        elements,
        entries,
        options.context.selector(),
        options.worklist,
        plugins,
    );
    solver.solve()?;
    let state = solver.into_state();
    if options.dump_call_graph.is_some() || options.compare_call_graph.is_some() {
        let call_graph = state.method_call_graph();
        match &options.dump_call_graph {
            Some(DumpTarget::Stdout) => dump_call_graph(&call_graph, state.elements(), None)?,
            Some(DumpTarget::File(path)) => {
                dump_call_graph(&call_graph, state.elements(), Some(path))?
            }
            None => {}
        }
        if let Some(path) = &options.compare_call_graph {
            compare_call_graph(&call_graph, state.elements(), path)?;
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{compare_call_graph_with, write_call_graph};
    use std::fs;
    use test_log::test;

    const FOO_CALL: &str =
        "<Main: void main()>[4]r = invokevirtual a.<A: java.lang.Object foo()>() -> ";
    const FOO_CALLEES: &str = "[<A: java.lang.Object foo()>, <B: java.lang.Object foo()>]";

    fn dump(state: &AnalysisState<'_>) -> String {
        let mut out = Vec::new();
        write_call_graph(&state.method_call_graph(), state.elements(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dump_format() {
        let program = testing::zoo();
        let state = analyze(&program, &AnalysisOptions::new(vec![testing::MAIN])).unwrap();
        let text = dump(&state);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#reachable methods: 6");
        assert_eq!(lines[1], "---------- Reachable methods: ----------");
        assert_eq!(lines[2], "<A: java.lang.Object foo()>");
        assert!(text.contains("#call graph edges: 5\n"));
        assert!(text.contains(&format!("{}{}\n", FOO_CALL, FOO_CALLEES)));
        assert!(text.contains(
            "<Main: void main()>[8]s = invokestatic <Main: java.lang.Object id(java.lang.Object)>(o) -> [<Main: java.lang.Object id(java.lang.Object)>]\n"
        ));
        assert_eq!(lines.last(), Some(&"----------------------------------------"));
    }

    #[test]
    fn test_compare_round_trip() {
        let program = testing::zoo();
        let state = analyze(&program, &AnalysisOptions::new(vec![testing::MAIN])).unwrap();
        let text = dump(&state);
        let call_graph = state.method_call_graph();
        compare_call_graph_with(&call_graph, state.elements(), &text).unwrap();

        let changed = text.replace(
            &format!("{}{}", FOO_CALL, FOO_CALLEES),
            &format!("{}[<A: java.lang.Object foo()>]", FOO_CALL),
        ) + "<X: void y()>[0]invokestatic <X: void z()>() -> [<X: void z()>]\n";
        match compare_call_graph_with(&call_graph, state.elements(), &changed) {
            Err(Error::CallGraphMismatch(mismatches)) => {
                assert_eq!(mismatches.len(), 2);
                assert_eq!(
                    mismatches[0],
                    format!(
                        "{}, expected: [<A: java.lang.Object foo()>], given: {}",
                        FOO_CALL.trim_end_matches(" -> "),
                        FOO_CALLEES
                    )
                );
                assert_eq!(
                    mismatches[1],
                    "<X: void y()>[0]invokestatic <X: void z()>(), expected: [<X: void z()>], given: null"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dump_then_compare_files() {
        let program = testing::zoo();
        let path = std::env::temp_dir().join(format!("pta-engine-cg-{}.txt", std::process::id()));
        let mut options = AnalysisOptions::new(vec![testing::MAIN]);
        options.dump_call_graph = Some(DumpTarget::File(path.clone()));
        analyze(&program, &options).unwrap();

        let mut options = AnalysisOptions::new(vec![testing::MAIN]);
        options.compare_call_graph = Some(path.clone());
        analyze(&program, &options).unwrap();

        // a different entry leads to a different call graph
        let mut options = AnalysisOptions::new(vec!["<Main: void twice()>"]);
        options.compare_call_graph = Some(path.clone());
        let err = analyze(&program, &options).err().unwrap();
        assert!(matches!(err, Error::CallGraphMismatch(_)));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_compare_file() {
        let program = testing::zoo();
        let mut options = AnalysisOptions::new(vec![testing::MAIN]);
        options.compare_call_graph = Some("/nonexistent/pta-engine/cg.txt".into());
        let err = analyze(&program, &options).err().unwrap();
        assert!(matches!(err, Error::Io { action: "read", .. }));
    }

    #[test]
    fn test_unknown_entry() {
        let program = testing::zoo();
        let err = analyze(&program, &AnalysisOptions::new(vec!["<Main: void nope()>"])).err().unwrap();
        assert!(matches!(err, Error::UnknownEntry(ref entry) if entry == "<Main: void nope()>"));
        let err = analyze(&program, &AnalysisOptions::new(vec!["Main.main"])).err().unwrap();
        assert!(matches!(err, Error::MalformedSignature(_)));
    }
}
