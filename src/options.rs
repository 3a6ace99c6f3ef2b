//! # options
//!
//! Analysis configuration, read from `PTA_*` environment variables by the
//! driver or assembled directly by library users.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::pointer_analysis::context::{
    ContextInsensitive, ContextSelector, KCallSite, KObject,
};

pub const ENTRIES_VAR: &str = "PTA_ENTRIES";
pub const WORKLIST_VAR: &str = "PTA_WORKLIST";
pub const CONTEXT_VAR: &str = "PTA_CONTEXT";
pub const DUMP_CALL_GRAPH_VAR: &str = "PTA_DUMP_CALL_GRAPH";
pub const COMPARE_CALL_GRAPH_VAR: &str = "PTA_COMPARE_CALL_GRAPH";

static CONTEXT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:(ci)|([1-9][0-9]*)-(call|obj))$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorklistOrder {
    Fifo,
    Lifo,
}

impl Default for WorklistOrder {
    fn default() -> Self {
        WorklistOrder::Fifo
    }
}

impl FromStr for WorklistOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fifo" => Ok(WorklistOrder::Fifo),
            "lifo" => Ok(WorklistOrder::Lifo),
            _ => Err(Error::InvalidOption {
                option: WORKLIST_VAR,
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPolicy {
    Insensitive,
    CallSite(usize),
    Object(usize),
}

impl Default for ContextPolicy {
    fn default() -> Self {
        ContextPolicy::Insensitive
    }
}

impl ContextPolicy {
    pub fn selector(self) -> Box<dyn ContextSelector> {
        match self {
            ContextPolicy::Insensitive => Box::new(ContextInsensitive),
            ContextPolicy::CallSite(k) => Box::new(KCallSite { k }),
            ContextPolicy::Object(k) => Box::new(KObject { k }),
        }
    }
}

impl FromStr for ContextPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidOption {
            option: CONTEXT_VAR,
            value: s.to_owned(),
        };
        let caps = CONTEXT_REGEX.captures(s).ok_or_else(invalid)?;
        if caps.get(1).is_some() {
            return Ok(ContextPolicy::Insensitive);
        }
        let k = caps[2].parse::<usize>().map_err(|_| invalid())?;
        match &caps[3] {
            "call" => Ok(ContextPolicy::CallSite(k)),
            _ => Ok(ContextPolicy::Object(k)),
        }
    }
}

/// Where the call graph is dumped after solving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Full signatures of the entry methods.
    pub entries: Vec<String>,
    pub worklist: WorklistOrder,
    pub context: ContextPolicy,
    pub dump_call_graph: Option<DumpTarget>,
    pub compare_call_graph: Option<PathBuf>,
}

impl AnalysisOptions {
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = S>) -> Self {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the options through `lookup`; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(entries) = lookup(ENTRIES_VAR) {
            options.entries = entries
                .split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(order) = lookup(WORKLIST_VAR) {
            options.worklist = order.trim().parse()?;
        }
        if let Some(context) = lookup(CONTEXT_VAR) {
            options.context = context.trim().parse()?;
        }
        match lookup(DUMP_CALL_GRAPH_VAR).as_deref().map(str::trim) {
            None | Some("") => {}
            Some("-") => options.dump_call_graph = Some(DumpTarget::Stdout),
            Some(path) => options.dump_call_graph = Some(DumpTarget::File(path.into())),
        }
        match lookup(COMPARE_CALL_GRAPH_VAR).as_deref().map(str::trim) {
            None | Some("") => {}
            Some(path) => options.compare_call_graph = Some(path.into()),
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = AnalysisOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(options, AnalysisOptions::default());
        assert_eq!(options.worklist, WorklistOrder::Fifo);
        assert_eq!(options.context, ContextPolicy::Insensitive);
    }

    #[test]
    fn test_from_lookup() {
        let options = AnalysisOptions::from_lookup(lookup(&[
            (ENTRIES_VAR, "<Main: void main(java.lang.String[])>; <A: void run()>;"),
            (WORKLIST_VAR, "lifo"),
            (CONTEXT_VAR, "2-obj"),
            (DUMP_CALL_GRAPH_VAR, "-"),
            (COMPARE_CALL_GRAPH_VAR, "expected.txt"),
        ]))
        .unwrap();
        assert_eq!(
            options.entries,
            ["<Main: void main(java.lang.String[])>", "<A: void run()>"]
        );
        assert_eq!(options.worklist, WorklistOrder::Lifo);
        assert_eq!(options.context, ContextPolicy::Object(2));
        assert_eq!(options.dump_call_graph, Some(DumpTarget::Stdout));
        assert_eq!(options.compare_call_graph, Some(PathBuf::from("expected.txt")));
    }

    #[test]
    fn test_context_policy() {
        assert_eq!("ci".parse::<ContextPolicy>().unwrap(), ContextPolicy::Insensitive);
        assert_eq!("1-call".parse::<ContextPolicy>().unwrap(), ContextPolicy::CallSite(1));
        assert_eq!("3-obj".parse::<ContextPolicy>().unwrap(), ContextPolicy::Object(3));
        for bad in &["", "0-call", "2-type", "call", "ci-1"] {
            match bad.parse::<ContextPolicy>() {
                Err(Error::InvalidOption { option, value }) => {
                    assert_eq!(option, CONTEXT_VAR);
                    assert_eq!(value, *bad);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_worklist() {
        let err = AnalysisOptions::from_lookup(lookup(&[(WORKLIST_VAR, "random")])).unwrap_err();
        assert!(matches!(err, Error::InvalidOption { option: WORKLIST_VAR, .. }));
    }
}
