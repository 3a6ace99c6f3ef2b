use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building IR, solving, or checking a call graph.
///
/// Every variant except [`Error::CallGraphMismatch`] aborts the analysis run.
/// They indicate that the front-end produced something this engine does not
/// understand, that a plugin was misconfigured, or that the type hierarchy is
/// inconsistent with the allocated objects.
#[derive(Error, Debug)]
pub enum Error {
    /// An operand shape with no IR translation rule.
    #[error("cannot handle value {value} in {method}")]
    IrConstruction { value: String, method: String },

    /// An invocation whose opcode is not one of the five JVM invoke opcodes.
    #[error("cannot classify invocation {invoke} (opcode {opcode:#04x}) in {method}")]
    Classification {
        invoke: String,
        opcode: u8,
        method: String,
    },

    /// A method signature that does not look like `<Class: ret name(params)>`.
    #[error("malformed method signature: {0}")]
    MalformedSignature(String),

    #[error("{plugin} registers multiple handlers for {method} (at most one handler can be registered for a method)")]
    DuplicateHandler { plugin: String, method: String },

    /// Virtual dispatch found no implementation on the allocated type.
    #[error("cannot resolve {subsignature} on {class} at call site {call_site}")]
    UnresolvedCall {
        subsignature: String,
        class: String,
        call_site: String,
    },

    #[error("entry method {0} does not exist in the program")]
    UnknownEntry(String),

    #[error("invalid value {value:?} for option {option}")]
    InvalidOption { option: &'static str, value: String },

    #[error("failed to {action} call graph file {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Aggregated differences between a call graph and a reference dump.
    #[error("mismatches of call graph\n{}", .0.join("\n"))]
    CallGraphMismatch(Vec<String>),
}

pub type Result<T> = std::result::Result<T, Error>;
