use miette::Diagnostic;
use thiserror::Error;

use crate::format::SyntaxError;

/// Why a persisted file could not be turned into an object graph.
#[derive(Error, Debug, Diagnostic)]
pub enum LoadError {
    #[error("file not found: {path}")]
    #[diagnostic(code(fieldguard::load::not_found))]
    NotFound { path: String },

    #[error("failed to read {path}")]
    #[diagnostic(code(fieldguard::load::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("{path}: expected a {expected} document, found `[{found}]`")]
    #[diagnostic(code(fieldguard::load::unsupported_document))]
    UnsupportedDocument {
        path: String,
        expected: &'static str,
        found: String,
    },

    #[error("{path}: `[{section}]` is missing the `{attribute}` attribute")]
    #[diagnostic(code(fieldguard::load::missing_attribute))]
    MissingAttribute {
        path: String,
        section: String,
        attribute: &'static str,
    },

    #[error("{path}: unknown external resource id `{id}`")]
    #[diagnostic(code(fieldguard::load::unknown_ext_resource))]
    UnknownExtResource { path: String, id: String },

    #[error("{path}: unknown sub-resource id `{id}`")]
    #[diagnostic(code(fieldguard::load::unknown_sub_resource))]
    UnknownSubResource { path: String, id: String },

    #[error("{path}: scene has no root node")]
    #[diagnostic(code(fieldguard::load::empty_scene))]
    EmptyScene { path: String },

    #[error("{path}: node `{node}` has unknown parent `{parent}`")]
    #[diagnostic(code(fieldguard::load::unknown_parent))]
    UnknownParent {
        path: String,
        node: String,
        parent: String,
    },

    #[error("{path}: scene instances itself through `{through}`")]
    #[diagnostic(code(fieldguard::load::recursive_instance))]
    RecursiveInstance { path: String, through: String },
}
