use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(fieldguard::syntax))]
pub struct SyntaxError {
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub bad_bit: SourceSpan,
    pub message: String,
}

impl SyntaxError {
    pub fn new(label: &str, content: &str, offset: usize, message: impl Into<String>) -> Self {
        let len = usize::from(offset < content.len());
        Self {
            src: NamedSource::new(source_name(label), content.to_string()),
            bad_bit: SourceSpan::new(offset.into(), len),
            message: message.into(),
        }
    }

    pub fn offset(&self) -> usize {
        self.bad_bit.offset()
    }
}

/// Project-relative name for a `scheme://path` label.
///
/// The leading space keeps the path clickable in iTerm2.
fn source_name(label: &str) -> String {
    let relative = label.split_once("://").map_or(label, |(_, path)| path);
    format!(" {relative}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_name_drops_scheme() {
        assert_eq!(source_name("res://items/sword.tres"), " items/sword.tres");
        assert_eq!(source_name("sword.tres"), " sword.tres");
    }
}
