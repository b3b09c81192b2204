//! Entry point tying settings, host, scanner and reporter together

use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::Settings;
use crate::host::{ClassRegistry, Project, ProjectHost};
use crate::ignore::IgnoreList;
use crate::model::TypeIdentity;
use crate::report::{OutputFormat, Reporter};
use crate::rules::{RuleExtractor, ValidationRule};
use crate::scanner::{FileScanner, ProjectScanner, ScanSummary};
use crate::walker::ErrorSink;

pub struct FieldValidator<H: ProjectHost> {
    host: H,
    rules: RuleExtractor,
    root: PathBuf,
    settings: Settings,
}

impl FieldValidator<Project> {
    /// Open the project at `root`, reading `fieldguard.yml` and the type manifest.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let settings = Settings::load(&root)?;
        Self::with_settings(root, settings)
    }

    pub fn with_settings(root: PathBuf, settings: Settings) -> Result<Self> {
        let classes = ClassRegistry::load(&root.join(&settings.type_manifest))?;
        let host = Project::new(root.clone(), settings.scheme.clone(), classes);
        Ok(Self::new(host, root, settings))
    }
}

impl<H: ProjectHost> FieldValidator<H> {
    pub fn new(host: H, root: PathBuf, settings: Settings) -> Self {
        Self {
            host,
            rules: RuleExtractor::new(),
            root,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The ignore list for this scan, bootstrapping the ignore file if needed.
    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::load_or_bootstrap(&self.root.join(&self.settings.ignore_file), &self.settings.scheme)
    }

    /// Scheme paths of every file a scan would visit, in scan order.
    pub fn files(&self) -> Vec<String> {
        let ignore = self.ignore_list();
        FileScanner::new(&self.root, &self.settings.scheme, &ignore)
            .files()
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    /// Rules enforced for `identity` (cached like during a scan).
    pub fn rules_for(&mut self, identity: &TypeIdentity) -> Arc<[ValidationRule]> {
        self.rules.rules_for(identity, &self.host)
    }

    /// One full scan; violations go to `sink` as they are found.
    pub fn scan(&mut self, sink: &mut dyn ErrorSink) -> ScanSummary {
        let ignore = self.ignore_list();
        ProjectScanner::new(&mut self.host, &mut self.rules).scan(
            &self.root,
            &self.settings.scheme,
            &ignore,
            sink,
        )
    }

    /// Scan and report through `reporter`; returns whether the project passed.
    pub fn run<W: Write>(&mut self, reporter: &mut Reporter<W>, print_success_on_pass: bool) -> bool {
        let summary = self.scan(reporter);
        if let Err(err) = reporter.finish(&summary, print_success_on_pass) {
            warn!("Failed to write summary: {err}");
        }
        summary.passed()
    }

    /// Scan and print to stdout; returns whether the project passed.
    pub fn run_full_validation(&mut self, print_success_on_pass: bool) -> bool {
        let mut reporter = Reporter::stdout(OutputFormat::Text);
        self.run(&mut reporter, print_success_on_pass)
    }
}

/// Validate the project at `root`. A project that cannot be opened fails.
pub fn run_full_validation(root: &Path, print_success_on_pass: bool) -> bool {
    match FieldValidator::open(root) {
        Ok(mut validator) => validator.run_full_validation(print_success_on_pass),
        Err(err) => {
            error!("{err:#}");
            false
        }
    }
}
