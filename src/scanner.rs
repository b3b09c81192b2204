//! Project-wide scan: enumerate persisted files and walk each one

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::host::project::to_scheme_path;
use crate::host::{Loaded, ProjectHost, SceneInstance};
use crate::ignore::{IgnoreList, is_always_excluded};
use crate::rules::RuleExtractor;
use crate::walker::{ErrorSink, GraphWalker, VisitedSet};

pub const SCENE_EXTENSION: &str = "tscn";
pub const RESOURCE_EXTENSIONS: &[&str] = &["tres"];

/// Marker file that hides a directory from the editor and from scans.
pub const DIRECTORY_IGNORE_MARKER: &str = ".gdignore";

pub fn is_resource_extension(ext: &str) -> bool {
    RESOURCE_EXTENSIONS.contains(&ext)
}

/// Whether `path` has one of the persisted-object extensions.
pub fn is_persisted_object(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == SCENE_EXTENSION || is_resource_extension(ext))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub error_count: usize,
    pub files_scanned: usize,
    pub duration: Duration,
}

impl ScanSummary {
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }
}

/// File enumeration under one project root.
pub struct FileScanner<'a> {
    root: &'a Path,
    scheme: &'a str,
    ignore: &'a IgnoreList,
}

impl<'a> FileScanner<'a> {
    pub fn new(root: &'a Path, scheme: &'a str, ignore: &'a IgnoreList) -> Self {
        Self {
            root,
            scheme,
            ignore,
        }
    }

    /// Every eligible file as `(disk path, scheme path)`, in file-name order
    /// at each directory level.
    pub fn files(&self) -> Vec<(PathBuf, String)> {
        let mut files = Vec::new();

        let walker = WalkDir::new(self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.prune(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_persisted_object(entry.path()) {
                continue;
            }
            let Some(path) = to_scheme_path(self.root, self.scheme, entry.path()) else {
                continue;
            };
            if self.ignore.is_ignored(&path) {
                debug!("Ignoring {path}");
                continue;
            }
            files.push((entry.into_path(), path));
        }

        files
    }

    /// Directories that must not be descended into.
    fn prune(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }

        let name = entry.file_name().to_string_lossy();
        if is_always_excluded(&name) {
            return true;
        }
        if entry.path().join(DIRECTORY_IGNORE_MARKER).exists() {
            debug!("Skipping {} ({DIRECTORY_IGNORE_MARKER})", entry.path().display());
            return true;
        }

        to_scheme_path(self.root, self.scheme, entry.path())
            .is_some_and(|path| self.ignore.is_ignored(&path))
    }
}

/// Drives the walker over every eligible file of a project.
pub struct ProjectScanner<'a, H: ProjectHost> {
    host: &'a mut H,
    rules: &'a mut RuleExtractor,
    visited: VisitedSet,
}

impl<'a, H: ProjectHost> ProjectScanner<'a, H> {
    pub fn new(host: &'a mut H, rules: &'a mut RuleExtractor) -> Self {
        Self {
            host,
            rules,
            visited: VisitedSet::new(),
        }
    }

    /// Scan all files under `root`. Load failures are logged and skipped.
    pub fn scan(
        &mut self,
        root: &Path,
        scheme: &str,
        ignore: &IgnoreList,
        sink: &mut dyn ErrorSink,
    ) -> ScanSummary {
        let started = Instant::now();
        self.visited.clear();
        self.host.begin_scan();

        let mut error_count = 0;
        let mut files_scanned = 0;

        for (_, path) in FileScanner::new(root, scheme, ignore).files() {
            if let Some(errors) = self.scan_file(&path, sink) {
                files_scanned += 1;
                error_count += errors;
            }
        }

        let summary = ScanSummary {
            error_count,
            files_scanned,
            duration: started.elapsed(),
        };
        info!(
            "Scanned {} file(s), {} error(s), {} object(s) visited",
            summary.files_scanned,
            summary.error_count,
            self.visited.len()
        );
        summary
    }

    /// Errors found in one file, or `None` if it could not be loaded.
    pub fn scan_file(&mut self, path: &str, sink: &mut dyn ErrorSink) -> Option<usize> {
        debug!("Validating {path}");

        let loaded = match self.host.load(path) {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!("Skipping {path}: {:?}", miette::Report::new(err));
                return None;
            }
        };

        match loaded {
            Loaded::Scene(scene) => {
                let instance = match SceneInstance::instantiate(&mut *self.host, &scene) {
                    Ok(instance) => instance,
                    Err(err) => {
                        warn!("Skipping {path}: {:?}", miette::Report::new(err));
                        return None;
                    }
                };
                let mut walker =
                    GraphWalker::new(instance.host(), self.rules, &mut self.visited, sink);
                Some(walker.validate_scene_node(instance.root(), path))
            }
            Loaded::Resource(resource) => {
                let mut walker =
                    GraphWalker::new(&*self.host, self.rules, &mut self.visited, sink);
                Some(walker.validate_resource(resource, path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ClassRegistry, Project};
    use crate::walker::ValidationError;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, path: &str, content: &str) {
        let disk = dir.path().join(path);
        fs::create_dir_all(disk.parent().unwrap()).unwrap();
        fs::write(disk, content).unwrap();
    }

    fn scheme_paths(dir: &TempDir, ignore: &IgnoreList) -> Vec<String> {
        FileScanner::new(dir.path(), "res://", ignore)
            .files()
            .into_iter()
            .map(|(_, path)| path)
            .collect()
    }

    const EMPTY_RESOURCE: &str = "[gd_resource type=\"Resource\" format=3]\n[resource]\n";

    #[test]
    fn test_only_persisted_objects_are_listed() {
        let dir = TempDir::new().unwrap();
        for path in ["a.tscn", "b.tres", "c.gd", "d.cs", "e.gdshader", "f.txt", "g.json", "h.cfg"] {
            write(&dir, path, EMPTY_RESOURCE);
        }

        assert_eq!(
            scheme_paths(&dir, &IgnoreList::default()),
            vec!["res://a.tscn", "res://b.tres"]
        );
    }

    #[test]
    fn test_traversal_order_is_by_file_name() {
        let dir = TempDir::new().unwrap();
        for path in ["z.tres", "m/b.tres", "m/a.tres", "a.tres"] {
            write(&dir, path, EMPTY_RESOURCE);
        }

        assert_eq!(
            scheme_paths(&dir, &IgnoreList::default()),
            vec!["res://a.tres", "res://m/a.tres", "res://m/b.tres", "res://z.tres"]
        );
    }

    #[test]
    fn test_ignored_and_internal_paths_are_pruned() {
        let dir = TempDir::new().unwrap();
        for path in [
            "addons/anything/x.tscn",
            "Scenes/Draft/WipLevel.tscn",
            "Scenes/Draft/Other.tscn",
            ".godot/imported/cache.tres",
            "tools/.gdignore",
            "tools/generated.tres",
        ] {
            write(&dir, path, EMPTY_RESOURCE);
        }
        let ignore = IgnoreList::parse("addons/\nres://Scenes/Draft/WipLevel.tscn\n", "res://");

        assert_eq!(
            scheme_paths(&dir, &ignore),
            vec!["res://Scenes/Draft/Other.tscn"]
        );
    }

    #[test]
    fn test_load_failures_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "broken.tres", "[gd_resource\n");
        write(&dir, "fine.tres", EMPTY_RESOURCE);

        let mut project = Project::new(dir.path(), "res://", ClassRegistry::default());
        let mut rules = RuleExtractor::new();
        let mut errors: Vec<ValidationError> = Vec::new();
        let summary = ProjectScanner::new(&mut project, &mut rules).scan(
            dir.path(),
            "res://",
            &IgnoreList::default(),
            &mut errors,
        );

        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.error_count, 0);
        assert!(summary.passed());
    }

    #[test]
    fn test_scene_instances_are_released_after_walking() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "level.tscn",
            "[gd_scene format=3]\n[node name=\"Level\" type=\"Node\"]\n[node name=\"A\" type=\"Node\" parent=\".\"]\n",
        );

        let mut project = Project::new(dir.path(), "res://", ClassRegistry::default());
        let mut rules = RuleExtractor::new();
        let mut errors: Vec<ValidationError> = Vec::new();
        let summary = ProjectScanner::new(&mut project, &mut rules).scan(
            dir.path(),
            "res://",
            &IgnoreList::default(),
            &mut errors,
        );

        assert_eq!(summary.files_scanned, 1);
        assert!(project.store().is_empty());
    }
}
