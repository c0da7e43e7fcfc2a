//! Discovers screenshots in the external store and merges them into state.
//!
//! The scanner only ever adds: projects it has not seen are created with the
//! default canvas, and files not yet recorded become path-only screenshots on
//! the project's first canvas. Scanning twice over the same listing changes
//! nothing the second time.

use crate::error::ListingError;
use crate::external::{FileListing, ListedFile, ListingQuery};
use crate::paths;
use crate::project::{ProjectsState, Screenshot};
use crate::storage::{StateStore, StorageResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Files found under the root, grouped by project in listing order.
pub type DiscoveredFiles = BTreeMap<String, Vec<String>>;

/// What a merge added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub projects_created: usize,
    pub screenshots_added: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.projects_created == 0 && self.screenshots_added == 0
    }
}

/// Result of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// State after the merge (unchanged if nothing was found).
    pub state: ProjectsState,
    pub report: MergeReport,
    /// Project ids seen in the listing, whether or not they were new.
    pub discovered: BTreeSet<String>,
}

/// List every entry under `root`, preferring the precise pattern query.
pub async fn list_root(listing: &dyn FileListing, root: &str) -> Result<Vec<ListedFile>, ListingError> {
    let pattern = ListingQuery::Pattern(paths::listing_pattern(root));
    match listing.list(&pattern).await {
        Ok(files) => Ok(files),
        Err(e) => {
            log::debug!("{}; falling back to substring query", e);
            listing.list(&ListingQuery::Substring(root.to_string())).await
        }
    }
}

/// Attribute listed files to projects, skipping entries that no longer exist
/// or do not sit in a project directory below `root`.
pub fn group_by_project(files: &[ListedFile], root: &str) -> DiscoveredFiles {
    let mut grouped = DiscoveredFiles::new();
    for file in files.iter().filter(|f| f.exists) {
        let Some(located) = paths::locate_under_root(&file.path, root) else {
            continue;
        };
        let paths = grouped.entry(located.project_id).or_default();
        if !paths.contains(&located.path) {
            paths.push(located.path);
        }
    }
    grouped
}

/// Project that owns the directory `segment`.
///
/// A project whose id is the segment wins; otherwise the first project, in id
/// order, whose id sanitizes to the segment. Unknown segments are ids of their
/// own.
pub fn owning_project(state: &ProjectsState, segment: &str) -> String {
    if state.project(segment).is_some() {
        return segment.to_string();
    }
    state
        .projects
        .keys()
        .find(|id| paths::path_segment(id) == segment)
        .cloned()
        .unwrap_or_else(|| segment.to_string())
}

/// Re-key files grouped by directory segment to the projects owning them.
pub fn attribute_to_projects(state: &ProjectsState, discovered: &DiscoveredFiles) -> DiscoveredFiles {
    let mut attributed = DiscoveredFiles::new();
    for (segment, paths) in discovered {
        let files = attributed.entry(owning_project(state, segment)).or_default();
        for path in paths {
            if !files.contains(path) {
                files.push(path.clone());
            }
        }
    }
    attributed
}

/// Merge discovered files into `state`.
///
/// Keys of `discovered` are directory segments; each is attributed with
/// [`owning_project`] before merging.
pub fn merge_discovered(state: &mut ProjectsState, discovered: &DiscoveredFiles) -> MergeReport {
    let mut report = MergeReport::default();
    for (project_id, paths) in &attribute_to_projects(state, discovered) {
        if state.project(project_id).is_none() {
            report.projects_created += 1;
        }
        let project = state.ensure_project(project_id);

        let mut canvas_id = None;
        for path in paths {
            if project.has_path(path) {
                continue;
            }
            let canvas = canvas_id.get_or_insert_with(|| project.ensure_default_canvas());
            project
                .screenshots
                .push(Screenshot::path_only(path.clone(), Some(canvas.clone())));
            report.screenshots_added += 1;
        }
    }
    report
}

/// Periodically reconciles the external store with persisted state.
pub struct StoreScanner {
    store: Arc<dyn StateStore>,
    listing: Arc<dyn FileListing>,
    root: String,
}

impl StoreScanner {
    /// Scan below `root`, which is sanitized here.
    pub fn new(store: Arc<dyn StateStore>, listing: Arc<dyn FileListing>, root: &str) -> Self {
        Self {
            store,
            listing,
            root: paths::normalize_root(Some(root)),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// List the external store and merge what is found.
    ///
    /// A listing failure is logged and leaves the state as it is. The store
    /// is written at most once, and only when something was added.
    pub async fn scan_and_merge(&self) -> StorageResult<ScanOutcome> {
        let files = match list_root(self.listing.as_ref(), &self.root).await {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Scan of {} skipped: {}", self.root, e);
                return Ok(ScanOutcome {
                    state: self.store.read().await?,
                    report: MergeReport::default(),
                    discovered: BTreeSet::new(),
                });
            }
        };

        let mut state = self.store.read().await?;
        let discovered = attribute_to_projects(&state, &group_by_project(&files, &self.root));
        let report = merge_discovered(&mut state, &discovered);
        if !report.is_empty() {
            self.store.write(&state).await?;
            log::info!(
                "Scan of {} added {} screenshot(s), {} project(s)",
                self.root,
                report.screenshots_added,
                report.projects_created
            );
        }

        Ok(ScanOutcome {
            state,
            report,
            discovered: discovered.into_keys().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MemoryExternalStore;
    use crate::image::ImageRef;
    use crate::storage::MemoryStateStore;
    use crate::testing::{block_on, png_bytes};
    use std::collections::HashSet;

    fn scanner_over(external: Arc<MemoryExternalStore>) -> (Arc<MemoryStateStore>, StoreScanner) {
        let store = Arc::new(MemoryStateStore::new());
        let scanner = StoreScanner::new(store.clone(), external, "projects");
        (store, scanner)
    }

    fn external_with_proj_a() -> Arc<MemoryExternalStore> {
        let external = Arc::new(MemoryExternalStore::with_prefix("/home/me/Downloads"));
        for name in ["one", "two", "three"] {
            external.insert(&format!("projects/projA/{name}.png"), png_bytes(1));
        }
        external
    }

    #[test]
    fn test_rescanning_unchanged_listing_adds_nothing() {
        let (store, scanner) = scanner_over(external_with_proj_a());

        let first = block_on(scanner.scan_and_merge()).unwrap();
        assert_eq!(first.report.projects_created, 1);
        assert_eq!(first.report.screenshots_added, 3);

        let second = block_on(scanner.scan_and_merge()).unwrap();
        assert!(second.report.is_empty());
        assert_eq!(store.write_count(), 1);

        let state = store.snapshot().unwrap();
        let project = state.project("projA").unwrap();
        assert_eq!(project.screenshots.len(), 3);
        assert!(project.screenshots.iter().all(|s| s.is_path_only()));
        assert!(
            project
                .screenshots
                .iter()
                .all(|s| s.canvas_id.as_deref() == Some("canvas-1"))
        );
        assert!(project.has_path("projects/projA/one.png"));
    }

    #[test]
    fn test_listing_fallback_to_substring() {
        let external = external_with_proj_a();
        external.set_pattern_unsupported(true);
        let (store, scanner) = scanner_over(external.clone());

        let outcome = block_on(scanner.scan_and_merge()).unwrap();

        assert_eq!(outcome.report.screenshots_added, 3);
        assert_eq!(
            external.queries(),
            vec![
                ListingQuery::Pattern(paths::listing_pattern("projects")),
                ListingQuery::Substring("projects".into()),
            ]
        );
        assert_eq!(store.snapshot().unwrap().screenshot_count(), 3);
    }

    #[test]
    fn test_listing_failure_is_a_no_op() {
        let external = external_with_proj_a();
        external.set_listing_unavailable(true);
        let (store, scanner) = scanner_over(external);

        let outcome = block_on(scanner.scan_and_merge()).unwrap();

        assert!(outcome.report.is_empty());
        assert!(outcome.discovered.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_skips_missing_and_unattributable_entries() {
        let external = Arc::new(MemoryExternalStore::new());
        external.insert("projects/p/kept.png", png_bytes(1));
        external.insert("projects/p/gone.png", png_bytes(2));
        external.mark_missing("projects/p/gone.png");
        external.insert("projects/flat.png", png_bytes(3));
        external.insert("myprojects/q/other.png", png_bytes(4));
        external.set_pattern_unsupported(true);
        let (store, scanner) = scanner_over(external);

        let outcome = block_on(scanner.scan_and_merge()).unwrap();

        assert_eq!(outcome.discovered, BTreeSet::from(["p".to_string()]));
        let state = store.snapshot().unwrap();
        assert_eq!(state.projects.len(), 1);
        let paths: Vec<_> = state.project("p").unwrap().screenshots.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths, vec!["projects/p/kept.png"]);
    }

    #[test]
    fn test_merge_leaves_captured_records_alone() {
        let mut state = ProjectsState::new();
        let project = state.ensure_project("p");
        project.ensure_canvas("canvas-2");
        let image = ImageRef::from_bytes(&png_bytes(1));
        project
            .screenshots
            .push(Screenshot::captured("projects/p/a.png", image.clone(), Some("canvas-2".into())));

        let discovered = DiscoveredFiles::from([(
            "p".to_string(),
            vec!["projects/p/a.png".to_string(), "projects/p/b.png".to_string()],
        )]);
        let report = merge_discovered(&mut state, &discovered);

        assert_eq!(report, MergeReport { projects_created: 0, screenshots_added: 1 });
        let project = state.project("p").unwrap();
        assert_eq!(project.screenshot_by_path("projects/p/a.png").unwrap().image, image);
        assert_eq!(
            project.screenshot_by_path("projects/p/b.png").unwrap().canvas_id.as_deref(),
            Some("canvas-1")
        );
    }

    #[test]
    fn test_paths_stay_unique_per_project() {
        let files = vec![
            ListedFile::new("C:\\Users\\me\\Downloads\\projects\\p\\a.png"),
            ListedFile::new("/home/me/Downloads/Projects/p/a.png"),
            ListedFile::new("projects/p/a.png"),
        ];
        let grouped = group_by_project(&files, "projects");
        assert_eq!(grouped["p"], vec!["projects/p/a.png".to_string()]);

        let mut state = ProjectsState::new();
        merge_discovered(&mut state, &grouped);
        merge_discovered(&mut state, &grouped);

        let project = state.project("p").unwrap();
        let unique: HashSet<_> = project.screenshots.iter().map(|s| &s.path).collect();
        assert_eq!(unique.len(), project.screenshots.len());
        assert_eq!(project.screenshots.len(), 1);
    }

    #[test]
    fn test_segments_map_to_projects_with_unsafe_ids() {
        let mut state = ProjectsState::new();
        state
            .ensure_project("my site")
            .screenshots
            .push(Screenshot::path_only("projects/my_site/a.png", Some("canvas-1".into())));
        state.ensure_project("my_site2");

        assert_eq!(owning_project(&state, "my_site"), "my site");
        assert_eq!(owning_project(&state, "my_site2"), "my_site2");
        assert_eq!(owning_project(&state, "fresh"), "fresh");

        let discovered = DiscoveredFiles::from([(
            "my_site".to_string(),
            vec!["projects/my_site/a.png".to_string(), "projects/my_site/b.png".to_string()],
        )]);
        let report = merge_discovered(&mut state, &discovered);

        assert_eq!(report, MergeReport { projects_created: 0, screenshots_added: 1 });
        assert!(state.project("my_site").is_none());
        assert_eq!(state.project("my site").unwrap().screenshots.len(), 2);
    }
}
