//! Application wiring: configuration, stores and primitives.

use shotboard_core::external::{FileCaptureSource, FsDelivery, FsListing, MemorySurface};
use shotboard_core::{
    CaptureOutcome, CapturePipeline, Config, DeletionReconciler, FileStateStore, LibraryError,
    OrphanPolicy, PipelineError, Presenter, ProjectLibrary, ScanOutcome, SessionHandoff,
    StateStore, StorageError, StoreScanner, list_projects, spawn_presenter, spawn_reconciler,
    spawn_scanner,
};
use shotboard_core::project::RemovedCanvas;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by the command-line shell.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No downloads directory found; pass --downloads")]
    NoDownloadsDir,
    #[error("No current project; pass --project")]
    NoProject,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// Where the application keeps its state and finds the external store.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// State file; defaults to the user's local data directory.
    pub state_path: Option<PathBuf>,
    /// Directory the external store lives in; defaults to downloads.
    pub downloads_dir: Option<PathBuf>,
    pub core: Config,
}

/// What a capture should be attributed to.
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    /// Image file standing in for the captured page.
    pub image: PathBuf,
    pub page_title: Option<String>,
    pub page_url: Option<String>,
    pub project: Option<String>,
    pub canvas: Option<String>,
}

/// Main application struct.
pub struct App {
    config: AppConfig,
    store: Arc<dyn StateStore>,
    delivery: Arc<FsDelivery>,
    listing: Arc<FsListing>,
    handoff: Arc<SessionHandoff>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let store = match &config.state_path {
            Some(path) => FileStateStore::new(path.clone())?,
            None => FileStateStore::default_location()?,
        };
        let downloads = config
            .downloads_dir
            .clone()
            .or_else(dirs::download_dir)
            .ok_or(AppError::NoDownloadsDir)?;
        log::debug!(
            "State at {}, external store at {}",
            store.path().display(),
            downloads.display()
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            delivery: Arc::new(FsDelivery::new(downloads.clone())),
            listing: Arc::new(FsListing::new(downloads)),
            handoff: Arc::new(SessionHandoff::new()),
        })
    }

    pub fn root(&self) -> String {
        self.config.core.root()
    }

    fn scanner(&self) -> StoreScanner {
        StoreScanner::new(self.store.clone(), self.listing.clone(), &self.root())
    }

    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, AppError> {
        let source = FileCaptureSource::new(request.image).with_page(request.page_title, request.page_url);
        let pipeline = CapturePipeline::new(
            self.store.clone(),
            Arc::new(source),
            self.delivery.clone(),
            &self.root(),
        )
        .with_handoff(self.handoff.clone());
        Ok(pipeline
            .capture_and_store(request.project.as_deref(), request.canvas.as_deref())
            .await?)
    }

    pub async fn scan(&self) -> Result<ScanOutcome, AppError> {
        Ok(self.scanner().scan_and_merge().await?)
    }

    pub async fn new_project(&self) -> Result<String, AppError> {
        Ok(ProjectLibrary::new(self.store.clone()).new_project().await?)
    }

    pub async fn open(&self, project_id: &str) -> Result<String, AppError> {
        Ok(ProjectLibrary::new(self.store.clone()).open_project(project_id).await?)
    }

    /// Stored and discovered project ids. Discovery runs a scan.
    pub async fn projects(&self) -> Result<Vec<String>, AppError> {
        let outcome = self.scan().await?;
        Ok(list_projects(&outcome.state, &outcome.discovered))
    }

    pub async fn delete_canvas(
        &self,
        project_id: &str,
        canvas_id: &str,
        policy: OrphanPolicy,
    ) -> Result<RemovedCanvas, AppError> {
        Ok(ProjectLibrary::new(self.store.clone())
            .delete_canvas(project_id, canvas_id, policy)
            .await?)
    }

    /// Run the background tasks for one project until Ctrl-C.
    pub async fn watch(&self, project_id: Option<String>, canvas_id: Option<String>) -> Result<(), AppError> {
        let state = self.store.read().await?;
        let project_id = project_id
            .or_else(|| state.current_project().map(|p| p.id.clone()))
            .ok_or(AppError::NoProject)?;

        let surface = Arc::new(MemorySurface::immediate());
        let presenter = Presenter::new(project_id.clone(), canvas_id);
        let reconciler = DeletionReconciler::new(presenter.scope().clone());

        let tasks = [
            spawn_scanner(Arc::new(self.scanner()), self.config.core.scan_interval()),
            spawn_presenter(
                presenter,
                self.store.clone(),
                surface.clone(),
                Some(self.handoff.clone()),
            ),
            spawn_reconciler(
                reconciler,
                surface,
                self.store.clone(),
                self.config.core.reconcile_interval(),
            ),
        ];
        log::info!("Watching {} under {}", project_id, self.root());

        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Failed to wait for Ctrl-C: {}", e);
        }
        for task in tasks {
            task.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const PNG: [u8; 12] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];

    fn app(dir: &TempDir) -> App {
        App::new(AppConfig {
            state_path: Some(dir.path().join("state.json")),
            downloads_dir: Some(dir.path().join("downloads")),
            core: Config::default(),
        })
        .unwrap()
    }

    fn image(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("Landing.png");
        fs::write(&path, PNG).unwrap();
        path
    }

    #[tokio::test]
    async fn test_capture_then_scan_finds_nothing_new() {
        let dir = tempdir().unwrap();
        let app = app(&dir);

        let outcome = app
            .capture(CaptureRequest {
                image: image(&dir),
                project: Some("site".into()),
                canvas: Some("canvas-1".into()),
                ..CaptureRequest::default()
            })
            .await
            .unwrap();
        assert!(outcome.path.starts_with("projects/site/Landing_"));
        assert!(dir.path().join("downloads").join(&outcome.path).exists());

        let scan = app.scan().await.unwrap();
        assert!(scan.report.is_empty());
        assert_eq!(app.projects().await.unwrap(), vec!["site"]);
    }

    #[tokio::test]
    async fn test_scan_discovers_foreign_files() {
        let dir = tempdir().unwrap();
        let app = app(&dir);
        let folder = dir.path().join("downloads/projects/imported");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("a.png"), PNG).unwrap();

        let scan = app.scan().await.unwrap();

        assert_eq!(scan.report.projects_created, 1);
        assert_eq!(scan.state.project("imported").unwrap().screenshots.len(), 1);
    }

    #[tokio::test]
    async fn test_open_and_delete_canvas() {
        let dir = tempdir().unwrap();
        let app = app(&dir);

        assert_eq!(app.open("demo").await.unwrap(), "canvas-1");
        let removed = app
            .delete_canvas("demo", "canvas-1", OrphanPolicy::default())
            .await
            .unwrap();
        assert!(removed.removed.is_empty());

        assert!(matches!(
            app.delete_canvas("demo", "canvas-1", OrphanPolicy::default()).await,
            Err(AppError::Library(LibraryError::CanvasNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_watch_needs_a_current_project() {
        let dir = tempdir().unwrap();
        let app = app(&dir);

        assert!(matches!(app.watch(None, None).await, Err(AppError::NoProject)));
    }
}
