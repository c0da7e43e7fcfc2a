//! Shotboard Core Library
//!
//! Keeps screenshot projects and canvases in sync with the external store the
//! images are saved to and with the drawing surface they are shown on.

pub mod capture;
pub mod config;
pub mod error;
pub mod external;
pub mod handoff;
pub mod image;
pub mod library;
pub mod paths;
pub mod presenter;
pub mod project;
pub mod reconcile;
pub mod scanner;
pub mod storage;
pub mod tasks;

#[cfg(test)]
mod testing;

pub use capture::{CaptureOutcome, CapturePipeline};
pub use config::Config;
pub use error::{CaptureError, DeliveryError, LibraryError, ListingError, PipelineError, SurfaceError};
pub use handoff::SessionHandoff;
pub use image::{ImageFormat, ImageRef};
pub use library::{ProjectLibrary, list_projects};
pub use presenter::Presenter;
pub use project::{Canvas, CanvasScope, OrphanPolicy, Project, ProjectsState, Screenshot};
pub use reconcile::{DeletionReconciler, PollReport};
pub use scanner::{MergeReport, ScanOutcome, StoreScanner};
pub use storage::{FileStateStore, MemoryStateStore, StateStore, StorageError, StorageResult};
pub use tasks::{TaskHandle, spawn_periodic, spawn_presenter, spawn_reconciler, spawn_scanner};
