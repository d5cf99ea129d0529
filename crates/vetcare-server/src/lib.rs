//! VetCare medical record server.
//!
//! Visit records own their prescriptions, vaccinations and lab results.
//! [`RecordLifecycleManager`] is the single entry point for creating and
//! deleting records; deleting a record removes its children first through
//! the [`CascadeDeleteCoordinator`] and journals the operation so an
//! interrupted delete is finished at the next startup.

pub mod allocator;
pub mod cascade;
pub mod config;
pub mod entity_store;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod report;
pub mod server;

pub use allocator::SequenceAllocator;
pub use cascade::{CascadeDeleteCoordinator, CascadeStats};
pub use config::AppConfig;
pub use entity_store::{ChildEntity, ClinicalEntityStore, EntityStores};
pub use error::LifecycleError;
pub use lifecycle::{DeletedRecord, ReconcileSummary, RecordLifecycleManager};
pub use report::{MedicalReport, ReportAssembler};
pub use server::{AppState, ServerBuilder, VetcareServer, build_app, router};
