pub mod maintenance;
pub mod provenance;
pub mod reconcile;
pub mod sync;
