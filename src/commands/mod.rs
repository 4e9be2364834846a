// Reconciliation
pub mod apply;

// Inspection
pub mod get;
pub mod nodeconfig;

// Node side
pub mod enroll;
