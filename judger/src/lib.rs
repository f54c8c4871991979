/// Contest layout, manifest loading and the result grid
pub mod contest;
pub mod context;
pub mod error;
/// Persisted cell artifacts and player reports
pub mod report;
/// Background batch judging
pub mod worker;
