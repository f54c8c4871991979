/// Builtin checker registry and comparisons
pub mod checker;
/// Helper for compiling source into an executable
pub mod compiler;
pub mod error;
pub mod event;
/// Judgers evaluating one submission against one problem
pub mod judge;
pub mod problem;
pub mod result;
/// Runtime essentials for running a program under control
pub mod run;
pub mod utils;
