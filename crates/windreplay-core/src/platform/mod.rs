//! Backend implementations
//!
//! OS injection lives outside this workspace; the headless backend drives
//! tests and dry runs.

pub mod headless;

pub use headless::{BackendCall, HeadlessBackend};
