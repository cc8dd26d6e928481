//! Small concurrency primitives shared by the collection manager and runner.

pub mod notify;
pub mod queue;
pub mod transactional;
