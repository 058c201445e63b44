pub mod aggregate;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod sheets;
pub mod storage;
pub mod sync;
pub mod transform;
