pub mod classify;
pub mod delay;
pub mod engine;
pub mod error;
pub mod proxy;
pub mod record;
pub mod session;
pub mod testutil;
pub mod traits;

pub use classify::{FetchOutcome, PageSnapshot, classify};
pub use delay::{DelayPolicy, NoDelay, UniformDelay};
pub use engine::{Engine, RunEvent, RunReporter, TracingRunReporter};
pub use error::HarvestError;
pub use proxy::{PoolConfig, ProxyEndpoint, ProxyHealth, ProxyPool};
pub use record::{ProfilePayload, RecordResult, RecordStatus, StatusCounts, TargetRecord};
pub use session::{RunSession, RunSummary, StopReason};
pub use traits::{NoProbe, PageDriver, ProxyProbe, ProxySource, RecordStore};
