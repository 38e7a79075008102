mod health;
mod provider;
mod usage;
mod work;

pub use health::HealthRecord;
pub use provider::{Capability, ProviderProfile, Requirements};
pub use usage::{ProviderUsage, UsageRecord};
pub use work::{DispatchResult, GenerationOptions, GenerationOutcome, GenerationRequest, WorkUnit};
