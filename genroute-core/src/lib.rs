#![allow(clippy::manual_range_contains, clippy::len_without_is_empty)]

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod registry;
pub mod repo;
pub mod selector;
pub mod services;

pub use config::{
    get_config_dir, ConfigLoadError, DatabaseSettings, DispatchConfig, EndpointConfig,
    GenrouteConfig, HealthConfig, LedgerConfig, LoggingConfig, ProvidersConfig, RegistryConfig,
};
pub use db::{init_database, Database, DatabaseConfig, DatabaseError};
pub use dispatch::{DispatchPipeline, ProgressFn};
pub use error::{CliErrorDisplay, ErrorContext, GenrouteError, GenrouteResult};
pub use health::HealthMonitor;
pub use ledger::{BudgetGuard, ExportFormat, UsageBreakdown, UsageLedger, UsageStats};
pub use models::{
    Capability, DispatchResult, GenerationOptions, GenerationOutcome, GenerationRequest,
    HealthRecord, ProviderProfile, ProviderUsage, Requirements, UsageRecord, WorkUnit,
};
pub use providers::{
    DynGenerationProvider, GenerationProvider, HttpGenerationProvider, ProviderClients,
};
pub use registry::{CapabilityRegistry, DEFAULT_CHAIN};
pub use repo::{MemoryUsageStore, UsageRepository, UsageStore};
pub use selector::{rank_candidates, ProviderSelector};
pub use services::Orchestrator;
