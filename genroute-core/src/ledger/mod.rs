mod budget;
mod export;
mod stats;
mod usage_ledger;

pub use budget::BudgetGuard;
pub use export::ExportFormat;
pub use stats::{UsageBreakdown, UsageStats};
pub use usage_ledger::UsageLedger;
