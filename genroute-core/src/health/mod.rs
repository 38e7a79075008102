mod monitor;

pub use monitor::HealthMonitor;
