pub mod change_aggregator;
pub mod chart_scanner;
pub mod publish_driver;
pub mod yaml_patcher;

pub use change_aggregator::{AggregateOutcome, ChangeAggregator};
pub use chart_scanner::{ChartScannerAgent, ScanOptions};
pub use publish_driver::{PublishDriver, PublishReport};
