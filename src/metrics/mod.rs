//! Period metrics: KPI aggregation, currency formatting and the alert
//! distribution chart.

pub mod aggregator;
pub mod currency;
pub mod distribution;

pub use aggregator::{compute_kpis, kpi_sql};
pub use currency::format_brl;
pub use distribution::{build_distribution_chart, ChartCache, BRAND_COLOR};
