//! Period-over-period KPI aggregation.
//!
//! Each KPI is one aggregate query over the requested window and the same
//! query over the immediately preceding window of identical duration.

use crate::error::DashResult;
use crate::models::{KpiKind, KpiMetric, PeriodWindow};
use crate::store::{DataStore, SqlParam};
use tracing::{debug, info};

const ACTIVE_ALERTS_SQL: &str = "SELECT COUNT(*) FROM alerts \
     WHERE created_at BETWEEN ?1 AND ?2 AND alert_status = ?3";

const CONFIRMATION_RATE_SQL: &str = "SELECT ROUND(AVG(is_anomaly) * 100, 2) FROM alerts \
     WHERE created_at BETWEEN ?1 AND ?2 AND alert_status = ?3";

const TOTAL_RISK_SQL: &str = "SELECT ROUND(SUM(risk_value), 2) FROM alerts \
     WHERE created_at BETWEEN ?1 AND ?2 AND alert_status = ?3";

/// Aggregate query for a KPI. Parameters: window start, window end, status.
pub fn kpi_sql(kind: KpiKind) -> &'static str {
    match kind {
        KpiKind::ActiveAlerts => ACTIVE_ALERTS_SQL,
        KpiKind::ConfirmationRate => CONFIRMATION_RATE_SQL,
        KpiKind::TotalRisk => TOTAL_RISK_SQL,
    }
}

/// Compute all KPIs for `window` against the preceding window.
///
/// An inverted window is rejected before any query is issued. NULL
/// aggregates count as zero; store failures are returned as errors.
pub fn compute_kpis<S: DataStore + ?Sized>(
    store: &S,
    window: &PeriodWindow,
    active_status: &str,
) -> DashResult<Vec<KpiMetric>> {
    window.validate()?;
    let previous = window.previous()?;

    debug!("KPI windows: current {} / previous {}", window, previous);

    let metrics = KpiKind::ALL
        .iter()
        .map(|&kind| {
            let current = query_metric(store, kind, window, active_status)?;
            let prior = query_metric(store, kind, &previous, active_status)?;
            Ok(KpiMetric::new(kind, current, prior))
        })
        .collect::<DashResult<Vec<_>>>()?;

    info!("Computed {} KPIs for {}", metrics.len(), window);
    Ok(metrics)
}

fn query_metric<S: DataStore + ?Sized>(
    store: &S,
    kind: KpiKind,
    window: &PeriodWindow,
    active_status: &str,
) -> DashResult<f64> {
    let params = [
        SqlParam::Timestamp(window.start),
        SqlParam::Timestamp(window.end),
        SqlParam::Text(active_status.to_string()),
    ];
    let value = store.query_scalar(kpi_sql(kind), &params)?;
    Ok(value.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use crate::models::{Table, Trend};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use proptest::prelude::*;
    use std::cell::RefCell;

    /// Store fake answering by (KPI, is-current-window).
    struct FakeStore {
        current_start: NaiveDateTime,
        answer: Box<dyn Fn(KpiKind, bool) -> DashResult<Option<f64>>>,
        calls: RefCell<Vec<Vec<SqlParam>>>,
    }

    impl FakeStore {
        fn new(
            window: &PeriodWindow,
            answer: impl Fn(KpiKind, bool) -> DashResult<Option<f64>> + 'static,
        ) -> Self {
            Self {
                current_start: window.start,
                answer: Box::new(answer),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl DataStore for FakeStore {
        fn query_scalar(&self, sql: &str, params: &[SqlParam]) -> DashResult<Option<f64>> {
            self.calls.borrow_mut().push(params.to_vec());
            let kind = KpiKind::ALL
                .into_iter()
                .find(|k| kpi_sql(*k) == sql)
                .expect("known KPI query");
            let is_current = params[0] == SqlParam::Timestamp(self.current_start);
            (self.answer)(kind, is_current)
        }

        fn query_table(&self, _sql: &str) -> DashResult<Table> {
            Ok(Table::default())
        }
    }

    fn week_from(day: NaiveDate) -> PeriodWindow {
        let start = day.and_hms_opt(0, 0, 0).unwrap();
        PeriodWindow::new(start, start + Duration::days(7))
    }

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    #[test]
    fn test_fewer_alerts_is_a_positive_trend() {
        let window = week_from(d());
        let store = FakeStore::new(&window, |kind, current| {
            Ok(match (kind, current) {
                (KpiKind::ActiveAlerts, true) => Some(10.0),
                (KpiKind::ActiveAlerts, false) => Some(14.0),
                _ => Some(0.0),
            })
        });

        let kpis = compute_kpis(&store, &window, "Ativo").unwrap();
        let alerts = &kpis[0];
        assert_eq!(alerts.kind, KpiKind::ActiveAlerts);
        assert_eq!(alerts.delta, -4.0);
        assert_eq!(alerts.trend(), Trend::Positive);
        assert_eq!(store.call_count(), 6);
    }

    #[test]
    fn test_previous_window_params_are_adjacent() {
        let window = week_from(d());
        let store = FakeStore::new(&window, |_, _| Ok(Some(1.0)));
        compute_kpis(&store, &window, "Ativo").unwrap();

        let calls = store.calls.borrow();
        assert_eq!(calls[0][0], SqlParam::Timestamp(window.start));
        assert_eq!(calls[0][1], SqlParam::Timestamp(window.end));
        assert_eq!(calls[1][0], SqlParam::Timestamp(window.start - Duration::days(7)));
        assert_eq!(calls[1][1], SqlParam::Timestamp(window.start));
        assert_eq!(calls[1][2], SqlParam::Text("Ativo".to_string()));
    }

    #[test]
    fn test_unrepresentable_previous_window_issues_no_queries() {
        let window = PeriodWindow::from_dates(NaiveDate::MIN, NaiveDate::MAX);
        let store = FakeStore::new(&window, |_, _| Ok(Some(1.0)));

        let err = compute_kpis(&store, &window, "Ativo").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.call_count(), 0);
    }

    #[test]
    fn test_null_aggregates_are_zero() {
        let window = week_from(d());
        let store = FakeStore::new(&window, |kind, current| {
            Ok(match (kind, current) {
                (KpiKind::TotalRisk, true) => Some(99.5),
                _ => None,
            })
        });

        let kpis = compute_kpis(&store, &window, "Ativo").unwrap();
        let risk = kpis.iter().find(|k| k.kind == KpiKind::TotalRisk).unwrap();
        assert_eq!(risk.previous_value, 0.0);
        assert_eq!(risk.delta, 99.5);
        assert_eq!(risk.trend(), Trend::Negative);
    }

    #[test]
    fn test_store_failure_is_not_zero() {
        let window = week_from(d());
        let store = FakeStore::new(&window, |kind, _| match kind {
            KpiKind::ConfirmationRate => Err(DashboardError::Store("disk I/O error".to_string())),
            _ => Ok(Some(3.0)),
        });

        let err = compute_kpis(&store, &window, "Ativo").unwrap_err();
        assert!(matches!(err, DashboardError::Store(_)));
    }

    #[test]
    fn test_confirmation_rate_delta_is_rounded() {
        let window = week_from(d());
        let store = FakeStore::new(&window, |kind, current| {
            Ok(match (kind, current) {
                (KpiKind::ConfirmationRate, true) => Some(33.33),
                (KpiKind::ConfirmationRate, false) => Some(11.11),
                _ => Some(0.0),
            })
        });

        let kpis = compute_kpis(&store, &window, "Ativo").unwrap();
        let rate = kpis
            .iter()
            .find(|k| k.kind == KpiKind::ConfirmationRate)
            .unwrap();
        assert_eq!(rate.delta, 22.22);
        assert_eq!(rate.trend(), Trend::Positive);
    }

    proptest! {
        #[test]
        fn prop_inverted_window_issues_no_queries(offset_minutes in 1i64..100_000) {
            let end = d().and_hms_opt(12, 0, 0).unwrap();
            let window = PeriodWindow::new(end + Duration::minutes(offset_minutes), end);
            let store = FakeStore::new(&window, |_, _| Ok(Some(1.0)));

            let err = compute_kpis(&store, &window, "Ativo").unwrap_err();
            prop_assert!(err.is_validation());
            prop_assert_eq!(store.call_count(), 0);
        }

        #[test]
        fn prop_previous_window_is_adjacent_and_equal(
            start_minutes in 0i64..5_000_000,
            length_minutes in 0i64..500_000,
        ) {
            let base = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
            let start = base + Duration::minutes(start_minutes);
            let window = PeriodWindow::new(start, start + Duration::minutes(length_minutes));
            let previous = window.previous().unwrap();

            prop_assert_eq!(previous.end, window.start);
            prop_assert_eq!(previous.end - previous.start, window.end - window.start);
        }
    }
}
