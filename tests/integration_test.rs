//! End-to-end tests of the selection and comparison flows against a mock
//! market-data provider.

mod common;

use approx::assert_relative_eq;
use carteira::domain::basket::{FailureReason, fetch_basket};
use carteira::domain::comparison::{ComparisonRequest, build_comparison};
use carteira::domain::error::{CarteiraError, DateRejection};
use carteira::domain::instrument::{Fundamental, TieBreakField};
use carteira::domain::session::Session;
use carteira::domain::strategy::{StrategyRequest, load_snapshot, submit_strategy};
use carteira::ports::market_data_port::MarketDataPort;
use common::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn snapshot() -> Vec<carteira::domain::instrument::InstrumentRecord> {
    vec![
        make_record("PETR3", Some(0.30), Some(1.0), Some(100.0)),
        make_record("PETR4", Some(0.30), Some(1.0), Some(500.0)),
        make_record("VALE3", Some(0.25), Some(0.8), Some(900.0)),
        make_record("VALE5", Some(0.25), Some(0.8), Some(100.0)),
        make_record("ITUB4", Some(0.20), Some(2.0), Some(1.0)),
        make_record("BBDC4", Some(0.15), Some(0.7), None),
        make_record("WEGE3", Some(0.35), Some(5.0), None),
        make_record("ABEV3", Some(0.10), Some(1.5), None),
        make_record("MGLU3", None, Some(0.5), None),
        make_record("RENT3", Some(0.05), Some(3.0), None),
    ]
}

fn strategy(size: usize) -> StrategyRequest {
    StrategyRequest {
        snapshot_date: date("2024-06-03"),
        profitability: Fundamental::Roe,
        discount: Fundamental::PVp,
        size,
        tie_break: TieBreakField::Volume,
    }
}

fn comparison_request() -> ComparisonRequest {
    ComparisonRequest::new(date("2024-06-03"), date("2024-06-05"))
}

fn full_port() -> MockMarketDataPort {
    MockMarketDataPort::new()
        .with_snapshot(date("2024-06-03"), snapshot())
        .with_prices("VALE3", make_prices("2024-06-03", &[10.0, 11.0, 12.1]))
        .with_prices("PETR4", make_prices("2024-06-03", &[20.0, 20.0, 22.0]))
        .with_error("BBDC4", "connection reset")
        .with_reference("ibov", make_prices("2024-06-03", &[100.0, 110.0, 99.0]))
}

mod selection {
    use super::*;

    #[tokio::test]
    async fn snapshot_is_deduplicated_by_issuer() {
        let port = full_port();
        let records = load_snapshot(&port, date("2024-06-03"), TieBreakField::Volume, today())
            .await
            .unwrap();

        assert_eq!(records.len(), 8);
        let tickers: Vec<&str> = records.iter().map(|r| r.ticker.as_str()).collect();
        assert!(tickers.contains(&"PETR4"));
        assert!(!tickers.contains(&"PETR3"));
        assert!(tickers.contains(&"VALE3"));
        assert!(!tickers.contains(&"VALE5"));
    }

    #[tokio::test]
    async fn end_to_end_selection() {
        let port = full_port();
        let mut session = Session::new();
        submit_strategy(&port, &mut session, &strategy(3), today())
            .await
            .unwrap();

        let selection = session.selection().unwrap();
        assert_eq!(selection.tickers, vec!["VALE3", "PETR4", "BBDC4"]);
        let positions: Vec<usize> = selection.holdings.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        let scores: Vec<usize> = selection
            .holdings
            .iter()
            .map(|h| h.instrument.combined_score)
            .collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn weekend_snapshot_rejected_before_fetch() {
        let port = MockMarketDataPort::new().with_error("snapshot", "should not be called");
        let err = load_snapshot(&port, date("2024-06-01"), TieBreakField::Volume, today())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CarteiraError::InvalidDate {
                reason: DateRejection::Weekend,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_snapshot_is_no_data() {
        let port = MockMarketDataPort::new();
        let err = load_snapshot(&port, date("2024-06-03"), TieBreakField::Volume, today())
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::NoData { .. }));
    }

    #[tokio::test]
    async fn snapshot_provider_failure_is_not_no_data() {
        let port = MockMarketDataPort::new().with_error("snapshot", "503");
        let err = load_snapshot(&port, date("2024-06-03"), TieBreakField::Volume, today())
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn failed_submission_keeps_previous_selection() {
        let port = full_port();
        let mut session = Session::new();
        submit_strategy(&port, &mut session, &strategy(2), today())
            .await
            .unwrap();

        let bad = StrategyRequest {
            snapshot_date: date("2024-06-04"),
            ..strategy(2)
        };
        assert!(submit_strategy(&port, &mut session, &bad, today()).await.is_err());
        assert_eq!(session.selection().unwrap().tickers, vec!["VALE3", "PETR4"]);
    }
}

mod comparison {
    use super::*;

    async fn ready_session(port: &MockMarketDataPort, size: usize) -> Session {
        let mut session = Session::new();
        submit_strategy(port, &mut session, &strategy(size), today())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    async fn comparison_requires_selection() {
        let port = Arc::new(full_port());
        let err = build_comparison(port.clone(), &Session::new(), &comparison_request(), today())
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::NoSelection));
        assert_eq!(port.price_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn partial_failure_still_builds_curves() {
        let port = Arc::new(full_port());
        let session = ready_session(&port, 3).await;

        let comparison = build_comparison(port.clone(), &session, &comparison_request(), today())
            .await
            .unwrap();

        assert_eq!(comparison.failures.len(), 1);
        assert_eq!(comparison.failures[0].ticker, "BBDC4");
        assert!(matches!(comparison.failures[0].reason, FailureReason::Provider(_)));

        let portfolio: Vec<f64> = comparison
            .portfolio
            .points
            .iter()
            .map(|p| p.cumulative_return)
            .collect();
        assert_eq!(portfolio.len(), 3);
        assert_relative_eq!(portfolio[0], 0.0);
        assert_relative_eq!(portfolio[1], 0.05, epsilon = 1e-12);
        assert_relative_eq!(portfolio[2], 0.155, epsilon = 1e-12);

        let benchmark: Vec<f64> = comparison
            .benchmark
            .points
            .iter()
            .map(|p| p.cumulative_return)
            .collect();
        assert_relative_eq!(benchmark[1], 0.10, epsilon = 1e-12);
        assert_relative_eq!(benchmark[2], -0.01, epsilon = 1e-12);

        assert_relative_eq!(comparison.excess_return().unwrap(), 0.165, epsilon = 1e-12);
        assert_eq!(comparison.rows.len(), 3);
    }

    #[tokio::test]
    async fn all_tickers_failing_is_empty_result() {
        let port = Arc::new(
            MockMarketDataPort::new()
                .with_snapshot(date("2024-06-03"), snapshot())
                .with_reference("ibov", make_prices("2024-06-03", &[100.0, 101.0])),
        );
        let session = ready_session(&port, 3).await;
        let err = build_comparison(port, &session, &comparison_request(), today())
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::EmptyResult { .. }));
    }

    #[tokio::test]
    async fn empty_benchmark_is_no_data() {
        let port = Arc::new(
            MockMarketDataPort::new()
                .with_snapshot(date("2024-06-03"), snapshot())
                .with_prices("VALE3", make_prices("2024-06-03", &[10.0, 11.0])),
        );
        let session = ready_session(&port, 3).await;
        let err = build_comparison(port, &session, &comparison_request(), today())
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::NoData { .. }));
    }

    #[tokio::test]
    async fn benchmark_provider_failure_propagates() {
        let port = Arc::new(full_port().with_error("ibov", "timeout"));
        let session = ready_session(&port, 3).await;
        let err = build_comparison(port, &session, &comparison_request(), today())
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn reversed_range_rejected() {
        let port = Arc::new(full_port());
        let session = ready_session(&port, 3).await;
        let request = ComparisonRequest::new(date("2024-06-05"), date("2024-06-03"));
        let err = build_comparison(port, &session, &request, today())
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::InvalidDateRange { .. }));
    }

    #[tokio::test]
    async fn custom_benchmark_symbol() {
        let port = Arc::new(
            full_port().with_reference("smll", make_prices("2024-06-03", &[50.0, 55.0, 60.5])),
        );
        let session = ready_session(&port, 3).await;
        let request = ComparisonRequest {
            benchmark: "smll".to_string(),
            ..comparison_request()
        };
        let comparison = build_comparison(port, &session, &request, today())
            .await
            .unwrap();
        assert_eq!(comparison.benchmark_symbol, "smll");
        assert_relative_eq!(comparison.benchmark.final_return().unwrap(), 0.21, epsilon = 1e-12);
    }
}

mod fan_out {
    use super::*;

    fn tickers(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("TK{:02}3", i)).collect()
    }

    fn port_with(tickers: &[String], delay: Duration) -> MockMarketDataPort {
        tickers
            .iter()
            .fold(MockMarketDataPort::new().with_delay(delay), |port, t| {
                port.with_prices(t, make_prices("2024-06-03", &[10.0, 10.5]))
            })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_requests_are_bounded() {
        let tickers = tickers(12);
        let port = Arc::new(port_with(&tickers, Duration::from_millis(20)));
        let dyn_port: Arc<dyn MarketDataPort> = port.clone();

        let basket = fetch_basket(dyn_port, &tickers, date("2024-06-03"), date("2024-06-04"), 3)
            .await
            .unwrap();

        assert_eq!(basket.series.len(), 12);
        assert_eq!(port.price_calls.load(Ordering::SeqCst), 12);
        let max = port.max_in_flight.load(Ordering::SeqCst);
        assert!(max >= 1 && max <= 3, "max in flight was {max}");
    }

    #[tokio::test]
    async fn duplicate_tickers_fetched_once() {
        let tickers = vec!["AAAA3".to_string(), "AAAA3".to_string()];
        let port = Arc::new(port_with(&tickers, Duration::ZERO));
        let dyn_port: Arc<dyn MarketDataPort> = port.clone();

        let basket = fetch_basket(dyn_port, &tickers, date("2024-06-03"), date("2024-06-04"), 2)
            .await
            .unwrap();
        assert_eq!(basket.series.len(), 1);
        assert_eq!(port.price_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_series_reported_as_no_data() {
        let mut tickers = tickers(2);
        let port = Arc::new(port_with(&tickers, Duration::ZERO));
        tickers.push("GONE3".to_string());

        let basket = fetch_basket(port, &tickers, date("2024-06-03"), date("2024-06-04"), 2)
            .await
            .unwrap();
        assert!(basket.is_partial());
        assert_eq!(basket.failures[0].ticker, "GONE3");
        assert_eq!(basket.failures[0].reason, FailureReason::NoData);
    }

    #[tokio::test]
    async fn zero_concurrency_rejected() {
        let tickers = tickers(1);
        let port = Arc::new(port_with(&tickers, Duration::ZERO));
        let err = fetch_basket(port, &tickers, date("2024-06-03"), date("2024-06-04"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, CarteiraError::InvalidParameter { .. }));
    }
}
