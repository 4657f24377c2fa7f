use std::time::Duration;
use unveil_cli::simulator::{run_scenario, run_simulator, Action, Scenario, SimulatorConfig};
use unveil_core::SearchQuery;

fn scenario(action: Action) -> Scenario {
    Scenario {
        id: 0,
        query: SearchQuery::name("Jane", "Doe"),
        valid: true,
        dwell: Duration::from_millis(10),
        account_latency: Duration::from_millis(15),
        record_latency: Duration::from_millis(25),
        fail_accounts: false,
        fail_records: true,
        prefetch: false,
        action,
    }
}

#[tokio::test]
async fn test_simulator_passes_small_run() {
    let report = run_simulator(SimulatorConfig {
        seed: 7,
        runs: 40,
        concurrency: 8,
        stop_on_first_violation: false,
    })
    .await;

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.stats.runs, 40);
    assert!(report.stats.samples > 0);
}

#[tokio::test]
async fn test_completed_scenario_counts_failure() {
    let (stats, violations) = run_scenario(scenario(Action::Complete)).await;
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.lookup_failures, 1);
}

#[tokio::test]
async fn test_teardown_scenario_is_quiet() {
    let (stats, violations) =
        run_scenario(scenario(Action::Teardown(Duration::from_millis(15)))).await;
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(stats.torn_down, 1);
    assert_eq!(stats.completed, 0);
}

#[tokio::test]
async fn test_invalid_query_is_rejected() {
    let mut s = scenario(Action::Complete);
    s.query = SearchQuery::email("nobody");
    s.valid = false;

    let (stats, violations) = run_scenario(s).await;
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(stats.rejected_queries, 1);
}

#[tokio::test]
async fn test_resubmit_and_reset_scenarios() {
    let (stats, violations) =
        run_scenario(scenario(Action::Resubmit(Duration::from_millis(12)))).await;
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(stats.resubmitted, 1);

    let (stats, violations) = run_scenario(scenario(Action::Reset(Duration::from_millis(12)))).await;
    assert!(violations.is_empty(), "{violations:?}");
    assert_eq!(stats.reset, 1);
}
