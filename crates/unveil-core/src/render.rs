//! Disclosure rendering
//!
//! Pure mapping from (current phase, result set) to the visible step list.

use crate::accumulator::ResultSet;
use crate::types::{DisclosureRow, Phase, PhaseResult, RowStatus, Summarize};

/// Render one row per configured phase
///
/// - `Done`: phase already passed, or current and resolved
/// - `Active`: current and unresolved
/// - `Upcoming`: not reached
///
/// `labels` and `results` are expected to have the same length; missing
/// slots render as unresolved.
#[must_use]
pub fn render<S, P>(labels: &[S], phase: Phase, results: &ResultSet<P>) -> Vec<DisclosureRow>
where
    S: AsRef<str>,
    P: Summarize + PartialEq,
{
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let slot = results.get(index);
            let resolved = slot.is_some_and(PhaseResult::is_resolved);

            let status = match phase {
                Phase::Results => RowStatus::Done,
                Phase::Step(current) if index < current => RowStatus::Done,
                Phase::Step(current) if index == current && resolved => RowStatus::Done,
                Phase::Step(current) if index == current => RowStatus::Active,
                Phase::Idle | Phase::Step(_) => RowStatus::Upcoming,
            };

            DisclosureRow {
                label: label.as_ref().to_string(),
                status,
                detail: slot.and_then(detail),
            }
        })
        .collect()
}

/// Detail line for a slot; empty while unresolved
#[must_use]
pub fn detail<P: Summarize>(result: &PhaseResult<P>) -> Option<String> {
    match result {
        PhaseResult::Succeeded(payload) => {
            let summary = payload.summary();
            (!summary.is_empty()).then_some(summary)
        }
        PhaseResult::Failed(reason) => Some(format!("Failed: {reason}")),
        PhaseResult::NotStarted | PhaseResult::Pending => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Count(usize);

    impl Summarize for Count {
        fn summary(&self) -> String {
            format!("{} found", self.0)
        }
    }

    const LABELS: [&str; 3] = ["Looking", "Accounts", "Records"];

    #[test]
    fn idle_renders_all_upcoming() {
        let rows = render(&LABELS, Phase::Idle, &ResultSet::<Count>::new(3));
        assert!(rows.iter().all(|r| r.status == RowStatus::Upcoming));
        assert!(rows.iter().all(|r| r.detail.is_none()));
    }

    #[test]
    fn current_row_is_active_until_resolved() {
        let mut results = ResultSet::<Count>::new(3);
        results.begin(1);

        let rows = render(&LABELS, Phase::Step(1), &results);
        assert_eq!(
            rows.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![RowStatus::Done, RowStatus::Active, RowStatus::Upcoming]
        );
        assert_eq!(rows[1].detail, None);

        results.resolve(1, Ok(Count(3)));
        let rows = render(&LABELS, Phase::Step(1), &results);
        assert_eq!(rows[1].status, RowStatus::Done);
        assert_eq!(rows[1].detail.as_deref(), Some("3 found"));
    }

    #[test]
    fn failure_renders_failed_detail() {
        let mut results = ResultSet::<Count>::new(3);
        results.resolve(2, Err("network error".into()));

        let rows = render(&LABELS, Phase::Results, &results);
        assert_eq!(rows[2].status, RowStatus::Done);
        assert_eq!(rows[2].detail.as_deref(), Some("Failed: network error"));
    }

    #[test]
    fn resolved_result_ahead_of_phase_is_visible() {
        // A prefetched lookup may resolve before its row becomes current.
        let mut results = ResultSet::<Count>::new(3);
        results.resolve(2, Ok(Count(1)));

        let rows = render(&LABELS, Phase::Step(0), &results);
        assert_eq!(rows[2].status, RowStatus::Upcoming);
        assert_eq!(rows[2].detail.as_deref(), Some("1 found"));
    }

    fn arb_phase() -> impl Strategy<Value = Phase> {
        prop_oneof![Just(Phase::Idle), (0usize..3).prop_map(Phase::Step), Just(Phase::Results)]
    }

    fn arb_results() -> impl Strategy<Value = ResultSet<Count>> {
        proptest::collection::vec(
            prop_oneof![
                Just(None),
                Just(Some(PhaseResult::Pending)),
                (0usize..5).prop_map(|n| Some(PhaseResult::Succeeded(Count(n)))),
                Just(Some(PhaseResult::Failed("down".to_string()))),
            ],
            3,
        )
        .prop_map(|slots| {
            let mut set = ResultSet::new(3);
            for (i, slot) in slots.into_iter().enumerate() {
                if let Some(result) = slot {
                    set.upsert(i, result);
                }
            }
            set
        })
    }

    proptest! {
        #[test]
        fn prop_render_is_pure(phase in arb_phase(), results in arb_results()) {
            let first = render(&LABELS, phase, &results);
            let second = render(&LABELS, phase, &results.clone());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_at_most_one_active_row(phase in arb_phase(), results in arb_results()) {
            let rows = render(&LABELS, phase, &results);
            prop_assert!(rows.iter().filter(|r| r.status == RowStatus::Active).count() <= 1);
        }
    }
}
