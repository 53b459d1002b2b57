use bayes_pref::{
    check_convergence, select_next_pair, update_beliefs, BeliefSnapshot, BeliefState,
    PreferenceError, ValidationError,
};
use proptest::prelude::*;

/// An item count plus a sequence of (first, second, first-wins) trials.
fn arb_trials() -> impl Strategy<Value = (usize, Vec<(usize, usize, bool)>)> {
    (2usize..7).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n, any::<bool>()), 0..40),
        )
    })
}

fn replay(n: usize, trials: &[(usize, usize, bool)], epsilon: f64) -> BeliefState {
    let mut state = BeliefState::new(n, 0.0, 1.0).unwrap();
    for &(i, j, first_wins) in trials {
        if i == j {
            continue;
        }
        let winner = if first_wins { i } else { j };
        update_beliefs(&mut state, i, j, winner, epsilon).unwrap();
    }
    state
}

// ── Covariance stays a valid covariance ──────────────────────────────────

proptest! {
    #[test]
    fn covariance_stays_symmetric((n, trials) in arb_trials(), epsilon in 0.01f64..0.5) {
        let state = replay(n, &trials, epsilon);
        let sigma = state.sigma();
        for r in 0..n {
            for c in 0..n {
                let (a, b) = (sigma[(r, c)], sigma[(c, r)]);
                prop_assert!((a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0));
            }
        }
        prop_assert!(state.is_positive_semidefinite(1e-9));
    }

    #[test]
    fn uncertainties_are_non_negative((n, trials) in arb_trials(), epsilon in 0.01f64..0.5) {
        let state = replay(n, &trials, epsilon);
        for u in state.uncertainties() {
            prop_assert!(u.is_finite() && u >= 0.0, "uncertainty {}", u);
        }
        prop_assert!(state.mu().iter().all(|m| m.is_finite()));
    }
}

// ── Comparison counts and input validation ───────────────────────────────

proptest! {
    #[test]
    fn update_increments_exactly_one_slot(
        (n, trials) in arb_trials(),
        pick in any::<(usize, usize, bool)>(),
    ) {
        let mut state = replay(n, &trials, 0.1);
        let i = pick.0 % n;
        let j = (i + 1 + pick.1 % (n - 1)) % n;
        let winner = if pick.2 { i } else { j };
        let before = state.comparisons().clone();

        update_beliefs(&mut state, i, j, winner, 0.1).unwrap();

        let after = state.comparisons();
        for r in 0..n {
            for c in 0..n {
                let expected = before[(r, c)] + u64::from(r == i && c == j);
                prop_assert_eq!(after[(r, c)], expected);
            }
        }
    }

    #[test]
    fn outsider_winner_is_always_rejected(n in 3usize..10, seed in any::<(usize, usize, usize)>()) {
        let mut state = BeliefState::new(n, 0.0, 1.0).unwrap();
        let i = seed.0 % n;
        let j = (i + 1 + seed.1 % (n - 1)) % n;
        let winner = (0..n).filter(|k| *k != i && *k != j).nth(seed.2 % (n - 2)).unwrap();

        let result = update_beliefs(&mut state, i, j, winner, 0.1);
        prop_assert_eq!(
            result.unwrap_err(),
            PreferenceError::Validation(ValidationError::WinnerNotInPair { winner, i, j })
        );
        prop_assert_eq!(state.total_comparisons(), 0);
    }
}

// ── Convergence and persistence ──────────────────────────────────────────

proptest! {
    #[test]
    fn convergence_is_monotone_in_threshold(
        (n, trials) in arb_trials(),
        threshold in 0.001f64..2.0,
        bump in 0.0f64..1.0,
    ) {
        let state = replay(n, &trials, 0.05);
        if check_convergence(&state, threshold) {
            prop_assert!(check_convergence(&state, threshold + bump));
        }
    }

    #[test]
    fn snapshot_json_preserves_selection((n, trials) in arb_trials()) {
        let state = replay(n, &trials, 0.05);
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        let decoded: BeliefSnapshot = serde_json::from_str(&json).unwrap();
        let restored = BeliefState::from_snapshot(&decoded).unwrap();

        prop_assert_eq!(&restored, &state);
        prop_assert_eq!(
            select_next_pair(&restored, 0.05, 0.1).unwrap(),
            select_next_pair(&state, 0.05, 0.1).unwrap()
        );
    }
}
