use bayes_pref::{
    select_next_pair, BeliefSnapshot, BeliefState, BeliefUpdater, ConfigurationError,
    PairSelector, SelectorConfig,
};

fn selector(epsilon: f64, exploration_weight: f64) -> PairSelector {
    PairSelector::new(SelectorConfig::new(epsilon, exploration_weight).unwrap()).unwrap()
}

#[test]
fn fresh_prior_ties_resolve_to_first_pair() {
    for n in 2..7 {
        let state = BeliefState::new(n, 0.0, 1.0).unwrap();
        assert_eq!(select_next_pair(&state, 0.1, 0.1).unwrap(), (0, 1));
        assert_eq!(select_next_pair(&state, 0.01, 0.0).unwrap(), (0, 1));
    }
}

#[test]
fn rejects_bad_selector_settings() {
    let state = BeliefState::new(3, 0.0, 1.0).unwrap();
    assert_eq!(
        select_next_pair(&state, 0.0, 0.1),
        Err(ConfigurationError::NonPositiveEpsilon(0.0))
    );
    assert_eq!(
        select_next_pair(&state, 0.1, -1.0),
        Err(ConfigurationError::NegativeExplorationWeight(-1.0))
    );
    assert!(select_next_pair(&state, f64::NAN, 0.1).is_err());
}

#[test]
fn scored_listing_agrees_with_selection() {
    let mut state = BeliefState::new(5, 0.0, 1.0).unwrap();
    let updater = BeliefUpdater::new(0.1).unwrap();
    updater.update(&mut state, 0, 1, 0).unwrap();
    updater.update(&mut state, 2, 3, 3).unwrap();
    updater.update(&mut state, 0, 4, 4).unwrap();

    let selector = selector(0.1, 0.1);
    let scores = selector.score_pairs(&state);
    assert_eq!(scores.len(), 10);
    assert!(scores.windows(2).all(|w| w[0].score >= w[1].score));
    for s in &scores {
        assert!(s.i < s.j);
        assert!(s.gain >= 0.0);
        assert!((s.score - (s.gain + s.exploration_bonus)).abs() < 1e-15);
    }

    let selection = selector.select(&state);
    assert_eq!(selection.pair(), (scores[0].i, scores[0].j));
    assert_eq!(selection.best, scores[0]);
    assert!(selection.degenerate_pairs.is_empty());
}

#[test]
fn exploration_bonus_counts_both_orders() {
    let mut state = BeliefState::new(3, 0.0, 1.0).unwrap();
    let updater = BeliefUpdater::new(0.1).unwrap();
    updater.update(&mut state, 1, 0, 0).unwrap();
    updater.update(&mut state, 0, 1, 1).unwrap();

    let pair = selector(0.1, 0.3).score_pair(&state, 0, 1);
    assert!((pair.exploration_bonus - 0.1).abs() < 1e-15);
    let untouched = selector(0.1, 0.3).score_pair(&state, 1, 2);
    assert!((untouched.exploration_bonus - 0.3).abs() < 1e-15);
}

#[test]
fn fully_correlated_pair_is_floored_and_reported() {
    // Items 0 and 1 share all their variance, so their difference has none.
    let snapshot = BeliefSnapshot {
        n_items: 3,
        mu: vec![0.0, 0.0, 0.0],
        sigma: vec![1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        comparisons: vec![0; 9],
    };
    let state = BeliefState::from_snapshot(&snapshot).unwrap();
    let selection = selector(0.1, 0.1).select(&state);

    assert_eq!(selection.degenerate_pairs, vec![(0, 1)]);
    let floored = selector(0.1, 0.1).score_pair(&state, 0, 1);
    assert!(floored.degenerate);
    assert!(floored.gain.is_finite());
    assert_ne!(selection.pair(), (0, 1));
}
