use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::algorithm::Algorithm;
use crate::propensity::{combinations, combinations_derivative, reaction_propensity};
use crate::simulate::derive_seed;
use crate::{
    simulate, LeapParams, Method, Network, OutputMode, PathSet, Propensities, RegularPath,
    SimError, SimulateOptions, SimulationSummary,
};

const BIRTH_RATE: f64 = 10.0;
const DEATH_RATE: f64 = 1.0;

fn birth_death_network() -> Network {
    Network::builder("birth-death")
        .species("X", 0)
        .reaction("birth", BIRTH_RATE, &[], &[("X", 1)])
        .reaction("death", DEATH_RATE, &[("X", 1)], &[])
        .build()
        .unwrap()
}

fn decay_network(initial: i32) -> Network {
    Network::builder("decay")
        .species("X", initial)
        .reaction("decay", 1.0, &[("X", 1)], &[])
        .build()
        .unwrap()
}

fn dimer_network() -> Network {
    Network::builder("dimerization")
        .species("M", 100)
        .species("D", 0)
        .reaction("dimerize", 0.01, &[("M", 2)], &[("D", 1)])
        .reaction("dissociate", 0.2, &[("D", 1)], &[("M", 2)])
        .build()
        .unwrap()
}

fn birth_death_mean(t: f64) -> f64 {
    BIRTH_RATE / DEATH_RATE * (1.0 - (-DEATH_RATE * t).exp())
}

fn final_count_mean(summary: &SimulationSummary) -> f64 {
    match summary.paths() {
        PathSet::Regular(paths) => {
            let sum: f64 = paths
                .iter()
                .map(|p| p.state(p.epochs() - 1)[0] as f64)
                .sum();
            sum / paths.len() as f64
        }
        PathSet::Full(_) => panic!("mean helper expects fixed-epoch output"),
    }
}

fn exact_methods() -> [Method; 4] {
    [
        Method::Direct,
        Method::FirstReaction,
        Method::NextReaction,
        Method::OptimizedDirect,
    ]
}

fn all_methods() -> [Method; 6] {
    [
        Method::Direct,
        Method::FirstReaction,
        Method::NextReaction,
        Method::OptimizedDirect,
        Method::TauLeap(LeapParams::default()),
        Method::StepAnticipation(LeapParams::default()),
    ]
}

#[test]
fn combinations_basics() {
    assert_eq!(combinations(5, 0), 1.0);
    assert_eq!(combinations(5, 1), 5.0);
    assert_eq!(combinations(5, 2), 10.0);
    assert_eq!(combinations(4, 3), 4.0);
    assert_eq!(combinations(3, 4), 0.0);
    assert_eq!(combinations(-2, 1), 0.0);
}

#[test]
fn combinations_derivative_matches_polynomials() {
    assert_eq!(combinations_derivative(7, 0), 0.0);
    assert_eq!(combinations_derivative(7, 1), 1.0);
    // d/dx [x(x-1)/2] = x - 1/2
    assert!((combinations_derivative(7, 2) - 6.5).abs() < 1e-12);
    // d/dx [x(x-1)(x-2)/6] at x = 4 is (3*16 - 24 + 2)/6
    assert!((combinations_derivative(4, 3) - 26.0 / 6.0).abs() < 1e-12);
}

#[test]
fn propensity_below_threshold_is_zero() {
    let network = dimer_network();
    let dimerize = &network.reactions()[0];
    assert_eq!(reaction_propensity(dimerize, &[1, 0]), 0.0);
    // 0.01 * C(100, 2)
    assert!((reaction_propensity(dimerize, &[100, 0]) - 0.01 * 4950.0).abs() < 1e-9);
}

#[test]
fn dependency_graph_links_reactions_through_touched_species() {
    let network = birth_death_network();
    // birth changes X, which death consumes; both must be recomputed
    assert_eq!(network.dependencies(0), &[0, 1]);
    // death changes X; birth has no reactants so only death depends on it
    assert_eq!(network.dependencies(1), &[1]);
}

#[test]
fn incremental_propensities_match_from_scratch() {
    let network = dimer_network();
    let mut state = network.initial_state();
    let mut propensities = Propensities::new(network.n_reactions());
    propensities.compute_all(&network, &state);

    let mut algorithm = Method::Direct.build(5.0);
    algorithm.init(&network);
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    algorithm.reset(&network, &state, &propensities, &mut rng);

    while !algorithm.done() {
        algorithm
            .step(&network, &mut state, &mut propensities, &mut rng)
            .unwrap();
        let mut fresh = Propensities::new(network.n_reactions());
        fresh.compute_all(&network, &state);
        assert!(
            (propensities.total() - fresh.total()).abs() < 1e-9,
            "propensity drift: incremental {} vs scratch {}",
            propensities.total(),
            fresh.total()
        );
        for (incremental, scratch) in propensities.values().iter().zip(fresh.values()) {
            assert!((incremental - scratch).abs() < 1e-9);
        }
    }
}

#[test]
fn derive_seed_is_deterministic_and_trial_dependent() {
    assert_eq!(derive_seed(Some(42), 5), derive_seed(Some(42), 5));
    assert_ne!(derive_seed(Some(42), 5), derive_seed(Some(42), 6));
    assert_ne!(derive_seed(Some(42), 0), derive_seed(Some(43), 0));
}

#[test]
fn seeded_runs_reproduce_exactly() {
    let network = birth_death_network();
    let options = SimulateOptions {
        time: 3.0,
        epochs: 12,
        trials: 6,
        seed: Some(99),
        ..Default::default()
    };
    let a = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &options).unwrap();
    let b = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &options).unwrap();
    let (PathSet::Regular(pa), PathSet::Regular(pb)) = (a.paths(), b.paths()) else {
        panic!("expected fixed-epoch paths");
    };
    for (x, y) in pa.iter().zip(pb) {
        for epoch in 0..x.epochs() {
            assert_eq!(x.state(epoch), y.state(epoch));
        }
    }
}

#[test]
fn thread_count_does_not_change_results() {
    let network = birth_death_network();
    let serial = SimulateOptions {
        time: 2.0,
        epochs: 8,
        trials: 8,
        seed: Some(7),
        ..Default::default()
    };
    let threaded = SimulateOptions {
        n_threads: Some(2),
        ..serial.clone()
    };
    let a = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &serial).unwrap();
    let b = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &threaded).unwrap();
    let (PathSet::Regular(pa), PathSet::Regular(pb)) = (a.paths(), b.paths()) else {
        panic!("expected fixed-epoch paths");
    };
    for (x, y) in pa.iter().zip(pb) {
        for epoch in 0..x.epochs() {
            assert_eq!(x.state(epoch), y.state(epoch));
        }
    }
}

#[test]
fn exact_methods_agree_on_birth_death_mean() {
    let network = birth_death_network();
    let t = 2.0;
    let expected = birth_death_mean(t);
    for (idx, method) in exact_methods().into_iter().enumerate() {
        let summary = simulate(
            &network,
            method.clone(),
            OutputMode::FixedEpoch,
            &SimulateOptions {
                time: t,
                epochs: 1,
                trials: 1000,
                seed: Some(1000 + idx as u64),
                ..Default::default()
            },
        )
        .unwrap();
        let mean = final_count_mean(&summary);
        // per-trial std is ~2.9, so 1000 trials put the standard error near
        // 0.09; half a count is a generous margin
        assert!(
            (mean - expected).abs() < 0.5,
            "{} mean {} vs analytic {}",
            method.name(),
            mean,
            expected
        );
    }
}

#[test]
fn leaping_methods_track_decay_mean() {
    let network = decay_network(1000);
    let t: f64 = 1.0;
    let expected = 1000.0 * (-t).exp();
    // a tight epsilon keeps the first-order discretization bias of plain
    // tau-leaping well inside the Monte-Carlo tolerance
    let tight = LeapParams {
        epsilon: 0.03,
        ..Default::default()
    };
    for (idx, method) in [
        Method::TauLeap(tight),
        Method::StepAnticipation(LeapParams::default()),
    ]
    .into_iter()
    .enumerate()
    {
        let summary = simulate(
            &network,
            method.clone(),
            OutputMode::FixedEpoch,
            &SimulateOptions {
                time: t,
                epochs: 1,
                trials: 200,
                seed: Some(33 + idx as u64),
                ..Default::default()
            },
        )
        .unwrap();
        let mean = final_count_mean(&summary);
        assert!(
            (mean - expected).abs() < 15.0,
            "{} mean {} vs analytic {}",
            method.name(),
            mean,
            expected
        );
    }
}

#[test]
fn no_variant_commits_a_negative_state() {
    let network = birth_death_network();
    for (idx, method) in all_methods().into_iter().enumerate() {
        let summary = simulate(
            &network,
            method.clone(),
            OutputMode::Full,
            &SimulateOptions {
                time: 2.0,
                trials: 20,
                seed: Some(500 + idx as u64),
                ..Default::default()
            },
        )
        .unwrap();
        let PathSet::Full(paths) = summary.paths() else {
            panic!("expected full paths");
        };
        for path in paths {
            for record in 0..path.len() {
                assert!(
                    path.state(record).iter().all(|&x| x >= 0),
                    "{} produced a negative count",
                    method.name()
                );
            }
        }
    }
}

#[test]
fn tau_leap_pure_decay_never_goes_negative() {
    for &epsilon in &[0.05, 0.125, 0.4, 0.9] {
        let network = decay_network(1000);
        let params = LeapParams {
            epsilon,
            ..Default::default()
        };
        let summary = simulate(
            &network,
            Method::TauLeap(params),
            OutputMode::Full,
            &SimulateOptions {
                time: 8.0,
                trials: 20,
                seed: Some(2024),
                track_stats: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(summary.failures().is_empty());
        let PathSet::Full(paths) = summary.paths() else {
            panic!("expected full paths");
        };
        for path in paths {
            for record in 0..path.len() {
                assert!(path.state(record)[0] >= 0, "epsilon {epsilon}");
            }
        }
        let stats = summary.stats().unwrap();
        assert!(stats.steps > 0);
        assert!(stats.recoveries <= stats.negative_excursions);
    }
}

#[test]
fn aggressive_leaps_trigger_contraction_and_recovery() {
    let network = decay_network(50);
    let params = LeapParams {
        epsilon: 0.9,
        delta: 0.05,
        ..Default::default()
    };
    let summary = simulate(
        &network,
        Method::TauLeap(params),
        OutputMode::Full,
        &SimulateOptions {
            time: 6.0,
            trials: 50,
            seed: Some(4242),
            track_stats: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(summary.failures().is_empty());
    let stats = summary.stats().unwrap();
    assert!(stats.negative_excursions > 0);
    assert!(stats.recoveries > 0);
    assert!(stats.recoveries <= stats.negative_excursions);
}

#[test]
fn sample_path_starts_at_time_zero_with_initial_state() {
    let network = birth_death_network();
    let summary = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            time: 1.0,
            trials: 3,
            seed: Some(8),
            ..Default::default()
        },
    )
    .unwrap();
    let PathSet::Full(paths) = summary.paths() else {
        panic!("expected full paths");
    };
    for path in paths {
        assert_eq!(path.time(0), 0.0);
        assert_eq!(path.state(0), &[0]);
        for window in path.times().windows(2) {
            assert!(window[0] <= window[1]);
        }
    }
}

#[test]
fn resampled_event_log_matches_fixed_epoch_recording() {
    let network = birth_death_network();
    let time = 3.0;
    let epochs = 7;
    let base = SimulateOptions {
        time,
        epochs,
        trials: 5,
        seed: Some(61),
        ..Default::default()
    };
    // identical per-trial seeds and no recorder randomness, so the event
    // sequences underlying both runs are the same
    let full = simulate(&network, Method::Direct, OutputMode::Full, &base).unwrap();
    let fixed = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &base).unwrap();
    let PathSet::Full(sample_paths) = full.paths() else {
        panic!("expected full paths");
    };
    let PathSet::Regular(regular_paths) = fixed.paths() else {
        panic!("expected fixed-epoch paths");
    };
    for (sample, regular) in sample_paths.iter().zip(regular_paths) {
        let resampled = RegularPath::from_sample_path(sample, epochs, time);
        assert_eq!(resampled.times(), regular.times());
        for epoch in 0..epochs {
            assert_eq!(resampled.state(epoch), regular.state(epoch));
        }
    }
}

#[test]
fn single_epoch_records_state_at_end_time() {
    let network = decay_network(3);
    let summary = simulate(
        &network,
        Method::Direct,
        OutputMode::FixedEpoch,
        &SimulateOptions {
            time: 100.0,
            epochs: 1,
            trials: 4,
            seed: Some(3),
            ..Default::default()
        },
    )
    .unwrap();
    let PathSet::Regular(paths) = summary.paths() else {
        panic!("expected fixed-epoch paths");
    };
    for path in paths {
        assert_eq!(path.epochs(), 1);
        assert_eq!(path.time(0), 100.0);
        // three decay events exhaust the species well before t = 100
        assert_eq!(path.state(0), &[0]);
    }
}

#[test]
fn zero_time_performs_zero_steps() {
    let network = birth_death_network();
    let options = SimulateOptions {
        time: 0.0,
        epochs: 5,
        trials: 2,
        seed: Some(1),
        track_stats: true,
        ..Default::default()
    };
    let full = simulate(&network, Method::Direct, OutputMode::Full, &options).unwrap();
    assert_eq!(full.stats().unwrap().steps, 0);
    let PathSet::Full(paths) = full.paths() else {
        panic!("expected full paths");
    };
    for path in paths {
        assert_eq!(path.len(), 1);
        assert_eq!(path.state(0), &[0]);
    }

    let fixed = simulate(&network, Method::Direct, OutputMode::FixedEpoch, &options).unwrap();
    let PathSet::Regular(paths) = fixed.paths() else {
        panic!("expected fixed-epoch paths");
    };
    for path in paths {
        assert_eq!(path.epochs(), 5);
        for epoch in 0..path.epochs() {
            assert_eq!(path.state(epoch), &[0]);
        }
    }
}

#[test]
fn absorbed_process_holds_last_state_to_the_end() {
    let network = decay_network(2);
    for method in exact_methods() {
        let summary = simulate(
            &network,
            method.clone(),
            OutputMode::FixedEpoch,
            &SimulateOptions {
                time: 50.0,
                epochs: 10,
                trials: 3,
                seed: Some(12),
                ..Default::default()
            },
        )
        .unwrap();
        let PathSet::Regular(paths) = summary.paths() else {
            panic!("expected fixed-epoch paths");
        };
        for path in paths {
            // far past absorption every late epoch must hold zero
            assert_eq!(path.state(path.epochs() - 1), &[0], "{}", method.name());
        }
    }
}

#[test]
fn next_reaction_rescaling_formula() {
    use crate::algorithm::NextReaction;
    // halving the propensity doubles the remaining wait: T' - t = 2 (T - t)
    let rescaled = NextReaction::rescale(2.0, 4.0, 2.0, 3.0);
    assert!((rescaled - 4.0).abs() < 1e-12);
    // unchanged propensity keeps the pending time
    let unchanged = NextReaction::rescale(2.0, 4.0, 4.0, 3.0);
    assert!((unchanged - 3.0).abs() < 1e-12);
}

#[test]
fn track_stats_gates_summary_statistics() {
    let network = birth_death_network();
    let without = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            time: 1.0,
            trials: 2,
            seed: Some(5),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(without.stats().is_none());

    let with = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            time: 1.0,
            trials: 2,
            seed: Some(5),
            track_stats: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(with.stats().unwrap().steps > 0);
}

#[test]
fn summary_exposes_run_identity() {
    let network = dimer_network();
    let summary = simulate(
        &network,
        Method::NextReaction,
        OutputMode::FixedEpoch,
        &SimulateOptions {
            time: 1.0,
            epochs: 4,
            trials: 2,
            seed: Some(2),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(summary.network_name(), "dimerization");
    assert_eq!(summary.method().name(), "next-reaction");
    assert_eq!(summary.species_index()["M"], 0);
    assert_eq!(summary.species_index()["D"], 1);
    assert_eq!(summary.species_names(), &["M", "D"]);
    assert_eq!(summary.paths().len(), 2);
}

#[test]
fn configuration_errors_are_fatal_before_any_trial() {
    let network = birth_death_network();
    let base = SimulateOptions {
        time: 1.0,
        epochs: 2,
        trials: 1,
        ..Default::default()
    };

    let err = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            time: -1.0,
            ..base.clone()
        },
    )
    .unwrap_err();
    assert!(matches!(err, SimError::InvalidArgument(msg) if msg.contains("time")));

    let err = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            trials: 0,
            ..base.clone()
        },
    )
    .unwrap_err();
    assert!(matches!(err, SimError::InvalidArgument(msg) if msg.contains("trials")));

    let err = simulate(
        &network,
        Method::Direct,
        OutputMode::FixedEpoch,
        &SimulateOptions {
            epochs: 0,
            ..base.clone()
        },
    )
    .unwrap_err();
    assert!(matches!(err, SimError::InvalidArgument(msg) if msg.contains("epoch")));

    for bad in [
        LeapParams {
            epsilon: 0.0,
            ..Default::default()
        },
        LeapParams {
            epsilon: 1.5,
            ..Default::default()
        },
        LeapParams {
            beta: 1.0,
            ..Default::default()
        },
        LeapParams {
            delta: -2.0,
            ..Default::default()
        },
        LeapParams {
            max_contractions: 0,
            ..Default::default()
        },
    ] {
        let err = simulate(&network, Method::TauLeap(bad), OutputMode::Full, &base).unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument(_)));
    }
}

#[test]
fn network_builder_validates_definitions() {
    let err = Network::builder("empty").build().unwrap_err();
    assert!(matches!(err, SimError::Model(_)));

    let err = Network::builder("dup")
        .species("X", 1)
        .species("X", 2)
        .reaction("r", 1.0, &[("X", 1)], &[])
        .build()
        .unwrap_err();
    assert!(matches!(err, SimError::Model(msg) if msg.contains("duplicate")));

    let err = Network::builder("unknown")
        .species("X", 1)
        .reaction("r", 1.0, &[("Y", 1)], &[])
        .build()
        .unwrap_err();
    assert!(matches!(err, SimError::Model(msg) if msg.contains("unknown species")));

    let err = Network::builder("negative-rate")
        .species("X", 1)
        .reaction("r", -1.0, &[("X", 1)], &[])
        .build()
        .unwrap_err();
    assert!(matches!(err, SimError::Model(msg) if msg.contains("rate")));

    let err = Network::builder("negative-count")
        .species("X", -4)
        .reaction("r", 1.0, &[("X", 1)], &[])
        .build()
        .unwrap_err();
    assert!(matches!(err, SimError::Model(msg) if msg.contains("initial count")));
}

#[test]
fn indexed_heap_tracks_minimum_through_updates() {
    use crate::algorithm::IndexedHeap;
    let mut heap = IndexedHeap::new(4);
    heap.rebuild(&[3.0, 1.0, 4.0, 2.0]);
    assert_eq!(heap.min(), (1, 1.0));

    // raising the minimum promotes the next-smallest entry
    heap.update(1, 10.0);
    assert_eq!(heap.min(), (3, 2.0));

    // lowering a non-minimum entry below everything else
    heap.update(2, 0.5);
    assert_eq!(heap.min(), (2, 0.5));
    assert_eq!(heap.key(1), 10.0);

    // infinity parks an entry behind every finite key
    heap.update(2, f64::INFINITY);
    heap.update(3, f64::INFINITY);
    heap.update(0, f64::INFINITY);
    assert_eq!(heap.min(), (1, 10.0));
}

#[test]
fn dimerization_conserves_monomer_mass() {
    let network = dimer_network();
    let summary = simulate(
        &network,
        Method::Direct,
        OutputMode::Full,
        &SimulateOptions {
            time: 5.0,
            trials: 10,
            seed: Some(77),
            ..Default::default()
        },
    )
    .unwrap();
    let PathSet::Full(paths) = summary.paths() else {
        panic!("expected full paths");
    };
    for path in paths {
        for record in 0..path.len() {
            let state = path.state(record);
            assert_eq!(state[0] + 2 * state[1], 100);
        }
    }
}
