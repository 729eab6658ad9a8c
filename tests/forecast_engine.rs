//! End-to-end checks of feature derivation, training and recursive forecasting

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rstest::rstest;

use load_forecaster::domain::{Cadence, Feature, Observation};
use load_forecaster::forecast::{
    self, features::inference_features, FeatureEngineer, ForecastError, HistoryIndex,
    LagAlignment,
};
use load_forecaster::ml::{destandardize, standardize, ModelError, ModelState, TrainingConfig};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn series(cadence: Cadence, n: i64, load: impl Fn(i64) -> f64) -> Vec<Observation> {
    (0..n)
        .map(|i| Observation::new(start() + cadence.unit() * i as i32, load(i)))
        .collect()
}

fn seeded(seed: u64) -> TrainingConfig {
    TrainingConfig {
        seed: Some(seed),
        ..TrainingConfig::default()
    }
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn hourly_trend_lag_model_extrapolates() {
    let obs = series(Cadence::Hourly, 200, |i| 10.0 + 0.5 * i as f64);
    let feature_cols = cols(&["lag_1", "lag_24", "lag_168"]);

    let outcome = forecast::train(
        &obs,
        Cadence::Hourly,
        &feature_cols,
        &FeatureEngineer::default(),
        &seeded(3),
    )
    .unwrap();
    assert_eq!(outcome.metadata.training_samples, 32);

    let points = forecast::forecast(&obs, &outcome.state, &feature_cols, Cadence::Hourly, 1).unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].timestamp, start() + Duration::hours(200));
    assert!(
        (points[0].value - 110.0).abs() < 1.0,
        "prediction {} far from trend",
        points[0].value
    );
}

#[test]
fn hourly_noisy_trend_with_default_pipeline() {
    let mut rng = StdRng::seed_from_u64(11);
    let normal = Normal::new(0.0, 0.5).unwrap();
    let noise: Vec<f64> = (0..200).map(|_| normal.sample(&mut rng)).collect();
    let obs = series(Cadence::Hourly, 200, |i| 10.0 + 0.5 * i as f64 + noise[i as usize]);
    let feature_cols = Cadence::Hourly.default_feature_cols();

    let outcome = forecast::train(
        &obs,
        Cadence::Hourly,
        &feature_cols,
        &FeatureEngineer::default(),
        &seeded(3),
    )
    .unwrap();
    assert_eq!(outcome.metadata.training_samples, 32);

    let points = forecast::forecast(&obs, &outcome.state, &feature_cols, Cadence::Hourly, 1).unwrap();
    assert_eq!(points[0].timestamp, start() + Duration::hours(200));
    assert!(
        (points[0].value - 110.0).abs() < 3.0,
        "prediction {} far from trend",
        points[0].value
    );
}

#[test]
fn daily_missing_week_lag_reads_zero() {
    let mut obs = series(Cadence::Daily, 60, |i| 50.0 + i as f64);
    // target is day 60, so T-7 is day 53
    obs.retain(|o| o.timestamp != start() + Duration::days(53));

    let history = HistoryIndex::from_observations(&obs);
    let target = start() + Duration::days(60);
    let features = inference_features(Cadence::Daily, target, &history);

    assert_eq!(features[&Feature::Lag7], 0.0);
    assert_eq!(features[&Feature::Rolling7], 0.0);
    assert_eq!(features[&Feature::Lag1], 109.0);
    assert_eq!(features[&Feature::Lag30], 80.0);
}

#[test]
fn state_with_short_weights_is_rejected() {
    let state = ModelState {
        feature_cols: Cadence::Daily.default_feature_cols(),
        w: vec![0.1; 5],
        b: 0.0,
        mean: vec![0.0; 7],
        std: vec![1.0; 7],
    };
    let obs = series(Cadence::Daily, 40, |_| 1.0);

    let err = forecast::forecast(
        &obs,
        &state,
        &Cadence::Daily.default_feature_cols(),
        Cadence::Daily,
        3,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        ForecastError::Model(ModelError::StateMismatch {
            feature_cols: 7,
            weights: 5,
            ..
        })
    ));
}

#[rstest]
#[case::hourly(Cadence::Hourly, 240)]
#[case::daily(Cadence::Daily, 90)]
fn calendar_features_match_between_training_and_inference(
    #[case] cadence: Cadence,
    #[case] n: i64,
) {
    let obs = series(cadence, n, |i| (i % 13) as f64);
    let table = FeatureEngineer::default().derive(&obs, cadence);
    let history = HistoryIndex::from_observations(&obs);
    assert!(!table.is_empty());

    for row in table.rows() {
        let inferred = inference_features(cadence, row.timestamp, &history);
        for &feature in cadence.calendar_features() {
            let trained = row.get(feature).unwrap();
            assert_eq!(trained.to_bits(), inferred[&feature].to_bits());
        }
    }
}

#[rstest]
#[case::hourly(Cadence::Hourly, 300)]
#[case::daily(Cadence::Daily, 120)]
fn seeded_training_is_reproducible(#[case] cadence: Cadence, #[case] n: i64) {
    let obs = series(cadence, n, |i| 20.0 + (i % 5) as f64 * 3.0);
    let feature_cols = cadence.default_feature_cols();
    let engineer = FeatureEngineer::default();

    let a = forecast::train(&obs, cadence, &feature_cols, &engineer, &seeded(99)).unwrap();
    let b = forecast::train(&obs, cadence, &feature_cols, &engineer, &seeded(99)).unwrap();

    assert_eq!(a.state.w, b.state.w);
    assert_eq!(a.state.b.to_bits(), b.state.b.to_bits());
    assert_eq!(a.state.feature_cols, feature_cols);
}

#[rstest]
#[case::positional(LagAlignment::Positional)]
#[case::calendar(LagAlignment::Calendar)]
fn gap_free_tables_drop_leading_dependency_rows(#[case] alignment: LagAlignment) {
    let obs = series(Cadence::Daily, 100, |i| i as f64);
    let table = FeatureEngineer::new(alignment).transform_for_days(&obs);
    let expected = match alignment {
        LagAlignment::Positional => 100 - Cadence::Daily.max_dependency(),
        // lag_30 is the deepest lookup; rolling windows may start before the series
        LagAlignment::Calendar => 100 - 30,
    };
    assert_eq!(table.len(), expected);
}

fn identity_lag_state() -> ModelState {
    ModelState {
        feature_cols: cols(&["lag_1"]),
        w: vec![1.0],
        b: 0.0,
        mean: vec![0.0],
        std: vec![1.0],
    }
}

proptest! {
    #[test]
    fn forecast_emits_evenly_spaced_points(
        len in 1i64..40,
        horizon in 0usize..60,
        daily in any::<bool>(),
    ) {
        let cadence = if daily { Cadence::Daily } else { Cadence::Hourly };
        let obs = series(cadence, len, |i| i as f64);
        let last = obs[obs.len() - 1].timestamp;

        let points = forecast::forecast(&obs, &identity_lag_state(), &cols(&["lag_1"]), cadence, horizon)
            .unwrap();

        prop_assert_eq!(points.len(), horizon);
        if let Some(first) = points.first() {
            prop_assert_eq!(first.timestamp, last + cadence.unit());
        }
        for pair in points.windows(2) {
            prop_assert_eq!(pair[1].timestamp - pair[0].timestamp, cadence.unit());
        }
    }

    #[test]
    fn standardize_round_trip(
        values in prop::collection::vec((-1e6f64..1e6, -1e3f64..1e3, 0.0f64..1e3), 1..16),
    ) {
        let x: Vec<f64> = values.iter().map(|v| v.0).collect();
        let means: Vec<f64> = values.iter().map(|v| v.1).collect();
        let stds: Vec<f64> = values.iter().map(|v| v.2).collect();

        let back = destandardize(&standardize(&x, &means, &stds), &means, &stds);
        for (orig, restored) in x.iter().zip(back.iter()) {
            prop_assert!((orig - restored).abs() <= 1e-9 * orig.abs().max(1.0));
        }
    }
}
