//! CSV import into the file store, as run by `lf-ingest --train`

use chrono::{Duration, TimeZone, Utc};
use std::fmt::Write;
use std::sync::Arc;

use load_forecaster::config::Config;
use load_forecaster::controller::{ForecastService, ServiceError};
use load_forecaster::domain::Cadence;
use load_forecaster::ml::ModelError;
use load_forecaster::repo::{
    FileRepository, ModelStateRepository, ObservationRepository, RepoError, Repositories,
};

fn daily_csv(days: i64) -> String {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut csv = String::from("Timestamp,Load\n");
    for i in 0..days {
        let ts = start + Duration::days(i);
        writeln!(csv, "{},{}", ts.format("%Y-%m-%d %H:%M:%S"), 200 + (i % 7) * 10).unwrap();
    }
    csv
}

#[tokio::test]
async fn csv_import_persists_and_trains_daily_model() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("load.csv");
    std::fs::write(&csv_path, daily_csv(70)).unwrap();

    let mut cfg = Config::default();
    cfg.training.model.seed = Some(9);
    cfg.training.model.iterations = 300;

    let data_dir = dir.path().join("store");
    let repo = Arc::new(FileRepository::open(&data_dir).await.unwrap());
    let service = ForecastService::new(cfg, Repositories::shared(repo));

    let file = std::fs::File::open(&csv_path).unwrap();
    assert_eq!(service.import_csv(file).await.unwrap(), 70);

    let report = service.train(Cadence::Daily).await.unwrap();
    assert_eq!(report.samples, 40);

    // daily rows never have an observation one hour earlier
    let hourly = service.train(Cadence::Hourly).await.unwrap_err();
    assert!(matches!(
        hourly,
        ServiceError::Model(ModelError::EmptyTrainingSet)
    ));

    let reopened = FileRepository::open(&data_dir).await.unwrap();
    let observations = reopened.fetch_all_observations().await.unwrap();
    assert_eq!(observations.len(), 70);
    assert_eq!(observations[0].load, Some(200.0));

    let state = reopened.load_model_state(Cadence::Daily).await.unwrap();
    assert_eq!(state.feature_cols, Cadence::Daily.default_feature_cols());
    assert!(matches!(
        reopened.load_model_state(Cadence::Hourly).await,
        Err(RepoError::ModelStateNotFound(Cadence::Hourly))
    ));
}

#[tokio::test]
async fn csv_without_load_column_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FileRepository::open(dir.path()).await.unwrap());
    let service = ForecastService::new(Config::default(), Repositories::shared(repo));

    let err = service
        .import_csv("Timestamp,kw\n2024-01-01 00:00:00,3\n".as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Loader(_)));
    assert!(!dir.path().join("observations.json").exists());
}
