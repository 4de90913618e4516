//! Train-then-evaluate against an on-disk tracking directory

use rastreo::config::TrackingConfig;
use rastreo::data::{write_parquet, Dataset, SyntheticLinear};
use rastreo::experiment::{FileTrackingStore, RunStatus, TrackingStore};
use rastreo::model::LassoParams;
use rastreo::pipeline::{
    evaluate, log_evaluation, train, EvaluateOptions, TrainOptions, MODEL_ARTIFACT,
};
use rastreo::tracking::{ArtifactUri, TrackingClient};

fn file_client(dir: &std::path::Path) -> TrackingClient<FileTrackingStore> {
    let config = TrackingConfig::default().with_tracking_dir(dir.join("mlruns"));
    TrackingClient::new(config.open_store())
}

#[test]
fn test_train_then_evaluate() {
    let dir = tempfile::tempdir().unwrap();

    let trained = {
        let client = file_client(dir.path());
        train(&client, &TrainOptions::new(LassoParams::new(0.5, 1000), "lasso")).unwrap()
    };
    assert!(trained.model.converged);
    assert!((trained.model.coef[0] - 3.0).abs() < 0.5);

    // Separate client, as in a separate process
    let client = file_client(dir.path());
    let report = evaluate(&client, &EvaluateOptions::new("lasso")).unwrap();
    assert_eq!(report.run_id, trained.run_id);
    assert_eq!(
        report.model_uri.to_string(),
        format!("runs:/{}/{MODEL_ARTIFACT}", trained.run_id)
    );
    assert!(report.r2 > 0.8, "r2 = {}", report.r2);
    assert!(report.mse > 0.0);

    log_evaluation(&client, &report).unwrap();
    let metrics = client.store().latest_metrics(&report.run_id).unwrap();
    assert_eq!(metrics["mse"], report.mse);
    assert_eq!(metrics["r2"], report.r2);
    assert!(metrics.contains_key("test_mse"));
}

#[test]
fn test_model_uri_loads_after_training() {
    let dir = tempfile::tempdir().unwrap();
    let client = file_client(dir.path());
    let trained = train(&client, &TrainOptions::new(LassoParams::new(0.5, 1000), "lasso")).unwrap();

    let uri: ArtifactUri = format!("runs:/{}/lasso_model", trained.run_id).parse().unwrap();
    assert_eq!(client.load_model(&uri).unwrap(), trained.model);
}

#[test]
fn test_evaluate_picks_most_recent_training() {
    let dir = tempfile::tempdir().unwrap();
    let client = file_client(dir.path());

    train(&client, &TrainOptions::new(LassoParams::new(100.0, 1000), "lasso")).unwrap();
    let second = train(&client, &TrainOptions::new(LassoParams::new(0.1, 1000), "lasso")).unwrap();

    let report = evaluate(&client, &EvaluateOptions::new("lasso")).unwrap();
    assert_eq!(report.run_id, second.run_id);
    assert!(report.r2 > 0.8);
}

#[test]
fn test_evaluate_missing_experiment_fails() {
    let dir = tempfile::tempdir().unwrap();
    let client = file_client(dir.path());
    let err = evaluate(&client, &EvaluateOptions::new("never-trained")).unwrap_err();
    assert!(err.is_not_found());
    assert!(!dir.path().join("mlruns").exists());
}

#[test]
fn test_train_and_evaluate_on_parquet_files() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.parquet");
    let test_path = dir.path().join("test.parquet");
    write_parquet(&SyntheticLinear::training().generate().unwrap(), &train_path).unwrap();
    write_parquet(&SyntheticLinear::held_out().generate().unwrap(), &test_path).unwrap();

    let client = file_client(dir.path());
    let mut options = TrainOptions::new(LassoParams::new(0.5, 1000), "files");
    options.data = Some(train_path.clone());
    let trained = train(&client, &options).unwrap();

    let run = client.store().get_run(&trained.run_id).unwrap().unwrap();
    assert_eq!(run.status(), RunStatus::Success);
    assert_eq!(
        run.tags().get("data_source").map(String::as_str),
        Some(train_path.display().to_string().as_str())
    );

    let report = evaluate(
        &client,
        &EvaluateOptions {
            experiment_name: "files".to_string(),
            test_data: Some(test_path),
        },
    )
    .unwrap();
    assert_eq!(report.n_samples, 20);
    assert!(report.r2 > 0.8);
}

#[test]
fn test_feature_mismatch_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let client = file_client(dir.path());
    train(&client, &TrainOptions::new(LassoParams::new(0.5, 1000), "lasso")).unwrap();

    let two_features = Dataset::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]], vec![1.0, 2.0]).unwrap();
    let path = dir.path().join("wide.parquet");
    write_parquet(&two_features, &path).unwrap();

    let options = EvaluateOptions {
        experiment_name: "lasso".to_string(),
        test_data: Some(path),
    };
    let err = evaluate(&client, &options).unwrap_err();
    assert!(err.to_string().contains("expects 1 features"));
}
