//! Runs commands end to end against a snapshot in a temporary directory.

use clap::Parser;
use novel_admin::AdminConfig;
use novel_admin_cli::{Cli, CliError, run};
use novel_admin_core::AdminError;
use std::path::Path;

async fn exec(data: &Path, args: &[&str]) -> Result<String, CliError> {
    let data = data.to_string_lossy().to_string();
    let mut argv = vec![
        "novel-admin",
        "--data",
        data.as_str(),
        "--email",
        "ops@example.com",
        "--password",
        "secret",
    ];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    run(cli, AdminConfig::default()).await
}

async fn seeded(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let data = dir.path().join("state.json");
    exec(
        &data,
        &["user", "add", "ops@example.com", "--new-password", "secret", "--role", "admin"],
    )
    .await
    .unwrap();
    data
}

#[tokio::test]
async fn test_category_ordering_persists() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;

    for name in ["Fantasy", "Romance", "Sci-Fi"] {
        exec(&data, &["category", "add", name]).await.unwrap();
    }
    let listed = exec(&data, &["--json", "category", "list"]).await.unwrap();
    let categories: Vec<serde_json::Value> = serde_json::from_str(&listed).unwrap();
    let last_id = categories[2]["id"].as_str().unwrap().to_string();

    exec(&data, &["category", "up", last_id.as_str()]).await.unwrap();

    let listed = exec(&data, &["--json", "category", "list"]).await.unwrap();
    let categories: Vec<serde_json::Value> = serde_json::from_str(&listed).unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Fantasy", "Sci-Fi", "Romance"]);
}

#[tokio::test]
async fn test_sign_ins_show_up_as_visits() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;
    exec(&data, &["category", "list"]).await.unwrap();

    let today = chrono::Utc::now().date_naive().to_string();
    let output = exec(&data, &["--json", "stats", "visits", "--from", today.as_str(), "--to", today.as_str()])
        .await
        .unwrap();
    let buckets: Vec<serde_json::Value> = serde_json::from_str(&output).unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0]["event_count"], 2);
    assert_eq!(buckets[0]["distinct_actor_count"], 1);
}

#[tokio::test]
async fn test_delete_needs_yes() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;
    exec(&data, &["category", "add", "Horror"]).await.unwrap();
    let listed = exec(&data, &["--json", "category", "list"]).await.unwrap();
    let categories: Vec<serde_json::Value> = serde_json::from_str(&listed).unwrap();
    let id = categories[0]["id"].as_str().unwrap().to_string();

    let refused = exec(&data, &["category", "delete", id.as_str()]).await;
    assert!(matches!(
        refused,
        Err(CliError::Admin(AdminError::ConfirmationRequired { .. }))
    ));
    let output = exec(&data, &["category", "delete", id.as_str(), "--yes"]).await.unwrap();
    assert!(output.is_empty());
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;
    let cli = Cli::try_parse_from([
        "novel-admin",
        "--data",
        data.to_str().unwrap(),
        "--email",
        "ops@example.com",
        "--password",
        "wrong",
        "category",
        "list",
    ])
    .unwrap();
    let result = run(cli, AdminConfig::default()).await;
    assert!(matches!(result, Err(CliError::Admin(AdminError::InvalidCredentials))));
}

#[tokio::test]
async fn test_export_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;
    exec(&data, &["user", "add", "reader@example.com", "--new-password", "pw"])
        .await
        .unwrap();
    let users = exec(&data, &["--json", "user", "list", "--search", "reader"]).await.unwrap();
    let page: serde_json::Value = serde_json::from_str(&users).unwrap();
    let reader = page["items"][0]["id"].as_str().unwrap().to_string();

    exec(&data, &["user", "balance", reader.as_str(), "100", "--note", "welcome"])
        .await
        .unwrap();
    exec(&data, &["user", "balance", reader.as_str(), "-40", "--note", "refund"])
        .await
        .unwrap();

    let out = dir.path().join("transactions.csv");
    let message = exec(&data, &["transactions", "export", "--out", out.to_str().unwrap()])
        .await
        .unwrap();
    assert!(message.starts_with("wrote 2 transactions"));
    let csv = std::fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("\"id\",\"user_id\",\"amount\""));
    assert!(csv.contains(",-40,\"adjustment\",\"refund\","));
}

#[tokio::test]
async fn test_out_of_range_arguments_are_usage_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = seeded(&dir).await;

    let summary = exec(&data, &["stats", "summary", "--days", "4294967295"]).await;
    match summary {
        Err(err) => {
            assert!(matches!(err, CliError::Admin(AdminError::InvalidRange { .. })));
            assert_eq!(err.exit_code(), 2);
        }
        Ok(output) => panic!("expected an error, got {}", output),
    }

    let users = exec(&data, &["user", "list", "--page", "18446744073709551615"]).await;
    assert!(matches!(
        users,
        Err(CliError::Admin(AdminError::Validation { .. }))
    ));
}
