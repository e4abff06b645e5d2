//! End-to-end pipeline runs against a scripted agent

use htool_agent::testing::StubBackend;
use htool_agent::{AgentClient, RetryPolicy};
use htool_core::{ErrorKind, ExtractionWarning, HtoolConfig, RequestBuilder, Warning};
use htool_pipeline::{Opener, Pipeline, Previewer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const DOCUMENT: &str = "<!DOCTYPE html>\n<html><body>converter</body></html>";

fn fenced_reply() -> String {
    format!(
        "Here is your tool:\n\n```html\n{}\n```\n\nOpen it in any browser.",
        DOCUMENT
    )
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_millis(100),
        max_retries: 2,
        backoff: Duration::from_millis(5),
    }
}

struct NoViewer;

impl Opener for NoViewer {
    fn open(&self, _path: &Path) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no default viewer",
        ))
    }
}

fn pipeline(dir: &TempDir, stub: Arc<StubBackend>) -> Pipeline {
    let mut config = HtoolConfig::default();
    config.output.dir = dir.path().to_path_buf();
    Pipeline::new(AgentClient::new(stub, fast_policy()), &config)
        .with_previewer(Previewer::new(NoViewer))
}

fn files_in(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_success_writes_slugged_file() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_reply(fenced_reply()));
    let request = RequestBuilder::new("JSON to YAML converter").build().unwrap();

    let result = pipeline(&dir, stub.clone())
        .run(&request, &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.message);
    assert_eq!(result.exit_code(), 0);
    let path = result.file_path.unwrap();
    assert_eq!(path, dir.path().join("json-to-yaml-converter.html"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), DOCUMENT);
    assert_eq!(result.bytes_written, DOCUMENT.len());
    assert!(result.warnings.is_empty());
    assert!(result.raw_reply.is_none());
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_second_run_gets_suffixed_name() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::replying(fenced_reply()));
    let request = RequestBuilder::new("JSON to YAML converter").build().unwrap();
    let pipeline = pipeline(&dir, stub);

    let first = pipeline.run(&request, &CancellationToken::new()).await;
    let second = pipeline.run(&request, &CancellationToken::new()).await;

    assert_eq!(
        first.file_path.unwrap(),
        dir.path().join("json-to-yaml-converter.html")
    );
    assert_eq!(
        second.file_path.unwrap(),
        dir.path().join("json-to-yaml-converter-2.html")
    );
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_reply_without_block_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_reply("Sorry, I can't help with that."));
    let request = RequestBuilder::new("timer").build().unwrap();

    let result = pipeline(&dir, stub)
        .run(&request, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::NoArtifactFound));
    assert_eq!(result.exit_code(), 1);
    assert!(result.file_path.is_none());
    assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn test_existing_output_without_force_is_untouched() {
    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("mine.html");
    std::fs::write(&existing, "keep me").unwrap();

    let stub = Arc::new(StubBackend::new().then_reply(fenced_reply()));
    let request = RequestBuilder::new("timer")
        .output(Some(existing.clone()))
        .build()
        .unwrap();

    let result = pipeline(&dir, stub)
        .run(&request, &CancellationToken::new())
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::OutputExists));
    assert_eq!(result.exit_code(), 3);
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), "keep me");
    assert_eq!(files_in(&dir), vec!["mine.html".to_string()]);
}

#[tokio::test]
async fn test_existing_output_with_force_is_replaced() {
    let dir = TempDir::new().unwrap();
    let existing = dir.path().join("mine.html");
    std::fs::write(&existing, "old").unwrap();

    let stub = Arc::new(StubBackend::new().then_reply(fenced_reply()));
    let request = RequestBuilder::new("timer")
        .output(Some(existing.clone()))
        .force(true)
        .build()
        .unwrap();

    let result = pipeline(&dir, stub)
        .run(&request, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(std::fs::read_to_string(&existing).unwrap(), DOCUMENT);
}

#[tokio::test]
async fn test_two_timeouts_then_success() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(
        StubBackend::new()
            .then_hang()
            .then_hang()
            .then_reply(fenced_reply()),
    );
    let request = RequestBuilder::new("color picker").build().unwrap();

    let result = pipeline(&dir, stub.clone())
        .run(&request, &CancellationToken::new())
        .await;

    assert!(result.success, "{:?}", result.message);
    assert_eq!(stub.calls(), 3);
    assert!(dir.path().join("color-picker.html").exists());
}

#[tokio::test]
async fn test_cancel_while_agent_pending() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_hang());
    let request = RequestBuilder::new("color picker").build().unwrap();

    let mut config = HtoolConfig::default();
    config.output.dir = dir.path().to_path_buf();
    let policy = RetryPolicy {
        timeout: Duration::from_secs(30),
        ..fast_policy()
    };
    let pipeline = Pipeline::new(AgentClient::new(stub, policy), &config);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&request, &cancel))
        .await
        .expect("cancellation should end the run promptly");

    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(result.exit_code(), 4);
    assert!(files_in(&dir).is_empty());
}

#[tokio::test]
async fn test_rejection_is_agent_failure() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_reject("invalid api key"));
    let request = RequestBuilder::new("timer").build().unwrap();

    let result = pipeline(&dir, stub.clone())
        .run(&request, &CancellationToken::new())
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::AgentInvocation));
    assert_eq!(result.exit_code(), 2);
    assert!(result.message.unwrap().contains("invalid api key"));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_preview_failure_keeps_success() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_reply(fenced_reply()));
    let request = RequestBuilder::new("timer").preview(true).build().unwrap();

    let result = pipeline(&dir, stub)
        .run(&request, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.exit_code(), 0);
    assert!(matches!(
        result.warnings.as_slice(),
        [Warning::PreviewLaunch(reason)] if reason.contains("no default viewer")
    ));
}

#[tokio::test]
async fn test_verbose_keeps_reply_trace_and_warnings() {
    let dir = TempDir::new().unwrap();
    let stub = Arc::new(StubBackend::new().then_reply("```html\n<div>fragment</div>\n```"));
    let request = RequestBuilder::new("fragment").verbose(true).build().unwrap();

    let result = pipeline(&dir, stub)
        .run(&request, &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(
        result.raw_reply.as_deref(),
        Some("```html\n<div>fragment</div>\n```")
    );
    assert!(!result.trace.is_empty());
    assert_eq!(
        result.warnings,
        vec![Warning::Extraction(ExtractionWarning::MissingDocumentRoot)]
    );
}
