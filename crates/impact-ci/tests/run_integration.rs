//! Integration tests for full runs with shell-script toolchains.

use impact_ci::{CommandTemplate, ImpactRun, TemplateToolchain};
use impact_core::{
    write_report, Classification, ImpactConfig, ReportFormat, RunCompletion, RunHeader,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn sh(script: &str) -> CommandTemplate {
    CommandTemplate::new(&["sh", "-c", script])
}

fn toolchain(fetch: &str, test: &str, patch: &str) -> Arc<TemplateToolchain> {
    Arc::new(TemplateToolchain::new(sh(fetch), sh(test), sh(patch)))
}

fn config(root: &Path, concurrency: usize, timeout: Duration) -> ImpactConfig {
    let mut config = ImpactConfig::new("lib").absolutize(root);
    config.concurrency = concurrency;
    config.fetch_timeout = timeout;
    config
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Test: every item is processed exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_item_replies_once() {
    let root = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..20).map(|i| format!("pkg{i}")).collect();

    let run = ImpactRun::new(
        toolchain("true", "true", "true"),
        &config(root.path(), 4, Duration::from_secs(30)),
    );
    let outcome = run
        .execute(names, CancellationToken::new())
        .await
        .expect("run failed");

    assert_eq!(outcome.completion, RunCompletion::AllReplied);
    assert_eq!(outcome.state.received(), 20);
    assert_eq!(outcome.state.count(Classification::Passed), 20);

    let indices: BTreeSet<usize> = outcome
        .state
        .replies()
        .iter()
        .map(|r| r.item.index)
        .collect();
    assert_eq!(indices, (0..20).collect());
    for reply in outcome.state.replies() {
        assert_eq!(reply.item.identifier, format!("pkg{}", reply.item.index));
        assert!(reply.worker < 4);
    }
}

/// Test: a slow fetch times out without holding back other items
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fetch_timeout_is_isolated() {
    let root = tempfile::tempdir().unwrap();
    let run = ImpactRun::new(
        toolchain(
            "case {identifier} in b) sleep 30;; esac",
            "true",
            "true",
        ),
        &config(root.path(), 3, Duration::from_millis(300)),
    );

    let start = Instant::now();
    let outcome = run
        .execute(ids(&["a", "b", "c"]), CancellationToken::new())
        .await
        .expect("run failed");
    assert!(start.elapsed() < Duration::from_secs(10));

    assert_eq!(outcome.completion, RunCompletion::AllReplied);
    assert_eq!(outcome.state.count(Classification::Passed), 2);
    assert_eq!(outcome.state.count(Classification::FetchTimedOut), 1);

    let b = outcome
        .state
        .replies()
        .iter()
        .find(|r| r.item.identifier == "b")
        .expect("b replied");
    assert_eq!(b.item.index, 1);
    assert_eq!(b.classification, Classification::FetchTimedOut);
}

/// Test: interrupt reports only what has arrived and returns promptly
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interrupt_reports_partial_results() {
    let root = tempfile::tempdir().unwrap();
    let run = ImpactRun::new(
        toolchain(
            "true",
            "case {identifier} in slow*) sleep 30;; esac",
            "true",
        ),
        &config(root.path(), 4, Duration::from_secs(30)),
    );

    let interrupt = CancellationToken::new();
    let handle = run.start(ids(&["fast1", "slow1", "fast2", "slow2"]), interrupt.clone());
    let mut progress = handle.progress();
    progress.wait_for(|n| *n >= 2).await.unwrap();

    let start = Instant::now();
    interrupt.cancel();
    let outcome = handle.wait().await.expect("run failed");
    assert!(start.elapsed() < Duration::from_secs(5));

    assert_eq!(outcome.completion, RunCompletion::Interrupted);
    assert!(!outcome.is_complete());
    assert_eq!(outcome.state.received(), 2);
    assert_eq!(outcome.state.expected(), 4);
    assert!(outcome
        .state
        .replies()
        .iter()
        .all(|r| r.item.identifier.starts_with("fast")));
}

/// Test: an empty package list completes immediately
#[tokio::test]
async fn test_empty_run_completes() {
    let root = tempfile::tempdir().unwrap();
    let run = ImpactRun::new(
        toolchain("true", "true", "true"),
        &config(root.path(), 2, Duration::from_secs(30)),
    );

    let outcome = run
        .execute(Vec::new(), CancellationToken::new())
        .await
        .expect("run failed");

    assert_eq!(outcome.completion, RunCompletion::AllReplied);
    assert_eq!(outcome.state.received(), 0);
}

/// Test: no more than `concurrency` items are in flight at once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_bounded() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("active")).unwrap();

    let test = "mkdir {workspace}/../active/{index} 2>/dev/null; \
                ls {workspace}/../active | wc -l >> {workspace}/../counts; \
                sleep 0.2; \
                rmdir {workspace}/../active/{index} 2>/dev/null; true";
    let run = ImpactRun::new(
        toolchain("true", test, "true"),
        &config(root.path(), 2, Duration::from_secs(30)),
    );

    let outcome = run
        .execute(
            ids(&["a", "b", "c", "d", "e", "f"]),
            CancellationToken::new(),
        )
        .await
        .expect("run failed");
    assert_eq!(outcome.state.count(Classification::Passed), 6);

    let counts = std::fs::read_to_string(root.path().join("counts")).unwrap();
    let max = counts
        .lines()
        .filter_map(|l| l.trim().parse::<usize>().ok())
        .max()
        .unwrap();
    assert!(max >= 1);
    assert!(max <= 2, "observed {max} concurrent items");
}

/// Test: mixed outcomes land in the text and JSON reports
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_report_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let run = ImpactRun::new(
        toolchain(
            "case {identifier} in nofetch) exit 1;; esac",
            "case {identifier} in broken) exit 1;; esac",
            "true",
        ),
        &config(root.path(), 2, Duration::from_secs(30)),
    );

    let outcome = run
        .execute(ids(&["ok", "nofetch", "broken"]), CancellationToken::new())
        .await
        .expect("run failed");
    assert_eq!(outcome.completion, RunCompletion::AllReplied);

    let text_path = root.path().join("report.txt");
    write_report(
        &text_path,
        ReportFormat::Text,
        RunHeader::new("lib", None),
        &outcome.state,
        outcome.completion,
    )
    .unwrap();
    let text = std::fs::read_to_string(&text_path).unwrap();
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "0000, P!, ok, ");
    assert_eq!(lines[1], "0001, FF, nofetch, \"fetch exited with status 1\"");
    assert!(lines[2].starts_with("0002, F1, broken, \"pre-patch tests exited with status 1"));

    let json_path = root.path().join("report.json");
    write_report(
        &json_path,
        ReportFormat::Json,
        RunHeader::new("lib", Some("abc".to_string())),
        &outcome.state,
        outcome.completion,
    )
    .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["received"], 3);
    assert_eq!(json["summary"]["P!"], 1);
    assert_eq!(json["summary"]["FF"], 1);
    assert_eq!(json["summary"]["F1"], 1);
    assert_eq!(json["patch_digest"], "abc");
}

/// Test: an interrupted run leaves no stage descendants behind once the
/// runtime is gone
#[cfg(unix)]
#[test]
fn test_interrupted_descendants_die_with_runtime() {
    let root = tempfile::tempdir().unwrap();
    let started = root.path().join("started");
    let marker = root.path().join("descendant-finished");
    let test = format!(
        "case {{identifier}} in slow) touch '{}'; (sleep 2; touch '{}') & wait;; esac",
        started.display(),
        marker.display()
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let outcome = rt.block_on(async {
        let run = ImpactRun::new(
            toolchain("true", &test, "true"),
            &config(root.path(), 2, Duration::from_secs(30)),
        );
        let interrupt = CancellationToken::new();
        let handle = run.start(ids(&["fast", "slow"]), interrupt.clone());

        let mut progress = handle.progress();
        progress.wait_for(|n| *n >= 1).await.unwrap();
        for _ in 0..100 {
            if started.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(started.exists(), "slow item never reached its test stage");

        interrupt.cancel();
        handle.wait().await.expect("run failed")
    });
    assert_eq!(outcome.completion, RunCompletion::Interrupted);
    assert_eq!(outcome.state.received(), 1);

    drop(rt);
    std::thread::sleep(Duration::from_secs(3));
    assert!(
        !marker.exists(),
        "descendant of an interrupted item outlived the runtime"
    );
}
