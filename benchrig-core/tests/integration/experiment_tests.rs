//! End-to-end runs of planned configurations against local fake binaries

use std::path::Path;
use std::time::Duration;

use benchrig_core::experiment::{Launch, ResultWriter, RolePlan, RunPlan, run_experiment, run_plan};
use benchrig_core::results::{ResultKind, summarize_reader};
use benchrig_core::{BenchConfig, BenchError, MetricError, MetricSpec, ProcessError, Solar, Target};

use super::support::{marker, script};

/// Configuration that runs everything locally with short delays
fn local_config(workdir: &Path) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.workdir = workdir.to_path_buf();
    config.ssh.elevate = false;
    config.nodes.host1 = "localhost".to_string();
    config.nodes.host2 = "localhost".to_string();
    config.nodes.bf1 = "localhost".to_string();
    config.nodes.bf2 = "localhost".to_string();
    config.timing.startup_delay_secs = 0.2;
    config.timing.sampler_start_delay_secs = 0.2;
    config.timing.cleanup_delay_secs = 0.0;
    config.timing.stop_wait_secs = 1.0;
    config
}

fn role(
    role: &'static str,
    binary: &str,
    launch: Launch,
    log_dir: &Path,
    settle: Duration,
) -> RolePlan {
    RolePlan {
        role,
        node: "local",
        target: Target::local(),
        argv: vec![format!("./{binary}")],
        log_path: log_dir.join(format!("{role}.log")),
        launch,
        binary: binary.to_string(),
        settle,
    }
}

fn plan(roles: Vec<RolePlan>, binaries: Vec<String>) -> RunPlan {
    RunPlan {
        run_tag: "local_run0".to_string(),
        index: 0,
        port: 45000,
        roles,
        timeout: Duration::from_secs(20),
        metric: MetricSpec::new("total_gbps"),
        cleanup_targets: vec![Target::local()],
        cleanup_binaries: binaries,
    }
}

fn still_running(tag: &str) -> bool {
    std::process::Command::new("pgrep")
        .args(["-f", tag])
        .status()
        .is_ok_and(|s| s.success())
}

#[tokio::test]
async fn run_extracts_metric_and_stops_background_roles() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let server = marker("server");
    let relay = marker("relay");
    script(dir.path(), &server, "echo server up\nwhile :; do sleep 0.1; done");
    script(
        dir.path(),
        &relay,
        "echo relay up\necho 'RESULT|total_gbps=12.5|threads=2'",
    );

    let logs = dir.path().join("logs");
    let plan = plan(
        vec![
            role("server", &server, Launch::Background, &logs, Duration::from_millis(200)),
            role("relay", &relay, Launch::Key, &logs, Duration::ZERO),
        ],
        vec![server.clone(), relay.clone()],
    );

    let outcome = run_plan(&plan, &config).await.unwrap();
    assert_eq!(outcome.metric, 12.5);
    assert!(outcome.memory.is_none());

    let relay_log = std::fs::read_to_string(logs.join("relay.log")).unwrap();
    assert!(relay_log.contains("RESULT|total_gbps=12.5"));
    let server_log = std::fs::read_to_string(logs.join("server.log")).unwrap();
    assert!(server_log.contains("server up"));
    assert!(!still_running(&server));
}

#[tokio::test]
async fn failing_key_role_reports_exit_code_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let server = marker("server");
    let relay = marker("relay");
    script(dir.path(), &server, "while :; do sleep 0.1; done");
    script(dir.path(), &relay, "echo 'connect failed' >&2\nexit 3");

    let logs = dir.path().join("logs");
    let plan = plan(
        vec![
            role("server", &server, Launch::Background, &logs, Duration::from_millis(200)),
            role("relay", &relay, Launch::Key, &logs, Duration::ZERO),
        ],
        vec![server.clone()],
    );

    let err = run_plan(&plan, &config).await.unwrap_err();
    match err {
        BenchError::Process(ProcessError::NonZeroExit {
            role, code, log_path,
        }) => {
            assert_eq!(role, "Relay");
            assert_eq!(code, 3);
            assert_eq!(log_path, logs.join("relay.log"));
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
    assert!(
        std::fs::read_to_string(logs.join("relay.log"))
            .unwrap()
            .contains("connect failed")
    );
    assert!(!still_running(&server));
}

#[tokio::test]
async fn missing_metric_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let relay = marker("relay");
    script(dir.path(), &relay, "echo 'no result here'");

    let logs = dir.path().join("logs");
    let plan = plan(
        vec![role("relay", &relay, Launch::Key, &logs, Duration::ZERO)],
        Vec::new(),
    );

    let err = run_plan(&plan, &config).await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::Metric(MetricError::MetricNotFound { ref key, .. }) if key == "total_gbps"
    ));
}

#[tokio::test]
async fn sampler_log_is_summarized() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config(dir.path());
    let sampler = marker("bwmon");
    let relay = marker("relay");
    script(
        dir.path(),
        &sampler,
        "for i in 1 2 3; do echo 'Read: 200.00 MB/s   Write: 100.00 MB/s'; done\n\
         while :; do sleep 0.1; done",
    );
    script(
        dir.path(),
        &relay,
        "sleep 0.2\necho 'RESULT|total_gbps=40.0'",
    );

    let logs = dir.path().join("logs");
    let plan = plan(
        vec![
            role("memory", &sampler, Launch::Sampler, &logs, Duration::from_millis(300)),
            role("relay", &relay, Launch::Key, &logs, Duration::ZERO),
        ],
        vec![sampler.clone()],
    );

    let outcome = run_plan(&plan, &config).await.unwrap();
    assert_eq!(outcome.metric, 40.0);
    let memory = outcome.memory.unwrap();
    assert_eq!(memory.sample_count, 3);
    assert!((memory.avg_total - 300.0).abs() < 1e-9);
    assert!((memory.active_avg_total - 300.0).abs() < 1e-9);
    assert!(!still_running(&sampler));
}

#[tokio::test]
async fn solar_sweep_writes_rows_that_summarize() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = local_config(dir.path());
    config.solar.types = vec![0];
    config.solar.thread_start = 1;
    config.solar.thread_end = 2;

    std::fs::create_dir_all(dir.path().join("build_host")).unwrap();
    script(
        &dir.path().join("build_host"),
        "solar_bench",
        "case \" $* \" in\n\
         *\" -is_server \"*) while :; do sleep 0.1; done ;;\n\
         *) echo 'Total Speed: 3.25 Mops' ;;\n\
         esac",
    );

    let solar = Solar::new(&config);
    let header = benchrig_core::Experiment::header(&solar);
    let mut writer = ResultWriter::from_writer(Vec::new(), &header).unwrap();
    let logs = dir.path().join("logs");

    let rows = run_experiment(&solar, &config, &logs, &mut writer)
        .await
        .unwrap();
    assert_eq!(rows, 2);
    assert!(logs.join("type0_threads1_run0_host1_client.log").exists());
    assert!(logs.join("type0_threads2_run1_host2_server.log").exists());

    let csv = writer.into_inner().unwrap();
    let summary = summarize_reader(csv.as_slice(), ResultKind::Solar, "solar.csv").unwrap();
    assert_eq!(summary.throughput.len(), 1);
    let series = &summary.throughput[0];
    assert_eq!(series.label, "CPU-only");
    assert_eq!(series.points.len(), 2);
    assert!(series.points.iter().all(|p| (p.mean - 3.25).abs() < 1e-9 && p.runs == 1));
    assert_eq!(summary.x_values(), vec![1.0, 2.0]);
}
