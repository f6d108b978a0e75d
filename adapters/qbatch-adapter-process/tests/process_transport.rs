//! Integration tests for ProcessTransport against shell-script engines.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qbatch_adapter_process::ProcessTransport;
use qbatch_core::{
    EngineBackend, ExecParams, Experiment, JobRequest, ReturnKind, Transport, TransportError,
    WorkerPool,
};

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

const ENGINE_OK: &str = r#"cat > /dev/null
echo '{"engine_version": "1.0.1", "counts": {"0 1": 3, "1 0": 7}, "time_taken": 0.5}'"#;

#[tokio::test]
async fn test_engine_output_returned() {
    let dir = tempfile::tempdir().unwrap();
    let engine = script(dir.path(), "engine", ENGINE_OK);

    let transport = ProcessTransport::new(&engine);
    let body = transport
        .execute(b"{}", &ExecParams::new("Exp_1_j", 10))
        .await
        .expect("execute failed");
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["engine_version"], "1.0.1");
}

#[tokio::test]
async fn test_arguments_and_stdin_reach_engine() {
    let dir = tempfile::tempdir().unwrap();
    let record = dir.path().join("args.txt");
    let stdin_copy = dir.path().join("stdin.json");
    let engine = script(
        dir.path(),
        "engine",
        &format!(
            "echo \"$@\" > {}\ncat > {}\necho '{{}}'",
            record.display(),
            stdin_copy.display()
        ),
    );

    let params = ExecParams::new("Exp_1_j", 1)
        .with_return(ReturnKind::State)
        .with_seed(9);
    ProcessTransport::new(&engine)
        .execute(br#"{"qobj_id":"x"}"#, &params)
        .await
        .expect("execute failed");

    let args = std::fs::read_to_string(&record).unwrap();
    assert_eq!(args.trim(), "- -s 1 -r counts state --seed 9");
    let stdin = std::fs::read_to_string(&stdin_copy).unwrap();
    assert_eq!(stdin, r#"{"qobj_id":"x"}"#);
}

#[tokio::test]
async fn test_nonzero_exit_is_error_despite_output() {
    let dir = tempfile::tempdir().unwrap();
    let engine = script(
        dir.path(),
        "engine",
        &format!("{ENGINE_OK}\necho 'bad gate' >&2\nexit 3"),
    );

    let err = ProcessTransport::new(&engine)
        .execute(b"{}", &ExecParams::new("Exp_1_j", 10))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::ExitStatus {
            code: Some(3),
            stderr: "bad gate".into(),
        }
    );
    assert!(err.to_string().contains("exit code: 3"));
}

#[tokio::test]
async fn test_engine_ignoring_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let engine = script(dir.path(), "engine", "echo '{}'");

    let payload = vec![b' '; 1 << 20];
    let body = ProcessTransport::new(&engine)
        .execute(&payload, &ExecParams::new("Exp_1_j", 10))
        .await
        .expect("execute failed");
    assert_eq!(String::from_utf8(body).unwrap().trim(), "{}");
}

#[tokio::test]
async fn test_missing_executable() {
    let dir = tempfile::tempdir().unwrap();
    let err = ProcessTransport::new(dir.path().join("no-such-engine"))
        .execute(b"{}", &ExecParams::new("Exp_1_j", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Spawn { .. }));
}

#[tokio::test]
async fn test_backend_over_process() {
    let dir = tempfile::tempdir().unwrap();
    let engine = script(dir.path(), "engine", ENGINE_OK);

    let backend = EngineBackend::new(Arc::new(ProcessTransport::new(&engine)))
        .with_pool(Arc::new(WorkerPool::new(2)));
    let job = backend
        .run(
            JobRequest::new("local")
                .with_experiment(Experiment::new("a"))
                .with_experiment(Experiment::new("b")),
        )
        .unwrap();

    let result = job.result(None).await.unwrap();
    assert_eq!(result.engine_version, "1.0.1");
    let counts = result.get_counts("b").unwrap();
    assert_eq!(counts.get("0x1"), Some(&3));
    assert_eq!(counts.get("0x2"), Some(&7));
}
