use super::*;
use crate::history::HistoryLog;
use crate::session::SessionRegistry;
use crate::shell::ShellResolver;
use tempfile::TempDir;

async fn setup() -> (CommandExecutor, Arc<SessionRegistry>, Uuid, TempDir) {
    let registry = Arc::new(SessionRegistry::new());
    let history = Arc::new(HistoryLog::default());
    let shells = Arc::new(ShellResolver::new());
    let executor = CommandExecutor::new(Arc::clone(&registry), history, shells);

    let dir = tempfile::tempdir().unwrap();
    let view = registry.create().await;
    registry
        .set_working_dir(view.id, dir.path().to_str().unwrap())
        .await
        .unwrap();

    (executor, registry, view.id, dir)
}

fn request(command: &str) -> CommandRequest {
    CommandRequest {
        command: command.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_echo() {
    let (executor, _registry, id, _dir) = setup().await;

    let output = executor.execute(id, &request("echo hi")).await.unwrap();
    assert_eq!(output.exit_code, 0);
    assert_eq!(output.stdout, "hi\n");
    assert_eq!(output.stderr, "");
    assert_eq!(output.command, "echo hi");
    assert!(output.execution_time >= 0.0);
}

#[tokio::test]
async fn test_runs_in_working_dir() {
    let (executor, _registry, id, dir) = setup().await;

    let output = executor.execute(id, &request("pwd")).await.unwrap();
    let reported = std::path::PathBuf::from(output.stdout.trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        dir.path().canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_nonzero_exit_code() {
    let (executor, _registry, id, _dir) = setup().await;

    let output = executor.execute(id, &request("exit 3")).await.unwrap();
    assert_eq!(output.exit_code, 3);
}

#[tokio::test]
async fn test_stderr_captured() {
    let (executor, _registry, id, _dir) = setup().await;

    let output = executor
        .execute(id, &request("echo oops 1>&2"))
        .await
        .unwrap();
    assert_eq!(output.stdout, "");
    assert_eq!(output.stderr, "oops\n");
}

#[tokio::test]
async fn test_env_composition_request_wins() {
    let (executor, registry, id, _dir) = setup().await;

    registry.set_env(id, "A", "s").await.unwrap();

    let mut req = request("echo $A $B");
    req.environment.insert("A".to_string(), "r".to_string());
    req.environment.insert("B".to_string(), "b".to_string());

    let output = executor.execute(id, &req).await.unwrap();
    assert_eq!(output.stdout, "r b\n");
}

#[tokio::test]
async fn test_session_env_persists_per_call_env_does_not() {
    let (executor, registry, id, _dir) = setup().await;

    registry.set_env(id, "KEPT", "yes").await.unwrap();

    let mut req = request("echo $KEPT $EPHEMERAL");
    req.environment
        .insert("EPHEMERAL".to_string(), "once".to_string());
    let output = executor.execute(id, &req).await.unwrap();
    assert_eq!(output.stdout, "yes once\n");

    let output = executor
        .execute(id, &request("echo $KEPT $EPHEMERAL"))
        .await
        .unwrap();
    assert_eq!(output.stdout, "yes\n");
}

#[tokio::test]
async fn test_timeout_kills_command() {
    let (executor, _registry, id, _dir) = setup().await;

    let mut req = request("sleep 10");
    req.timeout = 1;

    let started = std::time::Instant::now();
    let output = executor.execute(id, &req).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_ne!(output.exit_code, 0);
    assert!(output.execution_time >= 1.0 && output.execution_time < 3.0);
}

#[tokio::test]
async fn test_requires_working_dir() {
    let registry = Arc::new(SessionRegistry::new());
    let executor = CommandExecutor::new(
        Arc::clone(&registry),
        Arc::new(HistoryLog::default()),
        Arc::new(ShellResolver::new()),
    );
    let view = registry.create().await;

    let err = executor.execute(view.id, &request("true")).await.unwrap_err();
    assert!(matches!(err, Error::FailedPrecondition(_)));
}

#[tokio::test]
async fn test_unknown_session() {
    let (executor, _registry, _id, _dir) = setup().await;

    let err = executor
        .execute(Uuid::new_v4(), &request("true"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_commands_recorded_in_history() {
    let registry = Arc::new(SessionRegistry::new());
    let history = Arc::new(HistoryLog::default());
    let executor = CommandExecutor::new(
        Arc::clone(&registry),
        Arc::clone(&history),
        Arc::new(ShellResolver::new()),
    );

    let dir = tempfile::tempdir().unwrap();
    let view = registry.create().await;
    registry
        .set_working_dir(view.id, dir.path().to_str().unwrap())
        .await
        .unwrap();

    executor.execute(view.id, &request("echo one")).await.unwrap();
    executor.execute(view.id, &request("echo two")).await.unwrap();

    let entries = history.recent(view.id, 0).await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].command, "echo one");
}

#[tokio::test]
async fn test_batch_stops_on_failure() {
    let (executor, _registry, id, _dir) = setup().await;

    let req = BatchCommandRequest {
        commands: vec!["false".into(), "echo unreachable".into()],
        continue_on_error: false,
        timeout: 0,
        environment: HashMap::new(),
    };

    let results = executor.execute_batch(id, &req).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_ne!(results[0].exit_code, 0);
}

#[tokio::test]
async fn test_batch_continue_on_error() {
    let (executor, _registry, id, _dir) = setup().await;

    let req = BatchCommandRequest {
        commands: vec!["false".into(), "echo survived".into()],
        continue_on_error: true,
        timeout: 0,
        environment: HashMap::new(),
    };

    let results = executor.execute_batch(id, &req).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].exit_code, 0);
    assert_eq!(results[1].stdout, "survived\n");
}

#[test]
fn test_command_output_serializes_camel_case() {
    let output = CommandOutput {
        exit_code: 0,
        stdout: "hi\n".into(),
        stderr: String::new(),
        execution_time: 0.25,
        command: "echo hi".into(),
    };
    let json = serde_json::to_value(&output).unwrap();
    assert!(json.get("exitCode").is_some());
    assert!(json.get("executionTime").is_some());
}

#[test]
fn test_command_request_defaults() {
    let req: CommandRequest = serde_json::from_str(r#"{"command":"ls"}"#).unwrap();
    assert_eq!(req.command, "ls");
    assert_eq!(req.timeout, 0);
    assert!(req.environment.is_empty());
}
