//! Drives `ClaudeCli` against small shell scripts standing in for the
//! real `claude` binary.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rb_agent::{ClaudeCli, ConversationDispatcher, DispatchError};
use rb_domain::config::AgentConfig;
use rb_domain::stream::AgentEvent;
use tokio::sync::mpsc;

// Writing an executable while another test forks can fail the exec with
// ETXTBSY, so script-based tests run one at a time.
static SCRIPTS: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

fn write_script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn dispatcher(dir: &Path, program: String, timeout: Duration) -> ConversationDispatcher {
    let config = AgentConfig {
        program,
        workdir: dir.to_path_buf(),
        ..AgentConfig::default()
    };
    ConversationDispatcher::new(Arc::new(ClaudeCli::new(config)), timeout)
}

#[tokio::test]
async fn stream_json_output_is_relayed() {
    let _serial = SCRIPTS.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args.txt");
    let program = write_script(
        dir.path(),
        "fake-claude",
        &format!(
            r#"printf '%s\n' "$@" > '{args}'
echo '{{"type":"system","subtype":"init"}}'
echo '{{"type":"assistant","message":{{"content":[{{"type":"tool_use","name":"Bash","input":{{"command":"ls"}}}}]}}}}'
echo '{{"type":"user","message":{{"content":[{{"type":"tool_result","is_error":false}}]}}}}'
echo 'warming up' >&2
echo '{{"type":"result","subtype":"success","result":"all done"}}'"#,
            args = args_file.display()
        ),
    );

    let d = dispatcher(dir.path(), program, Duration::from_secs(20));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let text = d.invoke("hello", "sess-1", true, Some(tx)).await.unwrap();
    assert_eq!(text, "all done");

    let first = rx.recv().await.unwrap();
    assert!(matches!(first, AgentEvent::ToolUse { ref name, .. } if name == "Bash"));

    let args = std::fs::read_to_string(&args_file).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[0], "-p");
    assert_eq!(args[1], "hello");
    let pos = args.iter().position(|a| *a == "--session-id").unwrap();
    assert_eq!(args[pos + 1], "sess-1");
    assert!(args.contains(&"stream-json"));
}

#[tokio::test]
async fn stderr_is_the_fallback_and_hangs_are_killed() {
    let _serial = SCRIPTS.lock().await;
    let dir = tempfile::tempdir().unwrap();

    let failing = write_script(dir.path(), "failing", "echo 'not logged in' >&2\nexit 1");
    let d = dispatcher(dir.path(), failing, Duration::from_secs(20));
    assert_eq!(
        d.invoke("hello", "sess-2", false, None).await.unwrap(),
        "not logged in"
    );

    let silent = write_script(dir.path(), "silent", "exit 0");
    let d = dispatcher(dir.path(), silent, Duration::from_secs(20));
    assert!(matches!(
        d.invoke("hello", "sess-3", false, None).await.unwrap_err(),
        DispatchError::NoResult
    ));

    let hanging = write_script(dir.path(), "hanging", "exec sleep 30");
    let d = dispatcher(dir.path(), hanging, Duration::from_millis(300));
    let started = std::time::Instant::now();
    assert!(matches!(
        d.invoke("hello", "sess-4", false, None).await.unwrap_err(),
        DispatchError::Timeout(_)
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn empty_result_falls_back_to_stderr() {
    let _serial = SCRIPTS.lock().await;
    let dir = tempfile::tempdir().unwrap();

    let overloaded = write_script(
        dir.path(),
        "overloaded",
        r#"echo '{"type":"result","subtype":"error_during_execution","is_error":true,"result":""}'
echo 'API overloaded' >&2
exit 1"#,
    );
    let d = dispatcher(dir.path(), overloaded, Duration::from_secs(20));
    assert_eq!(
        d.invoke("hello", "sess-6", false, None).await.unwrap(),
        "API overloaded"
    );
}

#[tokio::test]
async fn missing_program_is_a_backend_error() {
    let _serial = SCRIPTS.lock().await;
    let dir = tempfile::tempdir().unwrap();
    let d = dispatcher(
        dir.path(),
        dir.path().join("does-not-exist").to_string_lossy().into_owned(),
        Duration::from_secs(5),
    );
    assert!(matches!(
        d.invoke("hello", "sess-5", true, None).await.unwrap_err(),
        DispatchError::Backend(_)
    ));
}
