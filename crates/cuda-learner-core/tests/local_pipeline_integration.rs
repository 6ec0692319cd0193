//! End-to-end runs of the build-and-run procedure on the local executor.
//!
//! `nvcc` and a GPU are not available on test hosts, so a shell script stands
//! in for the compiler: it rejects sources containing `SYNTAX_ERROR` and
//! otherwise produces a binary printing what the CUDA kernel would print.
#![cfg(unix)]

use cuda_learner_core::executors::{LocalExecutor, RemoteExecutor, Sandbox};
use cuda_learner_core::steps::build;
use cuda_learner_core::{
    submit, BuildAndRun, ExecutorError, Outcome, SandboxConfig, ToolchainConfig, CUDA_HELLO_SOURCE,
};
use std::collections::BTreeSet;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const STAND_IN_COMPILER: &str = r#"#!/bin/sh
out="$2"
src="$3"
if grep -q 'SYNTAX_ERROR' "$src"; then
    echo "$src(1): error: this declaration has no storage class or type specifier" >&2
    exit 1
fi
cat > "$out" <<'BIN'
#!/bin/sh
echo "Standard C: Host is preparing to launch kernel..."
for t in 3 0 4 1 2; do
    echo "Hello from GPU! Block 0, Thread $t"
done
echo "Standard C: Kernel finished."
BIN
chmod +x "$out"
"#;

fn install_compiler(dir: &Path) -> String {
    let path = dir.join("stand-in-nvcc");
    std::fs::write(&path, STAND_IN_COMPILER).unwrap();
    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();
    path.to_string_lossy().into_owned()
}

fn toolchain(compiler: String) -> ToolchainConfig {
    ToolchainConfig {
        compiler,
        ..ToolchainConfig::default()
    }
}

fn sandbox_config() -> SandboxConfig {
    SandboxConfig {
        app_name: "cuda-learner-test".to_string(),
        image: "nvidia/cuda:12.4.0-devel-ubuntu22.04".to_string(),
        workdir: "/workspace".to_string(),
        accelerator: None,
    }
}

async fn dispatch(toolchain: ToolchainConfig, source: &str) -> (Result<Outcome, ExecutorError>, String) {
    let handle = submit(
        Arc::new(LocalExecutor::new()),
        sandbox_config(),
        Arc::new(BuildAndRun::with_source(toolchain, source)),
    );
    let mut printed = Vec::new();
    let outcome = handle.forward_to(&mut printed).await;
    (outcome, String::from_utf8(printed).unwrap())
}

#[tokio::test]
async fn test_hello_program_prints_five_gpu_threads() {
    let tools = TempDir::new().unwrap();
    let compiler = install_compiler(tools.path());

    let (outcome, printed) = dispatch(toolchain(compiler), CUDA_HELLO_SOURCE).await;
    let outcome = outcome.unwrap();

    let execution = outcome.execution().expect("binary should have run");
    let gpu_lines: Vec<&str> = execution
        .stdout
        .lines()
        .filter(|line| line.starts_with("Hello from GPU!"))
        .collect();
    assert_eq!(gpu_lines.len(), 5);

    let threads: BTreeSet<u32> = gpu_lines
        .iter()
        .map(|line| {
            let rest = line
                .strip_prefix("Hello from GPU! Block 0, Thread ")
                .expect("block index should be 0");
            rest.parse().unwrap()
        })
        .collect();
    assert_eq!(threads, (0..5).collect());

    assert!(printed.starts_with("--- Compiling ---\n--- Running ---\n"));
    assert!(!printed.contains("Errors:"));
}

#[tokio::test]
async fn test_syntax_error_never_runs_binary() {
    let tools = TempDir::new().unwrap();
    let compiler = install_compiler(tools.path());
    let broken = format!("SYNTAX_ERROR\n{}", CUDA_HELLO_SOURCE);

    let (outcome, printed) = dispatch(toolchain(compiler), &broken).await;
    let outcome = outcome.unwrap();

    assert!(matches!(outcome, Outcome::CompileFailed { .. }));
    assert_ne!(outcome.compilation().exit_code, 0);
    assert!(outcome.execution().is_none());
    assert!(printed.contains("Compilation Failed:\n"));
    assert!(printed.contains("no storage class or type specifier"));
    assert!(!printed.contains("--- Running ---"));
    assert!(!printed.contains("Hello from GPU!"));
}

#[tokio::test]
async fn test_clean_build_produces_binary() {
    let tools = TempDir::new().unwrap();
    let toolchain = toolchain(install_compiler(tools.path()));

    let sandbox = LocalExecutor::new().provision(&sandbox_config()).await.unwrap();
    sandbox.write_file("hello.cu", CUDA_HELLO_SOURCE).await.unwrap();

    let compilation = build(sandbox.as_ref(), &toolchain).await.unwrap();
    assert_eq!(compilation.exit_code, 0);

    let binary_check = sandbox
        .exec(&["test".to_string(), "-x".to_string(), "hello".to_string()])
        .await
        .unwrap();
    sandbox.teardown().await;
    assert_eq!(binary_check.exit_code, 0);
}

#[tokio::test]
async fn test_repeated_invocations_print_identical_output() {
    let tools = TempDir::new().unwrap();
    let compiler = install_compiler(tools.path());

    let (first, _) = dispatch(toolchain(compiler.clone()), CUDA_HELLO_SOURCE).await;
    let (second, _) = dispatch(toolchain(compiler), CUDA_HELLO_SOURCE).await;

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(
        first.execution().map(|e| e.stdout.clone()),
        second.execution().map(|e| e.stdout.clone())
    );
}

#[tokio::test]
async fn test_missing_compiler_is_fatal() {
    let (outcome, printed) = dispatch(
        toolchain("cuda-learner-no-such-compiler".to_string()),
        CUDA_HELLO_SOURCE,
    )
    .await;

    assert!(matches!(outcome, Err(ExecutorError::Io(_))));
    assert_eq!(printed, "--- Compiling ---\n");
}
