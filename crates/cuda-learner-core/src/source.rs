//! The CUDA program compiled and run inside the sandbox.

use crate::errors::ExecutorError;
use crate::executors::Sandbox;

/// Launches one block of five threads, each printing its block and thread index.
pub const CUDA_HELLO_SOURCE: &str = r#"
#include <stdio.h>
#include <cuda_runtime.h>

__global__ void cuda_hello() {
    printf("Hello from GPU! Block %d, Thread %d\n", blockIdx.x, threadIdx.x);
}

int main() {
    printf("Standard C: Host is preparing to launch kernel...\n");
    
    // Launch kernel with 1 block and 5 threads
    cuda_hello<<<1, 5>>>();
    
    // Wait for GPU to finish
    cudaDeviceSynchronize();
    
    printf("Standard C: Kernel finished.\n");
    return 0;
}
"#;

/// Write `blob` verbatim to `path` in the sandbox, replacing any existing file.
pub async fn emit_source(sandbox: &dyn Sandbox, path: &str, blob: &str) -> Result<(), ExecutorError> {
    sandbox.write_file(path, blob).await?;
    log::debug!("Wrote {} bytes of source to {}", blob.len(), path);
    Ok(())
}
