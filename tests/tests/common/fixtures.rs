use bitladder::VideoCatalog;
use rstest::*;
use tempfile::TempDir;

/// Common fixture for temporary directory
#[fixture]
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[fixture]
pub fn catalog() -> VideoCatalog {
    VideoCatalog::builtin().expect("builtin catalog is valid")
}

#[fixture]
pub fn tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::default()
                .add_directive("warn".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

#[fixture]
pub fn debug_tracing_setup() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::default()
                .add_directive("bitladder=debug".parse().expect("valid directive"))
                .add_directive("bitladder_abr=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
