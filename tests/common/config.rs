//! Test configuration builders

use ffmerge::Config;
use std::path::Path;
use std::time::Duration;

/// Configuration rooted in `work_dir` with delays short enough for tests
pub fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::default();
    config.server.bind_ip = "127.0.0.1".parse().expect("valid ip");
    config.server.port = 0;
    config.artifacts.work_dir = work_dir.to_path_buf();
    config.artifacts.grace_delay = Duration::from_millis(100);
    config.fetch.timeout = Duration::from_secs(5);
    config.encoder.search_path = false;
    config
}

/// Files currently in `dir`, recursively
pub fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}
