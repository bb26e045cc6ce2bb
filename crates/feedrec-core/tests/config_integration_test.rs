use std::io::Write;

use feedrec_core::config::EngineConfig;

#[test]
fn loads_overrides_from_a_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedrec.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
        dag_dir = "custom/dags"
        max_count = 25

        [node_defaults]
        recall_size = 50
        rank_pool_size = 75
        final_count = 5
        "#
    )
    .unwrap();

    let cfg = EngineConfig::load(&path).unwrap();
    assert_eq!(cfg.dag_dir, std::path::PathBuf::from("custom/dags"));
    assert_eq!(cfg.max_count, 25);
    assert_eq!(cfg.node_defaults.recall_size, 50);
    assert_eq!(cfg.node_defaults.rank_pool_size, 75);
}

#[test]
fn environment_variables_override_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedrec.toml");
    std::fs::write(&path, "max_count = 10\n").unwrap();

    std::env::set_var("FEEDREC__MAX_COUNT", "42");
    let cfg = EngineConfig::load(&path).unwrap();
    std::env::remove_var("FEEDREC__MAX_COUNT");

    assert_eq!(cfg.max_count, 42);
}

#[test]
fn partial_node_defaults_fall_back_to_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedrec.toml");
    std::fs::write(&path, "[node_defaults]\nrecall_size = 200\n").unwrap();

    let cfg = EngineConfig::load(&path).unwrap();
    assert_eq!(cfg.node_defaults.recall_size, 200);
    assert_eq!(cfg.node_defaults.rank_pool_size, 200);
    assert_eq!(cfg.node_defaults.final_count, 10);
}
