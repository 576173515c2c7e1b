use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use vehicle_linker::config::LinkerConfig;
use vehicle_linker::TieBreak;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LINKER_CONFIG",
        "LINKER_LOG_FILE",
        "LINKER_IOU_THRESHOLD",
        "LINKER_VEHICLE_CLASS_IDS",
        "LINKER_PLATE_COMPONENT_ID",
        "LINKER_BRAND_COMPONENT_ID",
        "LINKER_TIE_BREAK",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(suffix: &str, body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    std::io::Write::write_all(&mut file, body.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        ".json",
        r#"{
            "log_file_path": "/var/log/linker/detections.jsonl",
            "iou_threshold": 0.25,
            "vehicle_class_ids": [2, 7],
            "plate_component_id": 4,
            "brand_component_id": 5,
            "tie_break": "highest_iou"
        }"#,
    );

    std::env::set_var("LINKER_CONFIG", file.path());
    std::env::set_var("LINKER_IOU_THRESHOLD", "0.3");
    std::env::set_var("LINKER_VEHICLE_CLASS_IDS", "2, 3");

    let cfg = LinkerConfig::load().expect("load config");

    assert_eq!(
        cfg.log_file_path,
        PathBuf::from("/var/log/linker/detections.jsonl")
    );
    assert_eq!(cfg.iou_threshold, 0.3);
    assert_eq!(
        cfg.vehicle_class_ids.iter().copied().collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert_eq!(cfg.plate_component_id, 4);
    assert_eq!(cfg.brand_component_id, 5);
    assert_eq!(cfg.tie_break, TieBreak::HighestIou);

    clear_env();
}

#[test]
fn loads_toml_config_from_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    // from_path must not consult the environment.
    std::env::set_var("LINKER_IOU_THRESHOLD", "0.9");

    let file = write_config(
        ".toml",
        r#"
log_file_path = "out/log.jsonl"
iou_threshold = 0.05
tie_break = "last_wins"
"#,
    );
    let cfg = LinkerConfig::from_path(file.path()).expect("load toml");
    assert_eq!(cfg.log_file_path, PathBuf::from("out/log.jsonl"));
    assert_eq!(cfg.iou_threshold, 0.05);
    assert_eq!(cfg.plate_component_id, 2);
    assert_eq!(cfg.brand_component_id, 3);
    assert_eq!(cfg.tie_break, TieBreak::LastWins);

    clear_env();
}

#[test]
fn defaults_apply_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = LinkerConfig::load().expect("load defaults");
    assert_eq!(cfg, LinkerConfig::default());
}

#[test]
fn invalid_env_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LINKER_IOU_THRESHOLD", "high");
    assert!(LinkerConfig::load().is_err());
    clear_env();

    std::env::set_var("LINKER_BRAND_COMPONENT_ID", "2");
    let err = LinkerConfig::load().unwrap_err();
    assert!(err.to_string().contains("must differ"));
    clear_env();

    std::env::set_var("LINKER_TIE_BREAK", "best");
    assert!(LinkerConfig::load().is_err());
    clear_env();

    std::env::set_var("LINKER_VEHICLE_CLASS_IDS", "2,car");
    assert!(LinkerConfig::load().is_err());
    clear_env();
}

#[test]
fn malformed_config_file_is_reported() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(".json", "{ \"iou_threshold\": ");
    std::env::set_var("LINKER_CONFIG", file.path());
    let err = LinkerConfig::load().unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
    clear_env();
}
