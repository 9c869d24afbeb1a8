use formtree::config::Config;
use formtree::{ControlOptions, FormControl, FormGroup, Trigger};

#[test]
fn config_from_env_reads_overrides_and_rejects_bad_values() {
    // Env vars are process-global, so every env case lives in this one test.
    unsafe {
        std::env::remove_var("FORMTREE_TRIGGER");
        std::env::remove_var("FORMTREE_LOG_LEVEL");
        std::env::remove_var("FORMTREE_COMPACT_LOGS");
    }
    assert_eq!(Config::from_env().unwrap(), Config::default());

    unsafe {
        std::env::set_var("FORMTREE_TRIGGER", "Blur");
        std::env::set_var("FORMTREE_LOG_LEVEL", "formtree=debug");
        std::env::set_var("FORMTREE_COMPACT_LOGS", "yes");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.default_trigger, Trigger::Blur);
    assert_eq!(config.log_level, "formtree=debug");
    assert!(config.compact_logs);

    unsafe {
        std::env::set_var("FORMTREE_TRIGGER", "hover");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("FORMTREE_TRIGGER", "change");
        std::env::set_var("FORMTREE_COMPACT_LOGS", "maybe");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("FORMTREE_TRIGGER");
        std::env::remove_var("FORMTREE_LOG_LEVEL");
        std::env::remove_var("FORMTREE_COMPACT_LOGS");
    }
}

#[test]
fn config_from_toml_fills_defaults() {
    let config = Config::from_toml_str(r#"default_trigger = "submit""#).unwrap();
    assert_eq!(config.default_trigger, Trigger::Submit);
    assert_eq!(config.log_level, "info");
    assert!(!config.compact_logs);
}

#[test]
fn config_from_toml_rejects_unknown_keys() {
    assert!(Config::from_toml_str("colour = \"blue\"").is_err());
    assert!(Config::from_toml_str("default_trigger = \"hover\"").is_err());
}

#[test]
fn control_options_from_config_set_the_root_trigger() {
    let config = Config::from_toml_str("default_trigger = \"blur\"").unwrap();
    let leaf = FormControl::new("");
    let _form = FormGroup::with_options(
        [("leaf", leaf.control())],
        ControlOptions::from_config(&config),
    );
    assert_eq!(leaf.trigger(), Trigger::Blur);
}
