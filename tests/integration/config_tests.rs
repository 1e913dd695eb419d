use dupekeep::actions::rename::RenameOptions;
use dupekeep::actions::resolve::ResolveOptions;
use dupekeep::actions::TrashFallback;
use dupekeep::config::{Config, SaveOnExit};
use figment::providers::Serialized;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = figment::Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert!(config.backup_after_change);
    assert_eq!(config.save_on_exit, SaveOnExit::Ask);
    assert!(config.trash_fallback_to_permanent);
    assert_eq!(config.swap_temp_suffix, ".dkswap");
    assert!(config.storage_dir.is_none());
}

#[test]
fn test_config_load_from_env() {
    std::env::set_var("DKTEST_SAVE_ON_EXIT", "never");
    std::env::set_var("DKTEST_BACKUP_AFTER_CHANGE", "false");

    use figment::{providers::Env, Figment};
    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DKTEST_").split("__"));

    let config: Config = figment.extract().unwrap();

    assert_eq!(config.save_on_exit, SaveOnExit::Never);
    assert!(!config.backup_after_change);

    std::env::remove_var("DKTEST_SAVE_ON_EXIT");
    std::env::remove_var("DKTEST_BACKUP_AFTER_CHANGE");
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let storage = temp_dir.path().join("store");
    fs::create_dir(&storage).unwrap();

    let toml_content = format!(
        r#"
storage_dir = "{}"
save_on_exit = "always"
trash_fallback_to_permanent = false
swap_temp_suffix = ".tmpswap"
"#,
        storage.display().to_string().replace('\\', "\\\\")
    );
    fs::write(&config_path, toml_content).unwrap();

    use figment::{
        providers::{Format, Toml},
        Figment,
    };
    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));

    let config: Config = figment.extract().unwrap();

    assert_eq!(config.save_on_exit, SaveOnExit::Always);
    assert!(!config.trash_fallback_to_permanent);
    assert_eq!(config.storage_dir(), storage);
    assert_eq!(config.backup_path(), storage.join("backup.scanresults"));
    assert_eq!(config.ledger_path(), storage.join("excluded_groups.json"));
    assert_eq!(config.database_path(), storage.join("scan_database.sqlite"));
}

#[test]
fn test_config_try_load_rejects_bad_value() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "save_on_exit = \"sometimes\"\n").unwrap();

    assert!(Config::try_load_from(&config_path).is_err());
    // The lenient loader falls back to defaults
    assert_eq!(Config::load_from(&config_path).save_on_exit, SaveOnExit::Ask);
}

#[test]
fn test_config_feeds_operation_options() {
    let config = Config {
        trash_fallback_to_permanent: false,
        swap_temp_suffix: ".park".to_string(),
        ..Config::default()
    };

    assert_eq!(RenameOptions::from(&config).swap_temp_suffix, ".park");
    let resolve = ResolveOptions::from(&config);
    assert_eq!(resolve.trash_fallback, TrashFallback::Fail);
    assert_eq!(resolve.link_park_suffix, ".park");
}

#[test]
fn test_config_toml_roundtrip() {
    let config = Config {
        save_on_exit: SaveOnExit::Never,
        ..Config::default()
    };
    let text = config.to_toml().unwrap();

    use figment::{
        providers::{Format, Toml},
        Figment,
    };
    let loaded: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::string(&text))
        .extract()
        .unwrap();
    assert_eq!(loaded, config);
}
