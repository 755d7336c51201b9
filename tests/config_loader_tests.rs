use reactshare::config::{ConfigError, ConfigLoader};
use reactshare::providers::ProviderRegistry;
use std::{
    env, fs,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        env::remove_var("REACTSHARE_PROFILE");
        env::remove_var("REACTSHARE_LOG_LEVEL");
        env::remove_var("REACTSHARE_AUTH_JWT_SECRET");
        env::remove_var("REACTSHARE_TIKTOK_CLIENT_KEY");
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let dir = TempDir::new().unwrap();
    let cfg = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert!(cfg.policy.single_active_account);
    assert!(cfg.providers.is_empty());
    assert!(cfg.validate(&["youtube", "tiktok"]).is_ok());
}

#[test]
fn process_env_overrides_env_files() {
    let _guard = env_guard();
    clear_env();

    let dir = TempDir::new().unwrap();
    write_env_file(
        &dir,
        ".env",
        "REACTSHARE_PROFILE=dev\nREACTSHARE_LOG_LEVEL=warn\n",
    );
    write_env_file(&dir, ".env.dev", "REACTSHARE_LOG_LEVEL=debug\n");

    unsafe {
        env::set_var("REACTSHARE_LOG_LEVEL", "trace");
        env::set_var("REACTSHARE_TIKTOK_CLIENT_KEY", "from-process");
    }

    let cfg = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("config loads");
    clear_env();

    assert_eq!(cfg.profile, "dev");
    assert_eq!(cfg.log_level, "trace");
    assert_eq!(
        cfg.provider_credentials("tiktok").client_id.as_deref(),
        Some("from-process")
    );
}

#[test]
fn production_profile_requires_credentials_for_enabled_providers() {
    let _guard = env_guard();
    clear_env();

    let dir = TempDir::new().unwrap();
    write_env_file(
        &dir,
        ".env",
        "REACTSHARE_PROFILE=prod\n\
         REACTSHARE_AUTH_JWT_SECRET=jwt\n\
         REACTSHARE_STORAGE_SIGNING_SECRET=0123456789abcdef\n\
         REACTSHARE_YOUTUBE_CLIENT_ID=yt-id\n\
         REACTSHARE_YOUTUBE_CLIENT_SECRET=yt-secret\n\
         REACTSHARE_DISABLED_PROVIDERS=tiktok\n",
    );

    let cfg = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .without_process_env()
        .load()
        .unwrap();
    let registry = ProviderRegistry::from_config(&cfg, reqwest::Client::new());

    assert_eq!(registry.available_ids(), vec!["youtube"]);
    assert!(cfg.validate(&registry.available_ids()).is_ok());

    // Re-enabling TikTok without credentials fails validation.
    match cfg.validate(&["youtube", "tiktok"]) {
        Err(ConfigError::MissingProviderCredentials { provider }) => {
            assert_eq!(provider, "tiktok")
        }
        other => panic!("expected missing TikTok credentials, got {other:?}"),
    }
}
