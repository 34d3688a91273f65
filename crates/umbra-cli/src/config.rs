//! Configuration file – reads/writes `~/.umbra/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use umbra_runtime::DetectorConfig;

/// Persisted user configuration stored in `~/.umbra/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Pause between replayed scans.
    #[serde(default = "default_scan_period_ms")]
    pub scan_period_ms: u64,

    /// Per-topic buffer of the event bus.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default)]
    pub detector: DetectorConfig,
}

fn default_scan_period_ms() -> u64 {
    100
}
fn default_bus_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_period_ms: default_scan_period_ms(),
            bus_capacity: default_bus_capacity(),
            detector: DetectorConfig::default(),
        }
    }
}

/// Return the path to `~/.umbra/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".umbra").join("config.toml")
}

/// Effective configuration: the file if present, defaults otherwise, with
/// environment overrides applied on top in both cases.
pub fn effective() -> Result<Config, String> {
    let mut cfg = load()?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `UMBRA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `UMBRA_SENSOR_FRAME` | `detector.frames.sensor_frame` |
/// | `UMBRA_WORLD_FRAME` | `detector.frames.world_frame` |
/// | `UMBRA_MAX_MARCH_ITERATIONS` | `detector.march.max_iterations` |
/// | `UMBRA_TF_TIMEOUT_MS` | `detector.frames.transform_timeout_ms` |
/// | `UMBRA_SCAN_PERIOD_MS` | `scan_period_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("UMBRA_SENSOR_FRAME") {
        cfg.detector.frames.sensor_frame = v;
    }
    if let Ok(v) = std::env::var("UMBRA_WORLD_FRAME") {
        cfg.detector.frames.world_frame = v;
    }
    if let Ok(v) = std::env::var("UMBRA_MAX_MARCH_ITERATIONS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.detector.march.max_iterations = n;
    }
    if let Ok(v) = std::env::var("UMBRA_TF_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.detector.frames.transform_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("UMBRA_SCAN_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.scan_period_ms = ms;
    }
}

/// Save the config to disk, creating `~/.umbra/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serialises the tests that touch process-wide environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.detector.frames.sensor_frame, "base_laser_link");
        assert_eq!(loaded.detector.output.output_frame, "map");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "scan_period_ms = 50\n\n[detector.march]\nmax_iterations = 40\n",
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.scan_period_ms, 50);
        assert_eq!(cfg.bus_capacity, 256);
        assert_eq!(cfg.detector.march.max_iterations, 40);
        assert_eq!(cfg.detector.march.step, 0.1);
        assert_eq!(cfg.detector.segmenter.fov_limit, 1.2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "scan_period_ms = \"soon\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_umbra_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".umbra"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn apply_env_overrides_changes_frames() {
        let _lock = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK.
        unsafe {
            std::env::set_var("UMBRA_SENSOR_FRAME", "front_laser");
            std::env::set_var("UMBRA_WORLD_FRAME", "map");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.detector.frames.sensor_frame, "front_laser");
        assert_eq!(cfg.detector.frames.world_frame, "map");
        unsafe {
            std::env::remove_var("UMBRA_SENSOR_FRAME");
            std::env::remove_var("UMBRA_WORLD_FRAME");
        }
    }

    #[test]
    fn apply_env_overrides_changes_numbers() {
        let _lock = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK.
        unsafe {
            std::env::set_var("UMBRA_MAX_MARCH_ITERATIONS", "64");
            std::env::set_var("UMBRA_TF_TIMEOUT_MS", "5");
            std::env::set_var("UMBRA_SCAN_PERIOD_MS", "20");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.detector.march.max_iterations, 64);
        assert_eq!(cfg.detector.frames.transform_timeout_ms, 5);
        assert_eq!(cfg.scan_period_ms, 20);
        unsafe {
            std::env::remove_var("UMBRA_MAX_MARCH_ITERATIONS");
            std::env::remove_var("UMBRA_TF_TIMEOUT_MS");
            std::env::remove_var("UMBRA_SCAN_PERIOD_MS");
        }
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_numbers() {
        let _lock = ENV_LOCK.lock().unwrap();
        // SAFETY: guarded by ENV_LOCK.
        unsafe { std::env::set_var("UMBRA_MAX_MARCH_ITERATIONS", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.detector.march.max_iterations, 200);
        unsafe { std::env::remove_var("UMBRA_MAX_MARCH_ITERATIONS") };
    }
}
