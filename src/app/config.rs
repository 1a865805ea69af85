use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 監視対象のゲームクライアント実行ファイル名
pub const DEFAULT_PROCESS_NAME: &str = "FortniteClient-Win64-Shipping.exe";

const DEFAULT_CATALOG_BASE_URL: &str =
    "https://levisnoot.github.io/FNFest-Content-API/api/track_api";
const DEFAULT_ALBUM_ART_BASE_URL: &str =
    "https://levisnoot.github.io/fnfest-artwork-store/album_art/";

/// アプリケーション設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// ログレベル
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// ゲームクライアントのログファイル
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// オーバーレイが読むステータスファイル
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    /// プロセス名（大文字小文字は区別しない）
    #[serde(default = "default_process_name")]
    pub process_name: String,
    /// ログ監視設定
    #[serde(default)]
    pub watch: WatchConfig,
    /// 楽曲カタログAPI設定
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    // Windows: %LOCALAPPDATA%\FortniteGame\Saved\Logs\FortniteGame.log
    directories::BaseDirs::new()
        .map(|d| d.data_local_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
        .join("FortniteGame")
        .join("Saved")
        .join("Logs")
        .join("FortniteGame.log")
}

fn default_status_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "festival-status")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("festival-status"))
        .join("status.json")
}

fn default_process_name() -> String {
    DEFAULT_PROCESS_NAME.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: default_log_file(),
            status_file: default_status_file(),
            process_name: default_process_name(),
            watch: WatchConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Log watch configuration
///
/// ## Timing
/// - `poll_interval_ms`: wait between reads when the log has no new line
/// - `process_poll_secs`: wait between process checks while the game is down
/// - `song_state_delay_ms`: gap between the two halves of a song-state publish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_process_poll_secs")]
    pub process_poll_secs: u64,
    #[serde(default = "default_song_state_delay_ms")]
    pub song_state_delay_ms: u64,
    /// Wake the tailer on file system events instead of waiting out the poll
    #[serde(default = "default_use_file_events")]
    pub use_file_events: bool,
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_process_poll_secs() -> u64 {
    5
}

fn default_song_state_delay_ms() -> u64 {
    2000 // 音声の再生開始とのずれを吸収する
}

fn default_use_file_events() -> bool {
    true
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            process_poll_secs: default_process_poll_secs(),
            song_state_delay_ms: default_song_state_delay_ms(),
            use_file_events: default_use_file_events(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn process_poll_interval(&self) -> Duration {
        Duration::from_secs(self.process_poll_secs.max(1))
    }

    pub fn song_state_delay(&self) -> Duration {
        Duration::from_millis(self.song_state_delay_ms)
    }
}

/// 楽曲カタログAPI設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// `{base_url}/{song_id}.json` で楽曲情報を取得
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    /// albumArtFilename の前に付けるURL
    #[serde(default = "default_album_art_base_url")]
    pub album_art_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// ログ上のIDとカタログ上のIDが食い違う曲の対応表（組み込みの対応に追加される）
    #[serde(
        default = "default_song_id_aliases",
        deserialize_with = "merge_song_id_aliases"
    )]
    pub song_id_aliases: BTreeMap<String, String>,
}

fn default_catalog_base_url() -> String {
    DEFAULT_CATALOG_BASE_URL.to_string()
}

fn default_album_art_base_url() -> String {
    DEFAULT_ALBUM_ART_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_song_id_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([(
        "astronautintheocean".to_string(),
        "astronoutintheocean".to_string(),
    )])
}

fn merge_song_id_aliases<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let user = BTreeMap::<String, String>::deserialize(deserializer)?;
    let mut aliases = default_song_id_aliases();
    aliases.extend(user);
    Ok(aliases)
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            album_art_base_url: default_album_art_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            song_id_aliases: default_song_id_aliases(),
        }
    }
}

impl CatalogConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Config {
    /// 設定ファイルから読み込み（存在しない場合はデフォルトを作成して保存）
    pub fn load() -> Result<Self> {
        Self::load_or_create(&Self::config_path()?)
    }

    /// 既定の設定を読み込み、失敗した場合はデフォルトとエラーを返す
    ///
    /// ログ初期化前に呼ばれるため、エラーは呼び出し側で後から警告する。
    pub fn load_or_default() -> (Self, Option<anyhow::Error>) {
        match Self::config_path() {
            Ok(path) => Self::load_or_default_at(&path),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn load_or_default_at(path: &Path) -> (Self, Option<anyhow::Error>) {
        match Self::load_or_create(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            // 初回起動時はデフォルト設定をファイルに保存
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                tracing::warn!("Failed to save default config: {}", e);
            }
            Ok(config)
        }
    }

    /// 指定パスの設定ファイルを読み込み
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        Ok(config)
    }

    /// 設定ファイルパスを取得
    pub fn config_path() -> Result<PathBuf> {
        // ~/.config/festival-status/config.toml を使用
        let base_dirs = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))?;
        Ok(base_dirs.home_dir().join(".config/festival-status/config.toml"))
    }

    /// 現在の設定をファイルに保存
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }
}
