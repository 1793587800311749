use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct MemeloopConfig {
    pub paths: PathsSection,
    pub browser: BrowserSection,
    pub discovery: DiscoverySection,
    pub safety: SafetySection,
    pub publisher: PublisherSection,
    pub download: DownloadSection,
    pub scheduler: SchedulerSection,
}

impl MemeloopConfig {
    /// The session artifact lives next to the executable unless the
    /// configured path is absolute.
    pub fn session_path(&self) -> PathBuf {
        let candidate = Path::new(&self.paths.session_file);
        if candidate.is_absolute() {
            return candidate.to_path_buf();
        }
        program_dir().join(candidate)
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.work_dir)
    }
}

fn program_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub work_dir: String,
    pub session_file: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            work_dir: ".".to_string(),
            session_file: "ig-session.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserSection {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub user_agent: UserAgentSection,
    pub viewport: ViewportSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub launch_timeout_seconds: u64,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            launch_timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub disable_dev_shm_usage: bool,
    pub single_process: bool,
    pub disable_gpu: bool,
    pub mute_audio: bool,
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub extra_args: Vec<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            disable_dev_shm_usage: true,
            single_process: true,
            disable_gpu: true,
            mute_audio: true,
            no_first_run: true,
            disable_automation_controlled: true,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentSection {
    pub desktop: String,
}

impl Default for UserAgentSection {
    fn default() -> Self {
        Self {
            desktop: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportSection {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Equally weighted fallbacks, tried in order until one yields candidates.
    pub query_targets: Vec<String>,
    /// Most specific first, ending in a catch-all.
    pub selector_strategies: Vec<String>,
    pub settle_range_ms: [u64; 2],
    pub scroll_steps: u32,
    pub scroll_delta_px: f64,
    pub scroll_pause_ms: u64,
    pub selector_wait_ms: u64,
    pub enough_candidates: usize,
    pub navigation_timeout_seconds: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            query_targets: vec![
                "https://www.pinterest.com/search/pins/?q=funny%20memes&rs=typed".to_string(),
                "https://www.pinterest.com/search/pins/?q=dank%20memes".to_string(),
                "https://www.pinterest.com/search/pins/?q=trending%20memes".to_string(),
            ],
            selector_strategies: vec![
                r#"img[src*="i.pinimg.com/originals/"]"#.to_string(),
                r#"img[src*="i.pinimg.com/736x/"]"#.to_string(),
                "img".to_string(),
            ],
            settle_range_ms: [3000, 8000],
            scroll_steps: 5,
            scroll_delta_px: 1500.0,
            scroll_pause_ms: 1000,
            selector_wait_ms: 5000,
            enough_candidates: 10,
            navigation_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    pub blocked_markers: Vec<String>,
    pub hires_markers: Vec<String>,
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            blocked_markers: vec![
                "watermark".to_string(),
                "logo".to_string(),
                "avatar".to_string(),
                "/videos/".to_string(),
            ],
            hires_markers: vec!["originals".to_string(), "736x".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    pub base_url: String,
    pub login_path: String,
    pub upload_path: String,
    pub username_env: String,
    pub password_env: String,
    /// Non-portable fields removed from a fresh session before it is persisted.
    pub strip_fields: Vec<String>,
    pub upload_timeout_seconds: u64,
    pub caption: CaptionSection,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            base_url: "https://publish.memeloop.local".to_string(),
            login_path: "/auth/login".to_string(),
            upload_path: "/media/photo".to_string(),
            username_env: "MEMELOOP_USERNAME".to_string(),
            password_env: "MEMELOOP_PASSWORD".to_string(),
            strip_fields: vec!["constants".to_string()],
            upload_timeout_seconds: 60,
            caption: CaptionSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptionSection {
    pub headline: String,
    pub attribution: String,
    pub hashtags: Vec<String>,
}

impl Default for CaptionSection {
    fn default() -> Self {
        Self {
            headline: "😂 Funny meme from Pinterest".to_string(),
            attribution: "Credits to original creator".to_string(),
            hashtags: vec![
                "memes".to_string(),
                "funny".to_string(),
                "viral".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub timeout_seconds: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self { timeout_seconds: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub post_interval_minutes: [u64; 2],
    pub error_backoff_minutes: [u64; 2],
    pub minimum_delay_minutes: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            post_interval_minutes: [40, 70],
            error_backoff_minutes: [30, 60],
            minimum_delay_minutes: 1,
        }
    }
}

pub fn load_memeloop_config<P: AsRef<Path>>(path: P) -> Result<MemeloopConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
