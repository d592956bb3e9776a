use comrak::ComrakOptions;
use gotham_derive::StateData;

use std::path::{Path, PathBuf};

/// Application wide settings defined in configuration file.
#[derive(Deserialize, StateData, Clone, Debug)]
pub struct Settings {
    /// Postgres database url
    pub database_url: String,
    /// IP address to bind to
    pub host_address: String,
    /// Number of posts on each page of a listing
    #[serde(default = "default_per_page")]
    pub posts_per_page: i64,
    /// Directory post images are served from
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    /// Public base address, used for absolute links
    #[serde(default = "default_site_url")]
    pub site_url: String,
    /// Cookie settings
    pub cookie: Cookie,
}

fn default_per_page() -> i64 {
    10
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_site_url() -> String {
    String::from("http://localhost:8000")
}

impl Settings {
    pub fn from_slice(data: &[u8]) -> Result<Self, toml::de::Error> {
        toml::from_slice(data)
    }

    /// Reads the settings from `BLOGICUM_CONFIG` if set, otherwise the system wide file if it
    /// exists, otherwise `blogicum.toml` in the working directory.
    pub fn load() -> Result<Self, failure::Error> {
        let path = match std::env::var_os("BLOGICUM_CONFIG") {
            Some(path) => PathBuf::from(path),
            None if Path::new("/etc/blogicum/blogicum.toml").is_file() => {
                PathBuf::from("/etc/blogicum/blogicum.toml")
            }
            None => PathBuf::from("blogicum.toml"),
        };
        let data = std::fs::read(&path)?;
        let settings = Self::from_slice(&data)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }
}

/// Cookie related settings
#[derive(Deserialize, Clone, Debug)]
pub struct Cookie {
    /// Require HTTPS for cookies
    pub secure: bool,
    /// Restrict cookies to given domain if set
    pub domain: Option<String>,
}

/// Options for rendering post text. Raw HTML in posts is escaped.
pub fn markdown_options() -> ComrakOptions {
    ComrakOptions::default()
}

/// Renders markdown text to HTML.
pub fn render_markdown(text: &str) -> String {
    comrak::markdown_to_html(text, &markdown_options())
}
