//! Versioned portal configuration: URLs, selector sets and timeouts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::locator::Locator;
use crate::types::ViewportSize;

/// Selector-set version this build understands
pub const CONFIG_VERSION: u32 = 1;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Selector-set version
    pub version: u32,
    pub session: SessionConfig,
    pub timeouts: Timeouts,
    pub wms: WmsConfig,
    pub label: LabelConfig,
    pub store: StoreConfig,
    pub report: ReportConfig,
    /// Where screenshots and markup dumps go on fatal errors
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            session: SessionConfig::default(),
            timeouts: Timeouts::default(),
            wms: WmsConfig::default(),
            label: LabelConfig::default(),
            store: StoreConfig::default(),
            report: ReportConfig::default(),
            diagnostics_dir: None,
        }
    }
}

impl Config {
    /// `~/.shipflow`
    pub fn home_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Unable to determine home directory")?;
        Ok(home_dir.join(".shipflow"))
    }

    /// `~/.shipflow/config.json`
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.json"))
    }

    /// Load from an explicit path, else the default path if it exists, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default_path = Self::default_path()?;
                if !default_path.exists() {
                    debug!("No config at {}, using defaults", default_path.display());
                    return Ok(Self::default());
                }
                default_path
            }
        };

        let raw = fs::read_to_string(&path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_json(&raw)
            .context(format!("Invalid config file: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(raw)?;
        if config.version > CONFIG_VERSION {
            anyhow::bail!(
                "Config version {} is newer than supported version {}",
                config.version,
                CONFIG_VERSION
            );
        }
        if config.label.barcode_patterns.is_empty() {
            anyhow::bail!("label.barcode_patterns must not be empty");
        }
        if config.label.artifact_controls.is_empty() {
            anyhow::bail!("label.artifact_controls must not be empty");
        }
        Ok(config)
    }

    /// Write this config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
        info!("Wrote config to {}", path.display());
        Ok(())
    }

    /// Effective diagnostics directory
    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics_dir.clone().unwrap_or_else(|| {
            Self::home_dir()
                .map(|home| home.join("diagnostics"))
                .unwrap_or_else(|_| std::env::temp_dir().join("shipflow-diagnostics"))
        })
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub headless: bool,
    pub viewport: ViewportSize,
    /// Pass `--no-sandbox` (needed in containers)
    pub no_sandbox: bool,
    /// Pass `--disable-dev-shm-usage`
    pub disable_dev_shm: bool,
    /// Use an already running chromedriver instead of the managed one
    pub webdriver_url: Option<String>,
    pub extra_args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: ViewportSize::default(),
            no_sandbox: true,
            disable_dev_shm: true,
            webdriver_url: None,
            extra_args: Vec::new(),
        }
    }
}

/// Every bounded wait, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub element_ms: u64,
    pub interactable_ms: u64,
    pub login_marker_ms: u64,
    pub navigation_ms: u64,
    pub row_presence_ms: u64,
    pub page_refresh_ms: u64,
    pub poll_interval_ms: u64,
    pub scroll_settle_ms: u64,
    pub task_detect_ms: u64,
    pub artifact_ready_ms: u64,
    pub new_window_ms: u64,
    pub print_settle_ms: u64,
    pub item_ack_ms: u64,
    pub item_pause_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element_ms: 20_000,
            interactable_ms: 5_000,
            login_marker_ms: 20_000,
            navigation_ms: 30_000,
            row_presence_ms: 10_000,
            page_refresh_ms: 20_000,
            poll_interval_ms: 500,
            scroll_settle_ms: 1_500,
            task_detect_ms: 180_000,
            artifact_ready_ms: 300_000,
            new_window_ms: 20_000,
            print_settle_ms: 7_000,
            item_ack_ms: 5_000,
            item_pause_ms: 1_000,
        }
    }
}

impl Timeouts {
    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }
    pub fn interactable(&self) -> Duration {
        Duration::from_millis(self.interactable_ms)
    }
    pub fn login_marker(&self) -> Duration {
        Duration::from_millis(self.login_marker_ms)
    }
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn row_presence(&self) -> Duration {
        Duration::from_millis(self.row_presence_ms)
    }
    pub fn page_refresh(&self) -> Duration {
        Duration::from_millis(self.page_refresh_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
    pub fn task_detect(&self) -> Duration {
        Duration::from_millis(self.task_detect_ms)
    }
    pub fn artifact_ready(&self) -> Duration {
        Duration::from_millis(self.artifact_ready_ms)
    }
    pub fn new_window(&self) -> Duration {
        Duration::from_millis(self.new_window_ms)
    }
    pub fn print_settle(&self) -> Duration {
        Duration::from_millis(self.print_settle_ms)
    }
    pub fn item_ack(&self) -> Duration {
        Duration::from_millis(self.item_ack_ms)
    }
    pub fn item_pause(&self) -> Duration {
        Duration::from_millis(self.item_pause_ms)
    }
}

/// How a login form is submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitTrigger {
    /// Press Enter in the password field
    EnterKey,
    /// Click a submit control
    Click { locator: Locator },
}

/// Login form description for one portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginTarget {
    /// Short name used in errors and diagnostics
    pub name: String,
    pub url: String,
    /// Optional link that reveals the login form
    #[serde(default)]
    pub pre_login: Option<Locator>,
    pub username_field: Locator,
    pub password_field: Locator,
    pub submit: SubmitTrigger,
    /// Element that only exists once logged in
    pub post_login_marker: Locator,
}

/// WMS grid selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSelectors {
    pub query_button: Locator,
    pub loading_indicator: Locator,
    pub rows: Locator,
    pub first_row: Locator,
    /// Relative to a row
    pub method_cell: Locator,
    /// Relative to a row
    pub code_input: Locator,
    pub next_button: Locator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WmsConfig {
    pub login: LoginTarget,
    pub pickup_link: Locator,
    pub default_tab: Locator,
    pub complete_tab: Locator,
    pub grid: GridSelectors,
}

impl Default for WmsConfig {
    fn default() -> Self {
        let rows = "//div[contains(@class, 'list-items')]/div[contains(@class, 'item')]";
        Self {
            login: LoginTarget {
                name: "wms".to_string(),
                url: "https://wms.jenjan.com.tw/".to_string(),
                pre_login: None,
                username_field: Locator::xpath("//input[@placeholder='example@jenjan.com.tw']"),
                password_field: Locator::xpath("//input[@type='password']"),
                submit: SubmitTrigger::EnterKey,
                post_login_marker: Locator::id("page-container"),
            },
            pickup_link: Locator::xpath("//a[@href='/admin/pickup']"),
            default_tab: Locator::xpath(
                "//div[contains(@class, 'btn') and (contains(., '未揀訂單') or contains(., 'Unpicked'))]",
            ),
            complete_tab: Locator::xpath(
                "//div[contains(@class, 'btn') and (contains(., '揀包完成') or contains(., 'Complete'))]",
            ),
            grid: GridSelectors {
                query_button: Locator::xpath("//div[contains(@class, 'btn-primary')]"),
                loading_indicator: Locator::xpath("//div[contains(@class, 'j-loading')]"),
                rows: Locator::xpath(rows),
                first_row: Locator::xpath(format!("({})[1]", rows)),
                method_cell: Locator::xpath("./div[2]/div[3]"),
                code_input: Locator::xpath("./div[2]/div[4]//input"),
                next_button: Locator::xpath(
                    "//button[normalize-space()='下一頁' or normalize-space()='Next']",
                ),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub login: LoginTarget,
    pub other_users_tab: Locator,
    pub task_links: Locator,
    pub batch_input: Locator,
    pub submit_button: Locator,
    /// Candidates for a task's print control, most specific first; may use `{task_id}`
    pub artifact_controls: Vec<Locator>,
    /// Barcode patterns, most specific first
    pub barcode_patterns: Vec<String>,
    pub scroll_step_px: i64,
    pub max_scroll_passes: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            login: LoginTarget {
                name: "label".to_string(),
                url: "https://niceshoppy.cc/task/".to_string(),
                pre_login: Some(Locator::link_text("登入")),
                username_field: Locator::id("username"),
                password_field: Locator::id("password"),
                submit: SubmitTrigger::Click {
                    locator: Locator::xpath("//button[normalize-space()='登入']"),
                },
                post_login_marker: Locator::partial_link_text("其他用戶"),
            },
            other_users_tab: Locator::partial_link_text("其他用戶"),
            task_links: Locator::xpath("//a[contains(@href, 'task_id=')]"),
            batch_input: Locator::name("unimart"),
            submit_button: Locator::xpath("//*[@id='shipping-list-submit-form']/a[1]"),
            artifact_controls: vec![
                Locator::xpath(
                    "//a[contains(@class, 'btn') and contains(@class, 'btn-primary') and contains(@href, 'task_id={task_id}')]",
                ),
                Locator::xpath("//a[contains(@href, 'task_id={task_id}') and contains(text(), '列印')]"),
                Locator::xpath("//a[contains(@href, 'task_id={task_id}')]"),
            ],
            barcode_patterns: crate::extract::DEFAULT_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            scroll_step_px: 300,
            max_scroll_passes: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub login: LoginTarget,
    /// Candidates for the C2C quick-receive entry link
    pub section_link: Vec<Locator>,
    pub phone_input: Locator,
    pub phone_confirm: Locator,
    /// Page function that loads pickups for the typed phone number
    pub phone_query_hook: String,
    /// Candidates for the per-barcode input
    pub item_input: Vec<Locator>,
    /// Candidates for the per-barcode confirm; Enter is used when none match
    pub item_confirm: Vec<Locator>,
    pub ack_message: Locator,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            login: LoginTarget {
                name: "store".to_string(),
                url: "https://myship.sp88.tw/ECGO/C2CPickup".to_string(),
                pre_login: None,
                username_field: Locator::id("UserName"),
                password_field: Locator::id("Password"),
                submit: SubmitTrigger::Click {
                    locator: Locator::css(".Button001"),
                },
                post_login_marker: Locator::partial_link_text("C2C"),
            },
            section_link: vec![
                Locator::link_text("C2C快收便"),
                Locator::partial_link_text("C2C"),
            ],
            phone_input: Locator::id("MobileNumber"),
            phone_confirm: Locator::id("UploadButton"),
            phone_query_hook: "QueryPickUp".to_string(),
            item_input: vec![
                Locator::id("PIN"),
                Locator::xpath("//input[contains(@id, 'PIN') or contains(@name, 'PIN')]"),
            ],
            item_confirm: vec![
                Locator::id("btn_OK_PIN"),
                Locator::xpath("//button[contains(@id, 'PIN') and contains(@id, 'OK')]"),
            ],
            ack_message: Locator::id("show_msg_p"),
        }
    }
}

/// Grouping rules for the WMS report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Group order; unlisted methods follow in lexical order
    pub priority: Vec<String>,
    /// Methods included in the filtered view
    pub default_methods: Vec<String>,
    /// Offset of the report timestamp from UTC
    pub utc_offset_hours: i32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        let methods: Vec<String> = crate::reconcile::PRIORITY_ORDER
            .iter()
            .map(|m| m.to_string())
            .collect();
        Self {
            priority: methods.clone(),
            default_methods: methods,
            utc_offset_hours: 8,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
