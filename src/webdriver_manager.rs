use anyhow::{Context, Result};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const DRIVER_COMMAND: &str = "chromedriver";
const PREFERRED_PORTS: [u16; 3] = [9515, 9516, 9517];

/// Manages the chromedriver processes this program started
#[derive(Default)]
pub struct DriverManager {
    processes: Mutex<Vec<DriverProcess>>,
}

struct DriverProcess {
    child: Child,
    port: u16,
    url: String,
    #[cfg(unix)]
    process_group_id: Option<i32>,
}

impl DriverManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a chromedriver is reachable and return its URL.
    ///
    /// An explicit `external_url` is only probed, never spawned.
    pub async fn ensure_driver(&self, external_url: Option<&str>) -> Result<String> {
        if let Some(url) = external_url {
            if Self::is_driver_ready(url).await {
                return Ok(url.trim_end_matches('/').to_string());
            }
            anyhow::bail!("chromedriver at {} is not responding", url);
        }

        let managed: Vec<String> = {
            let processes = self.processes.lock().unwrap();
            processes.iter().map(|p| p.url.clone()).collect()
        };
        for url in managed {
            if Self::is_driver_ready(&url).await {
                debug!("Using managed chromedriver at {}", url);
                return Ok(url);
            }
        }

        let standard = format!("http://localhost:{}", PREFERRED_PORTS[0]);
        if Self::is_driver_ready(&standard).await {
            debug!("Found external chromedriver at {}", standard);
            return Ok(standard);
        }

        info!("chromedriver not detected, starting one");
        self.start_driver().await
    }

    async fn start_driver(&self) -> Result<String> {
        if !Self::command_exists(DRIVER_COMMAND) {
            anyhow::bail!(
                "{} not found in PATH. Install a chromedriver matching your Chrome version:\n\
                  macOS: brew install chromedriver\n\
                  Linux/Windows: https://googlechromelabs.github.io/chrome-for-testing/",
                DRIVER_COMMAND
            );
        }

        let port = Self::find_free_port()?;
        info!("Starting chromedriver on port {}", port);

        let mut cmd = Command::new(DRIVER_COMMAND);
        cmd.arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Own process group so Chrome children die with the driver
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .context(format!("Failed to start {}", DRIVER_COMMAND))?;

        #[cfg(unix)]
        let process_group_id = Some(child.id() as i32);

        let url = format!("http://localhost:{}", port);
        self.processes.lock().unwrap().push(DriverProcess {
            child,
            port,
            url: url.clone(),
            #[cfg(unix)]
            process_group_id,
        });

        for attempt in 1..=30 {
            if Self::is_driver_ready(&url).await {
                info!("chromedriver ready on port {}", port);
                return Ok(url);
            }
            if attempt < 30 {
                sleep(Duration::from_millis(100)).await;
            }
        }

        self.stop_port(port);
        anyhow::bail!("chromedriver failed to start within timeout")
    }

    /// Check if a command exists in PATH
    pub fn command_exists(command: &str) -> bool {
        let finder = if cfg!(windows) { "where" } else { "which" };
        Command::new(finder)
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Pick a preferred port when free, else let the OS assign one
    pub fn find_free_port() -> Result<u16> {
        if let Some(port) = PREFERRED_PORTS.iter().copied().find(|p| !Self::is_port_in_use(*p)) {
            return Ok(port);
        }
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        drop(listener);
        Ok(port)
    }

    pub fn is_port_in_use(port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }

    /// A driver is ready when `/status` reports `value.ready == true`
    pub async fn is_driver_ready(url: &str) -> bool {
        let status_url = format!("{}/status", url.trim_end_matches('/'));

        let response = match reqwest::Client::new()
            .get(&status_url)
            .timeout(Duration::from_secs(1))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            _ => return false,
        };

        match response.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("value")
                .and_then(|v| v.get("ready"))
                .and_then(|r| r.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn stop_port(&self, port: u16) {
        let mut processes = self.processes.lock().unwrap();
        if let Some(index) = processes.iter().position(|p| p.port == port) {
            let mut process = processes.remove(index);
            Self::kill(&mut process);
        }
    }

    fn kill(process: &mut DriverProcess) {
        #[cfg(unix)]
        if let Some(pgid) = process.process_group_id {
            debug!("Killing process group {} (port {})", pgid, process.port);
            Self::kill_process_group(pgid);
        }
        let _ = process.child.kill();
        let _ = process.child.wait();
    }

    #[cfg(unix)]
    fn kill_process_group(pgid: i32) {
        if let Err(e) = Command::new("kill")
            .args(["-TERM", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGTERM to process group {}: {}", pgid, e);
        }

        std::thread::sleep(Duration::from_millis(100));

        if let Err(e) = Command::new("kill")
            .args(["-KILL", &format!("-{}", pgid)])
            .output()
        {
            debug!("Failed to send SIGKILL to process group {}: {}", pgid, e);
        }
    }

    /// Stop every chromedriver this manager started
    pub fn stop_all(&self) {
        let mut processes = self.processes.lock().unwrap();
        for process in processes.iter_mut() {
            info!("Stopping chromedriver on port {}", process.port);
            Self::kill(process);
        }
        processes.clear();
    }

    pub fn managed_count(&self) -> usize {
        self.processes.lock().unwrap().len()
    }
}

impl Drop for DriverManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

lazy_static::lazy_static! {
    pub static ref GLOBAL_DRIVER_MANAGER: DriverManager = DriverManager::new();
}

#[cfg(test)]
#[path = "webdriver_manager_test.rs"]
mod webdriver_manager_test;
