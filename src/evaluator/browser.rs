use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::config::EvaluatorSettings;
use crate::errors::ProbeError;

use super::models::{DynamicChecks, PageReport};

pub const HEADER_NOT_FOUND: &str = "No <h1> found";

/// Abstraction over the headless browser for testability.
/// Real implementation: `ChromiumProbe`. Test double: `fakes::FakeProbe`.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<PageReport, ProbeError>;
}

/// Run the probe for `pages_url`, folding every failure into the result.
pub async fn dynamic_checks(probe: &dyn PageProbe, pages_url: Option<&str>) -> DynamicChecks {
    let Some(url) = pages_url.filter(|u| !u.trim().is_empty()) else {
        return DynamicChecks::skipped();
    };
    match probe.probe(url).await {
        Ok(report) => DynamicChecks::Probed(report),
        Err(e) => {
            warn!(url = %url, error = %e, "dynamic check failed");
            DynamicChecks::failed(e.to_string())
        }
    }
}

/// Launches one Chromium process per probe and always tears it down.
pub struct ChromiumProbe {
    navigation_timeout: Duration,
    screenshot_dir: PathBuf,
    chrome_executable: Option<PathBuf>,
}

impl ChromiumProbe {
    pub fn new(settings: &EvaluatorSettings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout,
            screenshot_dir: settings.screenshot_dir.clone(),
            chrome_executable: settings.chrome_executable.clone(),
        }
    }

    async fn inspect(&self, page: &Page, url: &str) -> Result<PageReport, ProbeError> {
        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| ProbeError::Timeout {
                url: url.to_string(),
                secs: self.navigation_timeout.as_secs(),
            })?
            .map_err(|e| ProbeError::Browser(e.to_string()))?;

        let title = page
            .get_title()
            .await
            .map_err(|e| ProbeError::Browser(e.to_string()))?
            .unwrap_or_default();

        let header = match page.find_element("h1").await {
            Ok(h1) => h1
                .inner_text()
                .await
                .map_err(|e| ProbeError::Browser(e.to_string()))?
                .unwrap_or_default(),
            Err(_) => HEADER_NOT_FOUND.to_string(),
        };

        let buttons = page
            .find_elements("button")
            .await
            .map_err(|e| ProbeError::Browser(e.to_string()))?;
        let button_clicked = match buttons.first() {
            Some(button) => {
                button
                    .click()
                    .await
                    .map_err(|e| ProbeError::Browser(e.to_string()))?;
                true
            }
            None => false,
        };

        std::fs::create_dir_all(&self.screenshot_dir)
            .map_err(|e| ProbeError::Browser(format!("screenshot dir: {}", e)))?;
        let screenshot_path = self
            .screenshot_dir
            .join(format!("{}.png", uuid::Uuid::new_v4()));
        page.save_screenshot(
            ScreenshotParams::builder().full_page(true).build(),
            &screenshot_path,
        )
        .await
        .map_err(|e| ProbeError::Browser(e.to_string()))?;

        Ok(PageReport {
            reachable: true,
            title,
            header,
            buttons_count: buttons.len(),
            button_clicked,
            screenshot_path: screenshot_path.display().to_string(),
        })
    }
}

#[async_trait]
impl PageProbe for ChromiumProbe {
    async fn probe(&self, url: &str) -> Result<PageReport, ProbeError> {
        let profile = tempfile::Builder::new()
            .prefix("pagesmith-chrome-")
            .tempdir()
            .map_err(|e| ProbeError::Launch(e.to_string()))?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(profile.path());
        if let Some(exe) = &self.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(ProbeError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProbeError::Launch(e.to_string()))?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!(url = %url, "browser launched");

        let result = match browser.new_page("about:blank").await {
            Ok(page) => self.inspect(&page, url).await,
            Err(e) => Err(ProbeError::Browser(e.to_string())),
        };

        if let Err(e) = browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "browser wait failed");
        }
        events.abort();
        let _ = events.await;
        debug!(url = %url, "browser torn down");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeProbe;

    fn report() -> PageReport {
        PageReport {
            reachable: true,
            title: "Counter".into(),
            header: "Count: 0".into(),
            buttons_count: 1,
            button_clicked: true,
            screenshot_path: "/tmp/shot.png".into(),
        }
    }

    #[tokio::test]
    async fn test_no_url_is_skipped_without_probing() {
        let probe = FakeProbe::reporting(report());
        assert_eq!(dynamic_checks(&probe, None).await, DynamicChecks::skipped());
        assert_eq!(dynamic_checks(&probe, Some("  ")).await, DynamicChecks::skipped());
        assert!(probe.visited().is_empty());
    }

    #[tokio::test]
    async fn test_successful_probe_is_recorded() {
        let probe = FakeProbe::reporting(report());
        let checks = dynamic_checks(&probe, Some("https://student.github.io/app/")).await;
        assert_eq!(checks, DynamicChecks::Probed(report()));
        assert_eq!(probe.visited(), vec!["https://student.github.io/app/".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_unreachable() {
        let probe = FakeProbe::failing(ProbeError::Timeout {
            url: "https://nowhere.invalid/".into(),
            secs: 15,
        });
        let checks = dynamic_checks(&probe, Some("https://nowhere.invalid/")).await;
        match checks {
            DynamicChecks::Failed { reachable, error } => {
                assert!(!reachable);
                assert!(error.contains("15s"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
