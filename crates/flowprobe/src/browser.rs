//! Chromium page driver over CDP.
//!
//! Only compiled with the `browser` feature. A [`CdpPage`] owns the browser
//! process, the protocol handler task and the single page a scenario runs
//! on; closing it releases all three.

#![allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]

use crate::config::BrowserSettings;
use crate::driver::{ConsoleMessage, ConsoleSeverity, PageDriver};
use crate::result::{ProbeError, ProbeResult};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Launched Chromium instance
#[derive(Debug)]
pub struct Browser {
    inner: CdpBrowser,
    handler: JoinHandle<()>,
}

impl Browser {
    /// Launch Chromium with the given settings
    pub async fn launch(settings: &BrowserSettings) -> ProbeResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(settings.viewport_width, settings.viewport_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (inner, mut handler) =
            CdpBrowser::launch(config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });
        info!(headless = settings.headless, "browser launched");
        Ok(Self { inner, handler })
    }

    /// Open the scenario page and hand ownership of the browser to it
    pub async fn into_page(self) -> ProbeResult<CdpPage> {
        let page = self
            .inner
            .new_page("about:blank")
            .await
            .map_err(|e| ProbeError::Page {
                message: e.to_string(),
            })?;

        let console = Arc::new(Mutex::new(Vec::new()));
        let mut events = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(|e| ProbeError::Page {
                message: e.to_string(),
            })?;
        let sink = Arc::clone(&console);
        let listener = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let message = console_message(&event);
                info!(target: "flowprobe::console", severity = %message.severity, "{}", message.text);
                sink.lock().await.push(message);
            }
        });

        Ok(CdpPage {
            browser: Some(self.inner),
            page: Some(page),
            handler: Some(self.handler),
            listener: Some(listener),
            console,
        })
    }
}

fn console_message(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let kind = format!("{:?}", event.r#type);
    let text = event
        .args
        .iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(v), _) => v.to_string(),
            (None, Some(d)) => d.clone(),
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    ConsoleMessage::new(ConsoleSeverity::from_protocol(&kind), text)
}

/// Launch a browser and open the page a scenario runs on
pub async fn launch_page(settings: &BrowserSettings) -> ProbeResult<CdpPage> {
    Browser::launch(settings).await?.into_page().await
}

/// A page driven over CDP; owns its browser
#[derive(Debug)]
pub struct CdpPage {
    browser: Option<CdpBrowser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
    console: Arc<Mutex<Vec<ConsoleMessage>>>,
}

impl CdpPage {
    fn page(&self) -> ProbeResult<&Page> {
        self.page.as_ref().ok_or_else(|| ProbeError::Page {
            message: "page already closed".to_string(),
        })
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        debug!(%url, "navigating");
        self.page()?
            .goto(url)
            .await
            .map_err(|e| ProbeError::NavigationFailure {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn reload(&mut self) -> ProbeResult<()> {
        let page = self.page()?;
        page.reload().await.map_err(|e| ProbeError::NavigationFailure {
            url: "(reload)".to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    async fn add_init_script(&mut self, script: &str) -> ProbeResult<()> {
        self.page()?
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| ProbeError::script(e.to_string()))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self
            .page()?
            .execute(params)
            .await
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(|e| ProbeError::Screenshot {
                message: e.to_string(),
            })
    }

    async fn console_messages(&self) -> ProbeResult<Vec<ConsoleMessage>> {
        Ok(self.console.lock().await.clone())
    }

    async fn current_url(&self) -> ProbeResult<String> {
        let url = self.page()?.url().await.map_err(|e| ProbeError::Page {
            message: e.to_string(),
        })?;
        Ok(url.unwrap_or_default())
    }

    async fn close(&mut self) -> ProbeResult<()> {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        let mut first_error = None;
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "page close failed");
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser close failed");
                first_error.get_or_insert_with(|| e.to_string());
            }
            if let Err(e) = browser.wait().await {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        info!("browser released");
        match first_error {
            Some(message) => Err(ProbeError::Page { message }),
            None => Ok(()),
        }
    }
}
