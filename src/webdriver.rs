use anyhow::{Context, Result};
use serde_json::{json, Value};

/// Minimal W3C WebDriver client: just enough to keep one page open.
pub struct WebDriverClient {
    pub endpoint: String,
    client: reqwest::Client,
}

/// Browser launch parameters for a new session.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub browser: String,
    pub args: Vec<String>,
}

impl BrowserOptions {
    fn capabilities(&self) -> Value {
        let mut always_match = json!({ "browserName": self.browser });
        let vendor_key = match self.browser.to_lowercase().as_str() {
            "microsoftedge" | "msedge" | "edge" => Some("ms:edgeOptions"),
            "chrome" | "chromium" => Some("goog:chromeOptions"),
            "firefox" => Some("moz:firefoxOptions"),
            _ => None,
        };
        if let Some(key) = vendor_key {
            let mut options = json!({ "args": self.args });
            if key != "moz:firefoxOptions" {
                options["excludeSwitches"] = json!(["enable-automation"]);
            }
            always_match[key] = options;
        }
        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

impl WebDriverClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Start a browser and return its session id.
    pub async fn new_session(&self, options: &BrowserOptions) -> Result<String> {
        let body = self
            .send(
                self.client
                    .post(format!("{}/session", self.endpoint))
                    .json(&options.capabilities()),
            )
            .await
            .context("Failed to create WebDriver session")?;

        // W3C puts the id under `value`; older drivers at the top level.
        let session_id = body["value"]["sessionId"]
            .as_str()
            .or_else(|| body["sessionId"].as_str())
            .context("No sessionId in WebDriver response")?
            .to_string();

        Ok(session_id)
    }

    pub async fn current_url(&self, session_id: &str) -> Result<String> {
        let body = self
            .send(
                self.client
                    .get(format!("{}/session/{}/url", self.endpoint, session_id)),
            )
            .await?;
        Ok(body["value"].as_str().unwrap_or_default().to_string())
    }

    pub async fn navigate(&self, session_id: &str, url: &str) -> Result<()> {
        self.send(
            self.client
                .post(format!("{}/session/{}/url", self.endpoint, session_id))
                .json(&json!({ "url": url })),
        )
        .await?;
        Ok(())
    }

    pub async fn refresh(&self, session_id: &str) -> Result<()> {
        self.send(
            self.client
                .post(format!("{}/session/{}/refresh", self.endpoint, session_id))
                .json(&json!({})),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.send(
            self.client
                .delete(format!("{}/session/{}", self.endpoint, session_id)),
        )
        .await?;
        Ok(())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .context("Failed to reach WebDriver")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&error_text)
                .ok()
                .and_then(|v| v["value"]["message"].as_str().map(str::to_string))
                .unwrap_or(error_text);
            anyhow::bail!("WebDriver error ({}): {}", status, message);
        }

        response
            .json()
            .await
            .context("Failed to parse WebDriver response")
    }
}
