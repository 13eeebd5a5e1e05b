use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::browser::{Browser, Document, IsolatedSession, NodeRef, QueryScope};
use crate::cdp::CdpClient;
use crate::error::{CrawlError, Result};

/// Request identity applied to every page before it navigates.
#[derive(Debug, Clone)]
pub struct PageProfile {
    pub user_agent: String,
    pub accept_language: String,
    pub referer: String,
}

impl Default for PageProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            referer: "https://www.google.com/".to_string(),
        }
    }
}

/// Turn a DevTools endpoint into the browser-level WebSocket URL.
///
/// Accepts a ws:// URL as-is; an http:// base is asked for its socket via
/// the /json/version document the browser serves.
pub async fn resolve_ws_url(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }
    let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let version: Value = reqwest::get(&version_url).await?.json().await?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CrawlError::ParseError(format!(
                "no webSocketDebuggerUrl in response from {version_url}"
            ))
        })
}

/// A running browser reached over its DevTools socket.
pub struct ChromeBrowser {
    client: Arc<CdpClient>,
    profile: PageProfile,
    navigation_timeout: Duration,
}

impl ChromeBrowser {
    pub async fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_profile(endpoint, PageProfile::default()).await
    }

    pub async fn connect_with_profile(endpoint: &str, profile: PageProfile) -> Result<Self> {
        let ws_url = resolve_ws_url(endpoint).await?;
        debug!("connecting to devtools socket at {}", ws_url);
        let client = CdpClient::connect(&ws_url).await?;
        Ok(Self {
            client: Arc::new(client),
            profile,
            navigation_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Open a page in the browser's default storage partition.
    pub async fn page(&self) -> Result<ChromePage> {
        self.create_page(None).await
    }

    async fn create_page(&self, context_id: Option<&str>) -> Result<ChromePage> {
        let mut params = json!({ "url": "about:blank" });
        if let Some(context) = context_id {
            params["browserContextId"] = Value::String(context.to_string());
        }
        let created = self.client.call(None, "Target.createTarget", params).await?;
        let target_id = string_field(&created, "targetId")?;

        let attached = self
            .client
            .call(
                None,
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = string_field(&attached, "sessionId")?;

        let page = ChromePage {
            client: Arc::clone(&self.client),
            session_id,
            target_id,
            context_id: context_id.map(str::to_string),
            navigation_timeout: self.navigation_timeout,
        };
        page.apply_profile(&self.profile).await?;
        Ok(page)
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn isolated_session(&self) -> Result<Box<dyn IsolatedSession>> {
        let created = self
            .client
            .call(
                None,
                "Target.createBrowserContext",
                json!({ "disposeOnDetach": true }),
            )
            .await?;
        let context_id = string_field(&created, "browserContextId")?;

        match self.create_page(Some(&context_id)).await {
            Ok(page) => Ok(Box::new(page)),
            Err(e) => {
                // The context must not outlive its failed page.
                let _ = self
                    .client
                    .call(
                        None,
                        "Target.disposeBrowserContext",
                        json!({ "browserContextId": context_id }),
                    )
                    .await;
                Err(e)
            }
        }
    }
}

/// One attached page. Element handles are remote object ids scoped to this
/// page's session and go stale when it navigates.
pub struct ChromePage {
    client: Arc<CdpClient>,
    session_id: String,
    target_id: String,
    context_id: Option<String>,
    navigation_timeout: Duration,
}

impl ChromePage {
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.client
            .call(Some(&self.session_id), method, params)
            .await
    }

    async fn apply_profile(&self, profile: &PageProfile) -> Result<()> {
        self.call("Network.enable", json!({})).await?;
        self.call(
            "Network.setUserAgentOverride",
            json!({
                "userAgent": profile.user_agent,
                "acceptLanguage": profile.accept_language,
            }),
        )
        .await?;
        self.call(
            "Network.setExtraHTTPHeaders",
            json!({ "headers": { "Referer": profile.referer } }),
        )
        .await?;
        Ok(())
    }

    async fn evaluate_value(&self, expression: &str) -> Result<Value> {
        let response = self
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        let mut remote = take_remote_object(response)?;
        Ok(remote
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn evaluate_object(&self, expression: &str) -> Result<Value> {
        let response = self
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": false }),
            )
            .await?;
        take_remote_object(response)
    }

    /// Call a function with the given remote object bound as `this`.
    async fn call_on(
        &self,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
        by_value: bool,
    ) -> Result<Value> {
        let arguments: Vec<Value> = args.into_iter().map(|v| json!({ "value": v })).collect();
        let response = self
            .call(
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "returnByValue": by_value,
                }),
            )
            .await?;
        take_remote_object(response)
    }

    /// Unpack a NodeList remote object into per-element handles, in index
    /// order, and release the container.
    async fn unpack_node_list(&self, list: Value) -> Result<Vec<NodeRef>> {
        let Some(list_id) = list.get("objectId").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };
        let response = self
            .call(
                "Runtime.getProperties",
                json!({ "objectId": list_id, "ownProperties": true }),
            )
            .await?;

        let mut indexed: Vec<(usize, NodeRef)> = Vec::new();
        if let Some(properties) = response.get("result").and_then(Value::as_array) {
            for property in properties {
                let Some(index) = property
                    .get("name")
                    .and_then(Value::as_str)
                    .and_then(|name| name.parse::<usize>().ok())
                else {
                    continue;
                };
                if let Some(object_id) =
                    property.pointer("/value/objectId").and_then(Value::as_str)
                {
                    indexed.push((index, NodeRef::new(object_id)));
                }
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        let _ = self
            .call("Runtime.releaseObject", json!({ "objectId": list_id }))
            .await;

        Ok(indexed.into_iter().map(|(_, node)| node).collect())
    }

    async fn navigate_and_settle(&self, url: &str) -> Result<()> {
        let response = self.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error_text) = response.get("errorText").and_then(Value::as_str)
            && !error_text.is_empty()
        {
            return Err(CrawlError::Other(format!(
                "navigation to {url} failed: {error_text}"
            )));
        }

        // Let the new document come into existence before polling it, or the
        // first readyState read can answer for the page we just left.
        sleep(Duration::from_millis(100)).await;

        let deadline = Instant::now() + self.navigation_timeout;
        loop {
            let state = self.evaluate_value("document.readyState").await?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::Timeout(format!(
                    "page at {url} never became ready"
                )));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl Document for ChromePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("navigating to {}", url);
        self.navigate_and_settle(url).await
    }

    async fn html(&self) -> Result<String> {
        let value = self
            .evaluate_value("document.documentElement.outerHTML")
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CrawlError::ParseError("page markup was not a string".to_string()))
    }

    async fn query(&self, scope: QueryScope<'_>, selector: &str) -> Result<Vec<NodeRef>> {
        let list = match scope {
            QueryScope::Page => {
                let expression = format!(
                    "document.querySelectorAll({})",
                    serde_json::to_string(selector)?
                );
                self.evaluate_object(&expression).await?
            }
            QueryScope::Node(node) => {
                self.call_on(
                    node.id(),
                    "function(selector) { return this.querySelectorAll(selector); }",
                    vec![Value::String(selector.to_string())],
                    false,
                )
                .await?
            }
        };
        self.unpack_node_list(list).await
    }

    async fn text(&self, node: &NodeRef) -> Result<Option<String>> {
        let remote = self
            .call_on(
                node.id(),
                "function() { return this.textContent; }",
                vec![],
                true,
            )
            .await?;
        Ok(remote
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn attr(&self, node: &NodeRef, name: &str) -> Result<Option<String>> {
        let remote = self
            .call_on(
                node.id(),
                "function(name) { return this.getAttribute(name); }",
                vec![Value::String(name.to_string())],
                true,
            )
            .await?;
        Ok(remote
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn click(&self, node: &NodeRef) -> Result<()> {
        self.call_on(node.id(), "function() { this.click(); }", vec![], true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IsolatedSession for ChromePage {
    async fn close(self: Box<Self>) -> Result<()> {
        let closed = self
            .client
            .call(
                None,
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
            )
            .await;
        if let Some(context_id) = &self.context_id {
            // The context goes down no matter how the target close went.
            let disposed = self
                .client
                .call(
                    None,
                    "Target.disposeBrowserContext",
                    json!({ "browserContextId": context_id }),
                )
                .await;
            closed.and(disposed)?;
        } else {
            closed?;
        }
        Ok(())
    }
}

/// Unwrap a Runtime call response, surfacing page-side exceptions.
fn take_remote_object(mut response: Value) -> Result<Value> {
    if let Some(details) = response.get("exceptionDetails") {
        let text = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("unknown script exception");
        return Err(CrawlError::JsError(text.to_string()));
    }
    Ok(response
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CrawlError::ParseError(format!("response missing '{field}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn ws_urls_pass_through_untouched() {
        let url = resolve_ws_url("ws://127.0.0.1:9222/devtools/browser/abc")
            .await
            .unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn http_endpoint_is_asked_for_its_socket() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "Chrome/120.0.0.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/fa3c"
            })))
            .mount(&server)
            .await;

        let url = resolve_ws_url(&server.uri()).await.unwrap();
        assert_eq!(url, "ws://127.0.0.1:9222/devtools/browser/fa3c");
    }

    #[tokio::test]
    async fn missing_socket_url_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "Browser": "Chrome/120.0.0.0" })),
            )
            .mount(&server)
            .await;

        assert!(resolve_ws_url(&server.uri()).await.is_err());
    }

    #[test]
    fn script_exceptions_surface_as_errors() {
        let response = serde_json::json!({
            "result": { "type": "undefined" },
            "exceptionDetails": {
                "text": "Uncaught",
                "exception": { "description": "TypeError: x is not a function" }
            }
        });
        match take_remote_object(response) {
            Err(CrawlError::JsError(text)) => {
                assert!(text.contains("TypeError"));
            }
            other => panic!("expected JsError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn remote_values_unwrap_to_the_result_object() {
        let response = serde_json::json!({ "result": { "value": "complete" } });
        let remote = take_remote_object(response).unwrap();
        assert_eq!(remote["value"], "complete");
    }
}
