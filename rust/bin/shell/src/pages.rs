//! The explorer's pages.

use std::sync::Arc;

use argo_flux::views::escape;
use argo_flux::{ApiError, AppContext, Component, ComponentContext, ComponentError, StateValue};
use serde_json::Value;
use tracing::{debug, info};

pub const CHAT_MESSAGES_KEY: &str = "chatMessages";
pub const REGIONS_KEY: &str = "regions";
pub const PROFILES_KEY: &str = "profiles";
pub const SELECTED_REGION_KEY: &str = "selectedRegion";
pub const SYSTEM_STATUS_KEY: &str = "systemStatus";

const PROFILE_LIMIT: usize = 50;

/// Every page, keyed by route.
pub fn routes() -> Vec<(&'static str, Arc<dyn Component>)> {
    vec![
        ("/", Arc::new(Home) as Arc<dyn Component>),
        ("/dashboard", Arc::new(Dashboard) as Arc<dyn Component>),
        ("/chat", Arc::new(Chat) as Arc<dyn Component>),
        ("/explorer", Arc::new(Explorer) as Arc<dyn Component>),
        ("/profiles", Arc::new(Profiles) as Arc<dyn Component>),
    ]
}

fn flag(ctx: &ComponentContext, key: &str) -> bool {
    ctx.app()
        .store()
        .get(key)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

// ── Home ──

pub struct Home;

#[async_trait::async_trait]
impl Component for Home {
    fn name(&self) -> &str {
        "Home"
    }

    fn title(&self) -> Option<String> {
        Some("Home".into())
    }

    fn description(&self) -> Option<String> {
        Some("Ask questions about Indian Ocean ARGO float data".into())
    }

    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError> {
        let i18n = ctx.app().i18n();
        let api = if flag(ctx, "apiConnected") {
            "connected"
        } else {
            "disconnected"
        };
        Ok(format!(
            "<h1>{}</h1>\n<p>{}</p>\n<p>API: {}</p>\n<input placeholder=\"{}\">",
            escape(&i18n.t("title")),
            escape(&i18n.t("subtitle")),
            api,
            escape(&i18n.t("query_placeholder")),
        ))
    }
}

// ── Dashboard ──

pub struct Dashboard;

#[async_trait::async_trait]
impl Component for Dashboard {
    fn name(&self) -> &str {
        "Dashboard"
    }

    fn title(&self) -> Option<String> {
        Some("Dashboard".into())
    }

    fn description(&self) -> Option<String> {
        Some("Database, vector store and model status".into())
    }

    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError> {
        Ok(dashboard_markup(ctx.app()))
    }

    async fn init(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.rerender_on(SYSTEM_STATUS_KEY, dashboard_markup);
        let status = ctx
            .app()
            .backend()
            .system_status()
            .await
            .map_err(|e| ComponentError::new(self.name(), e.user_message()))?;
        if ctx.set_if_current(SYSTEM_STATUS_KEY, StateValue::new(status)) {
            info!("system status refreshed");
        }
        Ok(())
    }
}

fn dashboard_markup(app: &AppContext) -> String {
    let status = app
        .store()
        .get(SYSTEM_STATUS_KEY)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "loading…".into());
    format!("<h1>System status</h1>\n<pre>{}</pre>", escape(&status))
}

// ── Chat ──

pub struct Chat;

#[async_trait::async_trait]
impl Component for Chat {
    fn name(&self) -> &str {
        "Chat"
    }

    fn title(&self) -> Option<String> {
        Some("Chat".into())
    }

    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError> {
        Ok(chat_markup(ctx.app()))
    }

    async fn init(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.watch(CHAT_MESSAGES_KEY, |new, _, _| {
            let count = new.and_then(|v| v.as_array().map(Vec::len)).unwrap_or(0);
            debug!(count, "chat updated");
        });
        ctx.rerender_on(CHAT_MESSAGES_KEY, chat_markup);
        Ok(())
    }
}

fn chat_markup(app: &AppContext) -> String {
    let messages = app.store().get(CHAT_MESSAGES_KEY);
    let mut out = String::from("<h1>Chat</h1>\n<ul>");
    for message in messages.iter().flat_map(|m| m.as_array().cloned().unwrap_or_default()) {
        out.push_str(&format!(
            "\n<li class=\"{}\">{}</li>",
            message["role"].as_str().unwrap_or("user"),
            escape(message["text"].as_str().unwrap_or_default())
        ));
    }
    out.push_str("\n</ul>");
    out
}

/// Send `text` to the backend and append the exchange to the chat log.
pub async fn ask(ctx: &AppContext, text: &str) -> Result<String, ApiError> {
    append_message(ctx, "user", text);
    let response = ctx.backend().query(text, &ctx.language()).await?;
    let answer = response
        .get("response")
        .or_else(|| response.get("answer"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| response.to_string());
    append_message(ctx, "assistant", &answer);
    Ok(answer)
}

fn append_message(ctx: &AppContext, role: &str, text: &str) {
    let mut messages = ctx
        .store()
        .get(CHAT_MESSAGES_KEY)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    messages.push(serde_json::json!({ "role": role, "text": text }));
    ctx.store().set(CHAT_MESSAGES_KEY, Value::Array(messages));
}

// ── Explorer ──

pub struct Explorer;

#[async_trait::async_trait]
impl Component for Explorer {
    fn name(&self) -> &str {
        "Explorer"
    }

    fn title(&self) -> Option<String> {
        Some("Explorer".into())
    }

    fn description(&self) -> Option<String> {
        Some("Browse ocean regions".into())
    }

    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError> {
        Ok(explorer_markup(ctx.app()))
    }

    async fn init(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.rerender_on(SELECTED_REGION_KEY, explorer_markup);
        ctx.rerender_on(REGIONS_KEY, explorer_markup);
        match ctx.app().backend().regions().await {
            Ok(regions) => {
                ctx.set_if_current(REGIONS_KEY, StateValue::new(regions));
            }
            // The page still works without the region list.
            Err(e) => {
                ctx.app().notifier().warning(e.user_message());
            }
        }
        Ok(())
    }
}

fn explorer_markup(app: &AppContext) -> String {
    let selected = selected_region(app).unwrap_or_else(|| "all".into());
    let mut out = format!("<h1>Explorer</h1>\n<p>Region: {}</p>\n<ul>", escape(&selected));
    let regions = app.store().get(REGIONS_KEY);
    for region in regions.iter().flat_map(|r| r.as_array().cloned().unwrap_or_default()) {
        let name = region
            .as_str()
            .map(str::to_string)
            .or_else(|| region["name"].as_str().map(str::to_string))
            .unwrap_or_else(|| region.to_string());
        out.push_str(&format!("\n<li>{}</li>", escape(&name)));
    }
    out.push_str("\n</ul>");
    out
}

fn selected_region(app: &AppContext) -> Option<String> {
    app.store()
        .get(SELECTED_REGION_KEY)
        .and_then(|v| v.as_str().map(str::to_string))
}

// ── Profiles ──

pub struct Profiles;

#[async_trait::async_trait]
impl Component for Profiles {
    fn name(&self) -> &str {
        "Profiles"
    }

    fn title(&self) -> Option<String> {
        Some("Float profiles".into())
    }

    fn render(&self, ctx: &ComponentContext) -> Result<String, ComponentError> {
        Ok(profiles_markup(ctx.app()))
    }

    async fn init(&self, ctx: &ComponentContext) -> Result<(), ComponentError> {
        ctx.rerender_on(PROFILES_KEY, profiles_markup);
        let region = selected_region(ctx.app());
        let profiles = ctx
            .app()
            .backend()
            .profiles(region.as_deref(), PROFILE_LIMIT)
            .await
            .map_err(|e| ComponentError::new(self.name(), e.user_message()))?;
        ctx.set_if_current(PROFILES_KEY, StateValue::new(profiles));
        Ok(())
    }
}

fn profiles_markup(app: &AppContext) -> String {
    let Some(profiles) = app.store().get(PROFILES_KEY) else {
        return "<h1>Float profiles</h1>\n<p>loading…</p>".into();
    };
    let rows = profiles
        .as_array()
        .or_else(|| profiles["profiles"].as_array())
        .cloned()
        .unwrap_or_default();
    let mut out = format!("<h1>Float profiles</h1>\n<p>{} profiles</p>\n<ul>", rows.len());
    for row in &rows {
        let float = row["float_id"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| row["float_id"].to_string());
        out.push_str(&format!(
            "\n<li>{} ({}, {})</li>",
            escape(&float),
            row["latitude"],
            row["longitude"]
        ));
    }
    out.push_str("\n</ul>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_flux::{AppConfig, Backend, Bootstrap, MemorySurface, RequestOptions, Surface};
    use serde_json::json;

    struct Stub;

    #[async_trait::async_trait]
    impl Backend for Stub {
        async fn request(&self, endpoint: &str, _options: RequestOptions) -> Result<Value, ApiError> {
            match endpoint {
                "/health" => Ok(json!({"status": "healthy"})),
                "/system-status" => Ok(json!({"database": "connected"})),
                "/profiles" => Ok(json!([
                    {"float_id": "2902746", "latitude": 12.5, "longitude": 68.1}
                ])),
                _ => Err(ApiError::from_status(404, "not found", None)),
            }
        }
    }

    async fn boot(surface: &Arc<MemorySurface>) -> argo_flux::App {
        let mut boot = Bootstrap::new(AppConfig::with_default_shortcuts())
            .backend(Arc::new(Stub))
            .surface(surface.clone());
        for (path, component) in routes() {
            boot = boot.route(path, component);
        }
        boot.start().await.unwrap()
    }

    // ========================================================================
    // Re-render
    // ========================================================================

    #[tokio::test]
    async fn profiles_show_fetched_rows() {
        let surface = Arc::new(MemorySurface::new());
        let app = boot(&surface).await;

        app.router().navigate("/profiles", false);
        app.router().process_pending().await;

        assert!(surface.markup().contains("2902746"));
        assert!(surface.markup().contains("1 profiles"));
    }

    #[tokio::test]
    async fn chat_follows_new_messages() {
        let surface = Arc::new(MemorySurface::new());
        let app = boot(&surface).await;

        app.router().navigate("/chat", false);
        app.router().process_pending().await;
        assert!(!surface.markup().contains("<li"));

        app.context().store().set(
            CHAT_MESSAGES_KEY,
            json!([{"role": "user", "text": "salinity near Chennai"}]),
        );
        assert!(surface.markup().contains("salinity near Chennai"));
    }
}
