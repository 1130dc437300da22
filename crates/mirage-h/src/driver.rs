//! Headless Chromium implementation of the engine's driver traits.
//!
//! Non-CSS locators (text, role, test attribute) are resolved by injecting
//! a small finder script that tags the first match with a `data-mirage-hit`
//! attribute; the tagged node then doubles as a stable CSS handle for
//! state checks and interactions.

use async_trait::async_trait;
use chromiumoxide::{Element, Page};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

use mirage_engine::driver::{BrowserSession, DriverError, ElementId, PageDriver};
use mirage_engine::resolution::Locator;
use mirage_engine::session::{Cookie, SessionState};

use crate::cdp::CdpClient;

pub struct HeadlessSession {
    client: Option<CdpClient>,
    visible: bool,
}

impl HeadlessSession {
    pub fn new() -> Self {
        Self {
            client: None,
            visible: false,
        }
    }

    pub fn new_with_visibility(visible: bool) -> Self {
        Self {
            client: None,
            visible,
        }
    }
}

impl Default for HeadlessSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserSession for HeadlessSession {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching headless backend (Chromium)...");
        let client = CdpClient::launch(self.visible)
            .await
            .map_err(|e| DriverError::Interaction(format!("launch failed: {e}")))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Interaction(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn apply_session_state(&mut self, state: &SessionState) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetCookiesParams};

        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        let mut params = Vec::with_capacity(state.cookies.len());
        for c in &state.cookies {
            let mut builder = CookieParam::builder().name(&c.name).value(&c.value);
            if let Some(domain) = &c.domain {
                builder = builder.domain(domain);
            }
            if let Some(path) = &c.path {
                builder = builder.path(path);
            }
            if let Some(expires) = c.expires {
                builder = builder
                    .expires(chromiumoxide::cdp::browser_protocol::network::TimeSinceEpoch::new(
                        expires,
                    ));
            }
            if let Some(http_only) = c.http_only {
                builder = builder.http_only(http_only);
            }
            if let Some(secure) = c.secure {
                builder = builder.secure(secure);
            }
            params.push(
                builder
                    .build()
                    .map_err(|e| DriverError::Interaction(format!("cookie build error: {e}")))?,
            );
        }

        client
            .page
            .execute(SetCookiesParams::new(params))
            .await
            .map_err(|e| DriverError::Interaction(format!("set cookies failed: {e}")))?;
        info!("applied {} cookies to the session", state.cookies.len());
        Ok(())
    }

    async fn capture_session_state(&mut self) -> Result<SessionState, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        let cookies = client
            .page
            .get_cookies()
            .await
            .map_err(|e| DriverError::Interaction(format!("get cookies failed: {e}")))?;

        Ok(SessionState {
            cookies: cookies
                .into_iter()
                .map(|c| Cookie {
                    name: c.name,
                    value: c.value,
                    domain: Some(c.domain),
                    path: Some(c.path),
                    expires: Some(c.expires),
                    http_only: Some(c.http_only),
                    secure: Some(c.secure),
                })
                .collect(),
        })
    }

    async fn open_page(&mut self) -> Result<Box<dyn PageDriver>, DriverError> {
        let client = self.client.as_ref().ok_or(DriverError::NotReady)?;
        let page = client
            .new_page()
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(Box::new(HeadlessPage::new(page)))
    }
}

struct StoredElement {
    handle: Element,
    /// CSS handle to the tagged node, used for JS-side state checks.
    css: String,
}

pub struct HeadlessPage {
    page: Option<Page>,
    elements: HashMap<u32, StoredElement>,
    next_tag: u32,
    download_dir: Option<PathBuf>,
}

impl HeadlessPage {
    pub fn new(page: Page) -> Self {
        Self {
            page: Some(page),
            elements: HashMap::new(),
            next_tag: 0,
            download_dir: None,
        }
    }

    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    fn stored(&self, id: ElementId) -> Result<&StoredElement, DriverError> {
        self.elements
            .get(&id.0)
            .ok_or_else(|| DriverError::Interaction(format!("stale element id {}", id.0)))
    }

    async fn eval_bool(&self, js: &str) -> Result<bool, DriverError> {
        let page = self.page()?;
        page.evaluate(js)
            .await
            .map_err(|e| DriverError::Query(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| DriverError::Query(e.to_string()))
    }

    /// Run the finder script for a non-CSS locator; on a hit the node is
    /// tagged so it can be fetched by its CSS handle.
    async fn run_finder(&self, locator: &Locator, tag: u32) -> Result<bool, DriverError> {
        let spec = match locator {
            Locator::TextPattern { pattern } => serde_json::json!({
                "kind": "text", "pattern": pattern, "tag": tag,
            }),
            Locator::Role { role, name } => serde_json::json!({
                "kind": "role", "role": role, "name": name, "tag": tag,
            }),
            Locator::TestAttr { attr, value } => serde_json::json!({
                "kind": "attr", "attr": attr, "value": value, "tag": tag,
            }),
            Locator::Css { .. } => unreachable!("css handled without the finder"),
        };
        let js = finder_js(&spec);
        self.eval_bool(&js).await
    }
}

#[async_trait]
impl PageDriver for HeadlessPage {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        if let Err(e) = page.wait_for_navigation().await {
            debug!("wait_for_navigation after goto failed: {e}");
        }
        Ok(())
    }

    async fn page_url(&self) -> Result<String, DriverError> {
        let page = self.page()?;
        Ok(page
            .url()
            .await
            .map_err(|e| DriverError::Query(e.to_string()))?
            .unwrap_or_default())
    }

    async fn content(&self) -> Result<String, DriverError> {
        let page = self.page()?;
        page.content()
            .await
            .map_err(|e| DriverError::Query(e.to_string()))
    }

    async fn query(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError> {
        self.next_tag += 1;
        let tag = self.next_tag;

        let found = match locator {
            Locator::Css { selector } => {
                let js = tag_by_selector_js(selector, tag);
                match self.eval_bool(&js).await {
                    Ok(found) => found,
                    Err(e) => {
                        // Malformed selector or a page mid-mutation; a
                        // single-shot probe reports a miss either way.
                        debug!("css probe failed for '{selector}': {e}");
                        return Ok(None);
                    }
                }
            }
            other => match self.run_finder(other, tag).await {
                Ok(found) => found,
                Err(e) => {
                    debug!("finder probe failed: {e}");
                    return Ok(None);
                }
            },
        };

        if !found {
            return Ok(None);
        }

        let css = format!(r#"[data-mirage-hit="{tag}"]"#);
        let handle = match self.page()?.find_element(css.as_str()).await {
            Ok(el) => el,
            Err(e) => {
                debug!("tagged node vanished before pickup: {e}");
                return Ok(None);
            }
        };
        self.elements.insert(tag, StoredElement { handle, css });
        Ok(Some(ElementId(tag)))
    }

    async fn is_visible(&self, id: ElementId) -> Result<bool, DriverError> {
        let css = self.stored(id)?.css.clone();
        let js = format!(
            r#"(() => {{
  const el = document.querySelector('{css}');
  if (!el) return false;
  const cs = getComputedStyle(el);
  const r = el.getBoundingClientRect();
  return cs.visibility !== 'hidden' && cs.display !== 'none' && r.width > 0 && r.height > 0;
}})()"#
        );
        self.eval_bool(&js).await
    }

    async fn is_enabled(&self, id: ElementId) -> Result<bool, DriverError> {
        let css = self.stored(id)?.css.clone();
        let js = format!(
            r#"(() => {{
  const el = document.querySelector('{css}');
  if (!el) return false;
  if (el.disabled) return false;
  if (el.getAttribute('aria-disabled') === 'true') return false;
  return getComputedStyle(el).pointerEvents !== 'none';
}})()"#
        );
        self.eval_bool(&js).await
    }

    async fn scroll_into_view(&mut self, id: ElementId) -> Result<(), DriverError> {
        self.stored(id)?
            .handle
            .scroll_into_view()
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(())
    }

    async fn click(&mut self, id: ElementId) -> Result<(), DriverError> {
        self.stored(id)?
            .handle
            .click()
            .await
            .map_err(|e| DriverError::Interaction(e.to_string()))?;
        Ok(())
    }

    async fn clear(&mut self, id: ElementId) -> Result<(), DriverError> {
        let css = self.stored(id)?.css.clone();
        let js = format!(
            r#"(() => {{
  const el = document.querySelector('{css}');
  if (!el) return false;
  el.focus();
  if ('value' in el) {{
    el.value = '';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  }} else if (el.isContentEditable) {{
    el.innerText = '';
  }}
  return true;
}})()"#
        );
        if !self.eval_bool(&js).await? {
            return Err(DriverError::Interaction("element gone during clear".into()));
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        id: ElementId,
        text: &str,
        per_char_delay: Duration,
    ) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;

        // Focus via a real click so the site's own focus handlers run.
        self.click(id).await?;

        let page = self.page()?;
        for ch in text.chars() {
            page.execute(InsertTextParams::new(ch.to_string()))
                .await
                .map_err(|e| DriverError::Interaction(format!("insert text failed: {e}")))?;
            if !per_char_delay.is_zero() {
                tokio::time::sleep(per_char_delay).await;
            }
        }
        Ok(())
    }

    async fn element_text(&self, id: ElementId) -> Result<String, DriverError> {
        let text = self
            .stored(id)?
            .handle
            .inner_text()
            .await
            .map_err(|e| DriverError::Query(e.to_string()))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(
        &self,
        id: ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.stored(id)?
            .handle
            .attribute(name)
            .await
            .map_err(|e| DriverError::Query(e.to_string()))
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::input::{
            DispatchKeyEventParams, DispatchKeyEventType,
        };

        let page = self.page()?;

        let key_down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .key(key)
            .build()
            .map_err(|e| DriverError::Interaction(format!("failed to build key event: {e:?}")))?;
        page.execute(key_down)
            .await
            .map_err(|e| DriverError::Interaction(format!("key down failed: {e}")))?;

        let key_up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(key)
            .build()
            .map_err(|e| DriverError::Interaction(format!("failed to build key event: {e:?}")))?;
        page.execute(key_up)
            .await
            .map_err(|e| DriverError::Interaction(format!("key up failed: {e}")))?;

        Ok(())
    }

    async fn type_chars(&mut self, text: &str) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
        let page = self.page()?;
        page.execute(InsertTextParams::new(text.to_string()))
            .await
            .map_err(|e| DriverError::Interaction(format!("insert text failed: {e}")))?;
        Ok(())
    }

    async fn arm_download_capture(&mut self) -> Result<(), DriverError> {
        use chromiumoxide::cdp::browser_protocol::browser::{
            SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
        };

        let dir = scoped_download_dir()
            .map_err(|e| DriverError::Download(format!("could not create download dir: {e}")))?;

        let page = self.page()?;
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(|e| DriverError::Download(format!("failed to build params: {e:?}")))?;
        page.execute(params)
            .await
            .map_err(|e| DriverError::Download(format!("set download behavior failed: {e}")))?;

        debug!("download capture armed into {}", dir.display());
        self.download_dir = Some(dir);
        Ok(())
    }

    async fn await_download(&mut self, timeout: Duration) -> Result<PathBuf, DriverError> {
        let dir = self
            .download_dir
            .clone()
            .ok_or_else(|| DriverError::Download("capture not armed".into()))?;

        let deadline = tokio::time::Instant::now() + timeout;
        let mut last: Option<(PathBuf, u64)> = None;
        loop {
            if let Some(current) = newest_complete_file(&dir) {
                // Two consecutive sightings with a stable size means the
                // transfer is done.
                if let Some(previous) = &last {
                    if previous == &current && current.1 > 0 {
                        return Ok(current.0);
                    }
                }
                last = Some(current);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DriverError::Download("download timed out".into()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| DriverError::Interaction(e.to_string()))?;
        }
        self.elements.clear();
        Ok(())
    }
}

fn scoped_download_dir() -> std::io::Result<PathBuf> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("mirage-dl-{}-{}", std::process::id(), nanos));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Newest file in the download dir that is not an in-progress transfer.
fn newest_complete_file(dir: &std::path::Path) -> Option<(PathBuf, u64)> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            !name.ends_with(".crdownload") && !name.ends_with(".tmp")
        })
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().ok()?;
            Some((e.path(), meta.len(), modified))
        })
        .max_by_key(|(_, _, modified)| *modified)
        .map(|(path, len, _)| (path, len))
}

fn tag_by_selector_js(selector: &str, tag: u32) -> String {
    let selector = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".into());
    format!(
        r#"(() => {{
  const el = document.querySelector({selector});
  if (!el) return false;
  el.setAttribute('data-mirage-hit', '{tag}');
  return true;
}})()"#
    )
}

fn finder_js(spec: &serde_json::Value) -> String {
    let spec = spec.to_string();
    format!(
        r#"(() => {{
  const spec = {spec};
  const mark = (el) => {{ el.setAttribute('data-mirage-hit', String(spec.tag)); return true; }};
  if (spec.kind === 'text') {{
    const re = new RegExp(spec.pattern, 'i');
    const nodes = document.querySelectorAll('button, a, [role], option, li, label, span, div');
    for (const el of nodes) {{
      const t = (el.innerText || '').trim();
      if (t && t.length < 200 && re.test(t)) return mark(el);
    }}
    return false;
  }}
  if (spec.kind === 'role') {{
    const implicit = {{ button: ', button', option: ', option', link: ', a[href]' }};
    const sel = '[role="' + spec.role + '"]' + (implicit[spec.role] || '');
    const re = spec.name ? new RegExp(spec.name, 'i') : null;
    for (const el of document.querySelectorAll(sel)) {{
      const label = (el.getAttribute('aria-label') || el.innerText || '').trim();
      if (!re || re.test(label)) return mark(el);
    }}
    return false;
  }}
  if (spec.kind === 'attr') {{
    const el = document.querySelector('[' + spec.attr + '="' + spec.value + '"]');
    return el ? mark(el) : false;
  }}
  return false;
}})()"#
    )
}
