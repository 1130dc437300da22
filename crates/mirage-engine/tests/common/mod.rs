//! Scripted fake driver used by the integration tests. Elements are keyed
//! by a canonical locator string and can be told to appear only after a
//! given number of queries, which is how the polling tests are staged.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mirage_engine::driver::{BrowserSession, DriverError, ElementId, PageDriver};
use mirage_engine::resolution::Locator;
use mirage_engine::session::SessionState;

pub fn locator_key(locator: &Locator) -> String {
    match locator {
        Locator::Css { selector } => selector.clone(),
        Locator::TextPattern { pattern } => format!("text:{pattern}"),
        Locator::Role { role, name } => format!("role:{role}:{name}"),
        Locator::TestAttr { attr, value } => format!("attr:{attr}:{value}"),
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub visible: bool,
    pub enabled: bool,
    pub text: String,
    pub attrs: HashMap<String, String>,
    /// Queries of this locator that must happen before the element is
    /// reported present.
    pub appear_after: u32,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self {
            visible: true,
            enabled: true,
            text: String::new(),
            attrs: HashMap::new(),
            appear_after: 0,
        }
    }
}

impl FakeElement {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(name: &str, value: &str) -> Self {
        Self {
            attrs: HashMap::from([(name.to_string(), value.to_string())]),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

#[derive(Default)]
pub struct PageState {
    pub elements: HashMap<String, FakeElement>,
    pub query_counts: HashMap<String, u32>,
    pub query_log: Vec<String>,
    pub clicks: Vec<ElementId>,
    pub cleared: Vec<ElementId>,
    pub typed: Vec<(ElementId, String)>,
    pub keys: Vec<String>,
    pub chars: Vec<String>,
    pub navigations: Vec<String>,
    pub url: String,
    pub content: String,
    pub download: Option<PathBuf>,
    pub armed: bool,
    pub closed: u32,
    /// Every query hangs, for deadline tests.
    pub stall_queries: bool,
    /// Every query errors, for degraded-page tests.
    pub fail_queries: bool,
    by_id: HashMap<u32, String>,
    ids: HashMap<String, u32>,
    next_id: u32,
}

impl PageState {
    pub fn insert(&mut self, key: &str, element: FakeElement) {
        self.elements.insert(key.to_string(), element);
    }

    pub fn queries_of(&self, key: &str) -> u32 {
        self.query_counts.get(key).copied().unwrap_or(0)
    }

    fn id_for(&mut self, key: &str) -> ElementId {
        if let Some(id) = self.ids.get(key) {
            return ElementId(*id);
        }
        self.next_id += 1;
        self.ids.insert(key.to_string(), self.next_id);
        self.by_id.insert(self.next_id, key.to_string());
        ElementId(self.next_id)
    }

    fn element_by_id(&self, id: ElementId) -> Option<&FakeElement> {
        self.by_id.get(&id.0).and_then(|k| self.elements.get(k))
    }
}

pub struct FakePage {
    pub state: Arc<Mutex<PageState>>,
}

impl FakePage {
    pub fn new(state: Arc<Mutex<PageState>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let mut s = self.state.lock().unwrap();
        s.navigations.push(url.to_string());
        if s.url.is_empty() {
            s.url = url.to_string();
        }
        Ok(())
    }

    async fn page_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().content.clone())
    }

    async fn query(&mut self, locator: &Locator) -> Result<Option<ElementId>, DriverError> {
        let stall = self.state.lock().unwrap().stall_queries;
        if stall {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }

        let key = locator_key(locator);
        let mut s = self.state.lock().unwrap();
        *s.query_counts.entry(key.clone()).or_insert(0) += 1;
        s.query_log.push(key.clone());
        if s.fail_queries {
            return Err(DriverError::Query("scripted failure".into()));
        }
        let seen = s.queries_of(&key);
        let appear_after = s.elements.get(&key).map(|e| e.appear_after);
        match appear_after {
            Some(after) if seen > after => Ok(Some(s.id_for(&key))),
            _ => Ok(None),
        }
    }

    async fn is_visible(&self, id: ElementId) -> Result<bool, DriverError> {
        let s = self.state.lock().unwrap();
        Ok(s.element_by_id(id).is_some_and(|e| e.visible))
    }

    async fn is_enabled(&self, id: ElementId) -> Result<bool, DriverError> {
        let s = self.state.lock().unwrap();
        Ok(s.element_by_id(id).is_some_and(|e| e.enabled))
    }

    async fn scroll_into_view(&mut self, _id: ElementId) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&mut self, id: ElementId) -> Result<(), DriverError> {
        self.state.lock().unwrap().clicks.push(id);
        Ok(())
    }

    async fn clear(&mut self, id: ElementId) -> Result<(), DriverError> {
        self.state.lock().unwrap().cleared.push(id);
        Ok(())
    }

    async fn type_text(
        &mut self,
        id: ElementId,
        text: &str,
        _per_char_delay: Duration,
    ) -> Result<(), DriverError> {
        self.state.lock().unwrap().typed.push((id, text.to_string()));
        Ok(())
    }

    async fn element_text(&self, id: ElementId) -> Result<String, DriverError> {
        let s = self.state.lock().unwrap();
        Ok(s.element_by_id(id).map(|e| e.text.clone()).unwrap_or_default())
    }

    async fn attribute(
        &self,
        id: ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let s = self.state.lock().unwrap();
        Ok(s.element_by_id(id).and_then(|e| e.attrs.get(name).cloned()))
    }

    async fn press_key(&mut self, key: &str) -> Result<(), DriverError> {
        self.state.lock().unwrap().keys.push(key.to_string());
        Ok(())
    }

    async fn type_chars(&mut self, text: &str) -> Result<(), DriverError> {
        self.state.lock().unwrap().chars.push(text.to_string());
        Ok(())
    }

    async fn arm_download_capture(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().armed = true;
        Ok(())
    }

    async fn await_download(&mut self, _timeout: Duration) -> Result<PathBuf, DriverError> {
        let s = self.state.lock().unwrap();
        if !s.armed {
            return Err(DriverError::Download("capture not armed".into()));
        }
        s.download
            .clone()
            .ok_or_else(|| DriverError::Download("no download arrived".into()))
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

pub struct FakeSession {
    pub page_state: Arc<Mutex<PageState>>,
    pub applied: Vec<SessionState>,
    pub session_state: SessionState,
    pub open_count: u32,
    ready: bool,
}

impl FakeSession {
    pub fn new(page_state: Arc<Mutex<PageState>>) -> Self {
        Self {
            page_state,
            applied: Vec::new(),
            session_state: SessionState::default(),
            open_count: 0,
            ready: true,
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn launch(&mut self) -> Result<(), DriverError> {
        self.ready = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.ready = false;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }

    async fn apply_session_state(&mut self, state: &SessionState) -> Result<(), DriverError> {
        self.applied.push(state.clone());
        self.session_state = state.clone();
        Ok(())
    }

    async fn capture_session_state(&mut self) -> Result<SessionState, DriverError> {
        Ok(self.session_state.clone())
    }

    async fn open_page(&mut self) -> Result<Box<dyn PageDriver>, DriverError> {
        self.open_count += 1;
        Ok(Box::new(FakePage::new(self.page_state.clone())))
    }
}
