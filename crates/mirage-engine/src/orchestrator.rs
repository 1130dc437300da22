//! Sequences one user request through the automation pipeline:
//! open page -> auth check -> submit -> poll -> post-process -> close.
//!
//! The page is closed on every path, exactly once, including when the
//! request deadline elapses mid-flight. The caller serializes requests
//! against the shared browser session; two requests must never interleave
//! on one account's cookies.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SiteProfile;
use crate::driver::{BrowserSession, PageDriver};
use crate::poll::{await_completion, scan_content_for_image_url};
use crate::postprocess::remove_watermark_and_download;
use crate::resolution::{Locator, resolve};
use crate::submit::submit;

/// One user prompt plus its correlation identifier. Consumed entirely
/// within one orchestrated run; never retried across runs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub chat_id: i64,
}

/// What the bot can deliver, in descending fidelity.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    LocalFile(PathBuf),
    DirectUrl(String),
    Bytes(Vec<u8>),
}

/// Terminal result of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Completed {
        artifact: Artifact,
        /// Direct address kept alongside a file artifact so delivery can
        /// degrade without re-running anything.
        fallback_url: Option<String>,
    },
    TimedOut,
    Failed(String),
}

pub struct Orchestrator {
    profile: SiteProfile,
}

impl Orchestrator {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Run one request to a terminal outcome. Takes the session mutably so
    /// the borrow checker enforces the one-in-flight-request discipline.
    pub async fn run(
        &self,
        session: &mut dyn BrowserSession,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        info!(chat_id = request.chat_id, "processing generation request");

        let mut page = match session.open_page().await {
            Ok(p) => p,
            Err(e) => return GenerationOutcome::Failed(format!("could not open page: {e}")),
        };

        let outcome = match tokio::time::timeout(
            self.profile.request_deadline(),
            self.pipeline(page.as_mut(), request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(chat_id = request.chat_id, "request deadline elapsed, abandoning");
                GenerationOutcome::TimedOut
            }
        };

        if let Err(e) = page.close().await {
            warn!("page close failed: {e}");
        }

        info!(chat_id = request.chat_id, ?outcome, "request finished");
        outcome
    }

    async fn pipeline(
        &self,
        page: &mut dyn PageDriver,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        if let Err(e) = page.navigate(&self.profile.base_url).await {
            return GenerationOutcome::Failed(format!("navigation failed: {e}"));
        }
        self.check_authenticated(page).await;

        if let Err(e) = page.navigate(&self.profile.generator_url).await {
            return GenerationOutcome::Failed(format!("navigation failed: {e}"));
        }
        self.recover_from_login_redirect(page).await;

        if let Err(e) = submit(page, &self.profile, &request.prompt).await {
            return GenerationOutcome::Failed(e.to_string());
        }

        let address = await_completion(
            page,
            &self.profile.result_marker,
            self.profile.poll_max_attempts,
            self.profile.poll_interval(),
        )
        .await;

        // When no marker appeared, sweep the raw content before giving up.
        let address = match address {
            Some(a) => Some(a),
            None => match page.content().await {
                Ok(content) => scan_content_for_image_url(&content),
                Err(e) => {
                    debug!("content sweep unavailable: {e}");
                    None
                }
            },
        }
        .map(|a| self.profile.absolutize(&a));

        // Post-processing runs independently of completion detection and is
        // allowed to fail without failing the job.
        let file = match &self.profile.watermark {
            Some(config) => {
                remove_watermark_and_download(page, config, self.profile.download_timeout()).await
            }
            None => None,
        };

        match (file, address) {
            (Some(path), fallback_url) => GenerationOutcome::Completed {
                artifact: Artifact::LocalFile(path),
                fallback_url,
            },
            (None, Some(url)) => GenerationOutcome::Completed {
                artifact: Artifact::DirectUrl(url),
                fallback_url: None,
            },
            (None, None) => GenerationOutcome::TimedOut,
        }
    }

    /// Best-effort check that the session still looks authenticated.
    /// A miss is logged, not fatal: the cookies may still be good enough.
    async fn check_authenticated(&self, page: &mut dyn PageDriver) {
        for selector in &self.profile.auth_indicators {
            match page.query(&Locator::css(selector)).await {
                Ok(Some(_)) => {
                    debug!(%selector, "authenticated indicator matched");
                    return;
                }
                Ok(None) => {}
                Err(e) => debug!(%selector, "auth indicator query failed: {e}"),
            }
        }
        warn!("no authenticated indicator matched; continuing with current cookies");
    }

    /// If the generator navigation bounced to a login page, try the
    /// configured links back into the workspace.
    async fn recover_from_login_redirect(&self, page: &mut dyn PageDriver) {
        let url = match page.page_url().await {
            Ok(u) => u,
            Err(e) => {
                debug!("page url unavailable: {e}");
                return;
            }
        };
        if !self.profile.looks_like_login(&url) {
            return;
        }
        warn!(%url, "bounced to a login page, looking for a way back in");

        let budget =
            Duration::from_millis(self.profile.workspace_links.iter().map(|s| s.timeout_ms).sum());
        match resolve(page, "workspace link", &self.profile.workspace_links, budget, true).await {
            Ok(link) => {
                if let Err(e) = page.click(link.element).await {
                    warn!("workspace link click failed: {e}");
                }
            }
            Err(e) => warn!("no workspace link found: {e}"),
        }
    }
}
