use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use encoding_rs::Encoding;
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::detect;
use crate::diff::diff_snapshots;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::parse::{parse_challenge_card, parse_elements, parse_status, select_text};
use crate::text::{decode, decode_with_fallback, encoding_for, footer_year};
use crate::types::*;
use crate::variant::{self, ELEMENT_PAGES, Form, Page, Selector, Variant};
use crate::{Error, Result};

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Recoveries (relogin or session reset) one logical call may perform.
pub const MAX_RECOVERIES: u8 = 2;

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A logical page resolved through the active variant, or a raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Page(Page),
    Path(String),
}

impl From<Page> for Target {
    fn from(page: Page) -> Self {
        Target::Page(page)
    }
}

impl From<&str> for Target {
    fn from(path: &str) -> Self {
        Target::Path(path.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Allow recovering from a logged-out or session-conflict answer.
    pub retry: bool,
    /// Log in again after a session reset.
    pub login: bool,
    /// Send the session cookie.
    pub authenticated: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self { retry: true, login: true, authenticated: true }
    }
}

impl CallOptions {
    /// Pages readable without a session (status, login, version).
    pub const PUBLIC: CallOptions = CallOptions { retry: true, login: false, authenticated: false };
}

/// A page as the panel served it, after redirects.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// Path of the final URL.
    pub path: String,
    pub status: u16,
    /// `Set-Cookie` value, verbatim.
    pub cookie: Option<String>,
    body: Vec<u8>,
    encoding: &'static Encoding,
}

impl PageResponse {
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded with the variant's charset.
    pub fn text(&self) -> String {
        decode(&self.body, self.encoding)
    }
}

enum Attempt {
    Page(PageResponse),
    LoggedOut,
    SessionOpen,
}

/// Runs one HTTP exchange under `timeout`, classifying failures.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    url: &str,
    exchange: impl Future<Output = reqwest::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.is_timeout() => {
            error!(url, "timeout error fetching information");
            Err(Error::Timeout { path: url.to_string() })
        }
        Ok(Err(e)) => {
            error!(url, "error fetching information: {e}");
            Err(Error::Transport { path: url.to_string(), source: e })
        }
        Err(_) => {
            error!(url, "timeout error fetching information");
            Err(Error::Timeout { path: url.to_string() })
        }
    }
}

/// The `(0x....)` token of an error-page message, or the whole text.
fn error_code_token(text: &str) -> &str {
    text.find("(0x")
        .and_then(|start| text[start..].find(')').map(|len| &text[start..=start + len]))
        .unwrap_or(text)
}

fn normalize_base_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim()).map_err(|e| Error::Parse(format!("invalid url {url:?}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::Parse(format!("url without host: {url:?}")))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// Persistable connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub codes: ChallengeTable,
    /// Skips detection when set.
    #[serde(default)]
    pub api_type: Option<ApiVariant>,
}

impl Config {
    pub fn into_builder(self) -> ProtexialClientBuilder {
        let mut builder = ProtexialClientBuilder::new(self.url).codes(self.codes);
        if let (Some(username), Some(password)) = (self.username, self.password) {
            builder = builder.credentials(username, password);
        }
        if let Some(api) = self.api_type {
            builder = builder.variant(api);
        }
        builder
    }
}

pub struct ProtexialClientBuilder {
    url: String,
    credentials: Option<(String, String)>,
    codes: ChallengeTable,
    api: Option<ApiVariant>,
    timeout: Duration,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl ProtexialClientBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            codes: ChallengeTable::new(),
            api: None,
            timeout: HTTP_TIMEOUT,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn codes(mut self, codes: ChallengeTable) -> Self {
        self.codes = codes;
        self
    }

    /// Fixes the firmware variant instead of detecting it.
    pub fn variant(mut self, api: ApiVariant) -> Self {
        self.api = Some(api);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ProtexialClient> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(Error::Client)?;
        let probe = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .build()
            .map_err(Error::Client)?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(Mutex::new(MessageLogger::new(mode, &path)?)),
            _ => None,
        };

        Ok(ProtexialClient {
            http,
            probe,
            base_url: normalize_base_url(&self.url)?,
            credentials: self.credentials,
            codes: RwLock::new(self.codes),
            api: RwLock::new(self.api),
            cookie: RwLock::new(None),
            timeout: self.timeout,
            previous: Mutex::new(None),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
            logger,
        })
    }
}

/// Client for one panel. All operations take `&self`; share it behind an
/// `Arc` to use it from several tasks.
pub struct ProtexialClient {
    http: reqwest::Client,
    probe: reqwest::Client,
    base_url: String,
    credentials: Option<(String, String)>,
    codes: RwLock<ChallengeTable>,
    api: RwLock<Option<ApiVariant>>,
    cookie: RwLock<Option<String>>,
    timeout: Duration,
    previous: Mutex<Option<Snapshot>>,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    logger: Option<Mutex<MessageLogger>>,
}

impl ProtexialClient {
    pub fn builder(url: impl Into<String>) -> ProtexialClientBuilder {
        ProtexialClientBuilder::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_variant(&self) -> Option<ApiVariant> {
        *self.api.read()
    }

    pub fn set_api_variant(&self, api: ApiVariant) {
        *self.api.write() = Some(api);
    }

    pub fn is_logged_in(&self) -> bool {
        self.cookie.read().is_some()
    }

    pub fn codes(&self) -> ChallengeTable {
        self.codes.read().clone()
    }

    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.previous.lock().clone()
    }

    fn variant(&self) -> Result<&'static Variant> {
        self.api_variant()
            .map(|api| api.profile())
            .ok_or(Error::VariantNotSelected)
    }

    fn clear_cookie(&self) {
        *self.cookie.write() = None;
    }

    fn resolve(&self, variant: &Variant, target: Target) -> Result<String> {
        match target {
            Target::Path(path) if path.starts_with('/') => Ok(path),
            Target::Path(path) => Ok(format!("/{path}")),
            Target::Page(page) => variant
                .page(page)
                .map(str::to_string)
                .ok_or_else(|| Error::UnsupportedPage(format!("{page:?} on {}", variant.api))),
        }
    }

    async fn send(
        &self,
        variant: &Variant,
        call_id: &Uuid,
        method: Method,
        path: &str,
        form: Option<&Form>,
        authenticated: bool,
    ) -> Result<PageResponse> {
        let url = format!("{}{path}", self.base_url);
        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };

        let cookie = if authenticated { self.cookie.read().clone() } else { None };
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some(form) = form {
            let fields: Vec<&str> = form.iter().map(|(k, _)| k.as_str()).collect();
            debug!(?fields, "with payload");
            request = request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(variant.encode_form(form));
        }

        debug!(call = %call_id, method = method.as_str(), url = %url, "call");
        if let Some(logger) = &self.logger {
            logger.lock().log_request(call_id, method.as_str(), path, form);
        }

        let encoding = encoding_for(variant.text_encoding());
        let response = bounded(self.timeout, &url, async {
            let resp = request.send().await?;
            let path = resp.url().path().to_string();
            let status = resp.status().as_u16();
            let cookie = resp
                .headers()
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>(PageResponse { path, status, cookie, body, encoding })
        })
        .await?;

        if tracing::enabled!(tracing::Level::TRACE) || self.logger.is_some() {
            let text = response.text();
            let preview: String = text.chars().take(500).collect();
            trace!(path = %response.path, status = response.status, body = %preview, "response");
            if let Some(logger) = &self.logger {
                logger.lock().log_response(call_id, &response.path, response.status, &text);
            }
        }
        Ok(response)
    }

    /// One exchange, classified: a usable page, a logged-out answer, a
    /// session conflict, or a fatal error.
    async fn attempt(
        &self,
        variant: &Variant,
        call_id: &Uuid,
        method: Method,
        path: &str,
        form: Option<&Form>,
        authenticated: bool,
    ) -> Result<Attempt> {
        let response = self.send(variant, call_id, method, path, form, authenticated).await?;
        if response.status != 200 {
            return Err(Error::HttpStatus(response.status));
        }

        if variant.page(Page::Default) == Some(response.path.as_str()) {
            debug!(call = %call_id, "default page served: not logged in");
            return Ok(Attempt::LoggedOut);
        }
        if variant.page(Page::Error) != Some(response.path.as_str()) {
            return Ok(Attempt::Page(response));
        }

        let body = response.text();
        let Some(text) = select_text(&body, variant.selector(Selector::ErrorCode))?.filter(|t| !t.is_empty())
        else {
            error!(body = %body, "error page without error code");
            return Err(Error::MissingErrorCode);
        };
        let code = error_code_token(&text);
        debug!(call = %call_id, code, "panel error page");

        match code {
            variant::NOT_AUTHORIZED => {
                if self.is_logged_in() {
                    self.clear_cookie();
                    Err(Error::NotAuthenticated)
                } else {
                    Ok(Attempt::LoggedOut)
                }
            }
            variant::SESSION_ALREADY_OPEN => Ok(Attempt::SessionOpen),
            variant::WRONG_CREDENTIALS => Err(Error::InvalidCredentials),
            variant::MAX_LOGIN_ATTEMPTS => Err(Error::MaxLoginAttemptsReached),
            variant::WRONG_CODE => Err(Error::InvalidCode),
            variant::UNKNOWN_PARAMETER => Err(Error::UnknownCommandParameter),
            other => {
                error!(code = other, body = %body, "unknown panel error code");
                Err(Error::UnknownErrorCode(other.to_string()))
            }
        }
    }

    /// Issues a request, recovering from logged-out answers (relogin) and
    /// session conflicts (reset, relogin) at most `MAX_RECOVERIES` times.
    pub async fn call(
        &self,
        method: Method,
        target: impl Into<Target>,
        form: Option<&Form>,
        options: CallOptions,
    ) -> Result<PageResponse> {
        let variant = self.variant()?;
        let path = self.resolve(variant, target.into())?;
        let call_id = Uuid::new_v4();
        let mut budget = if options.retry { MAX_RECOVERIES } else { 0 };

        loop {
            match self
                .attempt(variant, &call_id, method, &path, form, options.authenticated)
                .await?
            {
                Attempt::Page(response) => return Ok(response),
                Attempt::LoggedOut => {
                    if budget == 0 {
                        self.clear_cookie();
                        return Err(Error::NotAuthenticated);
                    }
                    budget -= 1;
                    debug!(call = %call_id, budget, "logging in before retry");
                    self.login_with(None, None).await?;
                }
                Attempt::SessionOpen => {
                    if budget == 0 {
                        return Err(Error::SessionConflict);
                    }
                    budget -= 1;
                    debug!(call = %call_id, budget, "session already open, resetting");
                    self.reset_session(variant, &call_id).await?;
                    if options.login {
                        self.login_with(None, None).await?;
                    }
                }
            }
        }
    }

    /// Asks the panel to drop the other session. The answer page is not
    /// inspected.
    async fn reset_session(&self, variant: &Variant, call_id: &Uuid) -> Result<()> {
        let path = self.resolve(variant, Target::Page(Page::Error))?;
        let form = variant.reset_session_payload();
        let response = self.send(variant, call_id, Method::Post, &path, Some(&form), false).await?;
        if response.status != 200 {
            warn!(status = response.status, "session reset answered with an error status");
        }
        self.clear_cookie();
        Ok(())
    }

    fn expect_page(attempt: Attempt) -> Result<PageResponse> {
        match attempt {
            Attempt::Page(response) => Ok(response),
            Attempt::LoggedOut => Err(Error::NotAuthenticated),
            Attempt::SessionOpen => Err(Error::SessionConflict),
        }
    }

    fn read_challenge(variant: &Variant, response: &PageResponse) -> Result<String> {
        select_text(&response.text(), variant.selector(Selector::LoginChallenge))?
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Parse("login challenge not found".to_string()))
    }

    /// Logs in without relogin recovery. A session conflict on the login page
    /// gets one reset and one re-fetch; the credentials POST is never retried.
    async fn login_with(&self, credentials: Option<(&str, &str)>, code: Option<&str>) -> Result<()> {
        self.clear_cookie();
        let variant = self.variant()?;
        let call_id = Uuid::new_v4();
        let login_path = self.resolve(variant, Target::Page(Page::Login))?;

        let code = match code {
            Some(code) => code.to_string(),
            None => {
                let mut attempt = self
                    .attempt(variant, &call_id, Method::Get, &login_path, None, false)
                    .await?;
                if matches!(attempt, Attempt::SessionOpen) {
                    debug!(call = %call_id, "session already open on login page, resetting");
                    self.reset_session(variant, &call_id).await?;
                    attempt = self
                        .attempt(variant, &call_id, Method::Get, &login_path, None, false)
                        .await?;
                }
                let challenge = Self::read_challenge(variant, &Self::expect_page(attempt)?)?;
                debug!(challenge = %challenge, "login challenge");
                let code = self.codes.read().lookup(&challenge)?.to_string();
                code
            }
        };

        let (username, password) = match (credentials, &self.credentials) {
            (Some(c), _) => c,
            (None, Some((u, p))) => (u.as_str(), p.as_str()),
            (None, None) => return Err(Error::MissingCredentials),
        };

        let form = variant.login_payload(username, password, &code);
        let attempt = self
            .attempt(variant, &call_id, Method::Post, &login_path, Some(&form), true)
            .await?;
        let response = Self::expect_page(attempt)?;
        if response.cookie.is_none() {
            debug!("login answered without a session cookie");
        }
        *self.cookie.write() = response.cookie;
        Ok(())
    }

    /// Logs in with the configured credentials and challenge card.
    pub async fn login(&self) -> Result<()> {
        self.login_with(None, None).await
    }

    /// Detects the variant when none is configured, then logs in.
    pub async fn initialize(&self) -> Result<()> {
        if self.api_variant().is_none() {
            self.detect_and_set_variant().await?;
        }
        self.login().await
    }

    /// Ends the session. Landing on the default page counts as logged out.
    pub async fn logout(&self) -> Result<()> {
        let variant = self.variant()?;
        let path = self.resolve(variant, Target::Page(Page::Logout))?;
        let result = self
            .attempt(variant, &Uuid::new_v4(), Method::Get, &path, None, true)
            .await;
        self.clear_cookie();
        match result? {
            Attempt::Page(_) | Attempt::LoggedOut => Ok(()),
            Attempt::SessionOpen => Err(Error::SessionConflict),
        }
    }

    /// Probes the known variants without changing the client's variant.
    pub async fn detect(&self) -> Result<ApiVariant> {
        self.detect_among(&ApiVariant::DETECTION_ORDER).await
    }

    pub async fn detect_among(&self, candidates: &[ApiVariant]) -> Result<ApiVariant> {
        detect::detect(&self.probe, &self.base_url, self.timeout, candidates).await
    }

    pub async fn detect_and_set_variant(&self) -> Result<ApiVariant> {
        let api = self.detect().await?;
        self.set_api_variant(api);
        Ok(api)
    }

    /// The challenge currently shown on the login page.
    pub async fn get_challenge(&self) -> Result<String> {
        let variant = self.variant()?;
        let options = CallOptions { retry: true, login: false, authenticated: true };
        let response = self.call(Method::Get, Page::Login, None, options).await?;
        Self::read_challenge(variant, &response)
    }

    pub async fn get_status(&self) -> Result<Status> {
        let response = self.call(Method::Get, Page::Status, None, CallOptions::PUBLIC).await?;
        parse_status(&response.text())
    }

    /// Elements from the first list page that parses to a non-empty list.
    /// `None` when no list page could be fetched at all, as opposed to pages
    /// that answered without elements.
    async fn fetch_elements(&self) -> Result<Option<Vec<Element>>> {
        let variant = self.variant()?;
        let declared = encoding_for(variant.text_encoding());
        let mut answered = false;
        for path in ELEMENT_PAGES {
            match self.call(Method::Get, path, None, CallOptions::default()).await {
                Ok(response) => {
                    answered = true;
                    let page = decode_with_fallback(response.bytes(), Some(declared));
                    let elements = parse_elements(&page);
                    if !elements.is_empty() {
                        debug!(path, count = elements.len(), "elements page parsed");
                        return Ok(Some(elements));
                    }
                    debug!(path, "no elements on page");
                }
                Err(e) => debug!(path, "elements page failed: {e}"),
            }
        }
        Ok(answered.then(Vec::new))
    }

    /// Elements from the first list page that parses to a non-empty list;
    /// empty when none does.
    pub async fn get_elements(&self) -> Result<Vec<Element>> {
        Ok(self.fetch_elements().await?.unwrap_or_default())
    }

    async fn read_version(&self, version: &mut String) -> Result<()> {
        let variant = self.variant()?;
        let login_page = self.call(Method::Get, Page::Login, None, CallOptions::PUBLIC).await?;
        if let Some(footer) = select_text(&login_page.text(), variant.selector(Selector::Footer))?
            && let Some(year) = footer_year(&footer)
        {
            *version = year.to_string();
        }
        if variant.page(Page::Version).is_some() {
            let response = self.call(Method::Get, Page::Version, None, CallOptions::PUBLIC).await?;
            version.push_str(&format!(" ({})", response.text().trim()));
        }
        Ok(())
    }

    /// Footer year plus version page, e.g. "2016 (v1.2.3)". Never fails;
    /// "Unknown" when nothing could be read.
    pub async fn get_version(&self) -> String {
        let mut version = "Unknown".to_string();
        if let Err(e) = self.read_version(&mut version).await {
            error!("failed to extract version: {e}");
        }
        version
    }

    async fn scrape_challenge_card(&self) -> Result<ChallengeTable> {
        let variant = self.variant()?;
        let options = CallOptions { retry: true, login: false, authenticated: true };
        let response = self.call(Method::Get, Page::ChallengeCard, None, options).await?;
        parse_challenge_card(&response.text(), variant.selector(Selector::ChallengeCard))
    }

    /// Logs in with an explicit code, reads the whole authentication card and
    /// logs out, whatever happened. The card replaces the client's table.
    pub async fn get_challenge_card(&self, username: &str, password: &str, code: &str) -> Result<ChallengeTable> {
        let scraped = match self.login_with(Some((username, password)), Some(code)).await {
            Ok(()) => self.scrape_challenge_card().await,
            Err(e) => Err(e),
        };
        if let Err(e) = self.logout().await {
            warn!("logout after reading the challenge card failed: {e}");
        }
        let table = scraped?;
        *self.codes.write() = table.clone();
        Ok(table)
    }

    async fn command(&self, action: &str, zone: Option<Zone>, form: Form) -> Result<()> {
        if let Some(logger) = &self.logger {
            logger.lock().log_command(action, zone);
        }
        self.call(Method::Post, Page::Pilotage, Some(&form), CallOptions::default())
            .await?;
        Ok(())
    }

    pub async fn arm(&self, zone: Zone) -> Result<()> {
        let form = self
            .variant()?
            .arm_payload(zone)
            .ok_or(Error::InvalidZone(zone.bits()))?;
        self.command("arm", Some(zone), form).await
    }

    /// Arms every zone of a home/night mask.
    pub async fn arm_zones(&self, zones: ZoneMask) -> Result<()> {
        if zones.is_empty() {
            return Err(Error::InvalidZone(0));
        }
        for zone in zones.zones() {
            self.arm(zone).await?;
        }
        Ok(())
    }

    pub async fn disarm(&self) -> Result<()> {
        let form = self.variant()?.disarm_payload();
        self.command("disarm", None, form).await
    }

    pub async fn turn_light_on(&self) -> Result<()> {
        let form = self.variant()?.light_on_payload();
        self.command("light_on", None, form).await
    }

    pub async fn turn_light_off(&self) -> Result<()> {
        let form = self.variant()?.light_off_payload();
        self.command("light_off", None, form).await
    }

    pub async fn open_cover(&self) -> Result<()> {
        let form = self.variant()?.open_cover_payload();
        self.command("open_cover", None, form).await
    }

    pub async fn close_cover(&self) -> Result<()> {
        let form = self.variant()?.close_cover_payload();
        self.command("close_cover", None, form).await
    }

    pub async fn stop_cover(&self) -> Result<()> {
        let form = self.variant()?.stop_cover_payload();
        self.command("stop_cover", None, form).await
    }

    /// Fetches status and elements, fires callbacks for what changed since
    /// the previous refresh and returns the new snapshot. When every elements
    /// page fails, the previous elements are carried over.
    pub async fn refresh(&self) -> Result<Snapshot> {
        let status = self.get_status().await?;
        let elements = match self.fetch_elements().await? {
            Some(elements) => elements,
            None => {
                warn!("no elements page answered, keeping the previous list");
                self.last_snapshot().map(|s| s.elements).unwrap_or_default()
            }
        };
        let snapshot = Snapshot { status, elements, fetched_at: Utc::now() };

        let events = {
            let previous = self.previous.lock();
            diff_snapshots(previous.as_ref(), &snapshot)
        };
        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        for cb in &self.snapshot_callbacks {
            cb(&snapshot);
        }

        *self.previous.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }
}
