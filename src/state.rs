use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use serde::Serialize;
use wasm_bindgen::JsCast;
use web_sys::AbortController;

use crate::config::{Config, SummaryMode};
use crate::edit_session::{EditAction, EditEffect, EditSession};
use crate::error::FetchError;
use crate::manifest::{Manifest, NavEntry};
use crate::net::{self, BodyReader};
use crate::render::{self, escape_html, Hljs};
use crate::requests::{RequestClass, Requests, Ticket};
use crate::router::{href_for, Route};
use crate::search::{search_url, SearchResult, SearchView};
use crate::sidebar::{self, BrowserStorage};
use crate::summary::{should_summarize, SummaryError, SummaryReply, SummaryStream};

#[derive(Clone, Debug, PartialEq)]
pub enum NavView {
    Loading,
    Ready(Vec<NavEntry>),
    Failed(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum SummaryView {
    #[default]
    Hidden,
    Loading,
    Text(String),
    Failed,
}

#[derive(Serialize)]
struct SummaryRequest<'a> {
    content: &'a str,
}

/// Reactive handles shared by every view. All of them are `Copy`.
#[derive(Clone, Copy)]
pub struct Ui {
    pub config: StoredValue<Config>,
    pub nav: RwSignal<NavView>,
    pub site_title: RwSignal<Option<String>>,
    pub fragment: RwSignal<String>,
    pub document_path: RwSignal<String>,
    pub summary: RwSignal<SummaryView>,
    pub search: RwSignal<SearchView>,
    pub search_query: RwSignal<String>,
    pub search_open: RwSignal<bool>,
    pub edit: RwSignal<EditSession>,
    pub collapsed: RwSignal<bool>,
    pub article: NodeRef<html::Div>,
    pub nav_panel: NodeRef<html::Nav>,
    pub search_box: NodeRef<html::Div>,
}

/// The app coordinator. Owns the cancellation slots and the pending search
/// timer, which live on the main thread only.
#[derive(Clone)]
pub struct AppState {
    pub ui: Ui,
    requests: Rc<RefCell<Requests>>,
    debounce: Rc<Cell<Option<TimeoutHandle>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let collapsed = BrowserStorage::open()
            .map(|store| sidebar::load_collapsed(&store))
            .unwrap_or(false);
        let ui = Ui {
            config: StoredValue::new(config),
            nav: RwSignal::new(NavView::Loading),
            site_title: RwSignal::new(None),
            fragment: RwSignal::new(String::new()),
            document_path: RwSignal::new(String::new()),
            summary: RwSignal::new(SummaryView::Hidden),
            search: RwSignal::new(SearchView::Idle),
            search_query: RwSignal::new(String::new()),
            search_open: RwSignal::new(false),
            edit: RwSignal::new(EditSession::default()),
            collapsed: RwSignal::new(collapsed),
            article: NodeRef::new(),
            nav_panel: NodeRef::new(),
            search_box: NodeRef::new(),
        };
        Self {
            ui,
            requests: Rc::new(RefCell::new(Requests::default())),
            debounce: Rc::new(Cell::new(None)),
        }
    }

    fn begin(&self, class: RequestClass) -> Result<(AbortController, Ticket), FetchError> {
        let controller = net::abort_controller()?;
        let ticket = self.requests.borrow_mut().begin(class, controller.clone());
        Ok((controller, ticket))
    }

    fn is_current(&self, class: RequestClass, ticket: Ticket) -> bool {
        self.requests.borrow().is_current(class, ticket)
    }

    fn finish(&self, class: RequestClass, ticket: Ticket) {
        self.requests.borrow_mut().finish(class, ticket);
    }

    pub fn load_manifest(&self) {
        let ui = self.ui;
        let path = ui.config.with_value(|c| c.manifest_path.clone());
        spawn_local(async move {
            match net::get_text(&path, None).await {
                Ok(text) => {
                    let manifest = Manifest::parse(&text);
                    log::info!("manifest loaded with {} entries", manifest.entries.len());
                    if let Some(title) = &manifest.title {
                        document().set_title(title);
                    }
                    ui.site_title.set(manifest.title);
                    ui.nav.set(NavView::Ready(manifest.entries));
                }
                Err(err) => {
                    log::error!("failed to load manifest {path}: {err}");
                    ui.nav.set(NavView::Failed(err.to_string()));
                }
            }
        });
    }

    /// Resolve the current location fragment and load its document.
    pub fn handle_route(&self) {
        let fragment = window().location().hash().unwrap_or_default();
        let route = self.ui.config.with_value(|c| Route::resolve(&fragment, c));
        log::debug!("route {:?} -> {}", route.fragment, route.document_path);

        self.requests.borrow_mut().navigate();
        self.ui.edit.update(|session| session.reset());
        self.ui.summary.set(SummaryView::Hidden);
        self.ui.fragment.set(route.fragment);
        self.ui.document_path.set(route.document_path.clone());
        self.load_document(route.document_path);
    }

    fn set_article_html(&self, html: &str) {
        if let Some(article) = self.ui.article.get_untracked() {
            article.set_inner_html(html);
        }
    }

    fn load_document(&self, path: String) {
        let (controller, ticket) = match self.begin(RequestClass::Document) {
            Ok(begun) => begun,
            Err(err) => {
                self.show_document_error(&path, &err);
                return;
            }
        };
        self.set_article_html(r#"<div class="loading">Loading...</div>"#);

        let state = self.clone();
        spawn_local(async move {
            let result = net::get_text(&path, Some(&controller.signal())).await;
            if !state.is_current(RequestClass::Document, ticket) {
                log::debug!("dropping superseded response for {path}");
                return;
            }
            state.finish(RequestClass::Document, ticket);
            match result {
                Ok(text) => state.show_document(&text),
                Err(err) if err.is_aborted() => {}
                Err(err) => state.show_document_error(&path, &err),
            }
        });
    }

    fn show_document(&self, source: &str) {
        let Some(article) = self.ui.article.get_untracked() else {
            return;
        };
        article.set_inner_html(&render::render_document(source, &Hljs));
        render::typeset_math(&article);
        render::mark_outbound_links(&article);
        self.schedule_summary();
    }

    fn show_document_error(&self, path: &str, err: &FetchError) {
        log::error!("failed to load {path}: {err}");
        self.set_article_html(&format!(
            "<div class=\"error\"><h2>Document failed to load</h2><p>{}</p>\
             <p>Check that the file exists and the server is reachable.</p></div>",
            escape_html(&err.to_string())
        ));
    }

    fn schedule_summary(&self) {
        let state = self.clone();
        let settle = self.ui.config.with_value(Config::summary_settle);
        match set_timeout_with_handle(move || state.request_summary(), settle) {
            Ok(handle) => self.requests.borrow_mut().schedule_summary(handle),
            Err(err) => log::warn!("could not schedule summary: {err:?}"),
        }
    }

    fn request_summary(&self) {
        let Some(article) = self.ui.article.get_untracked() else {
            return;
        };
        let text = article.inner_text();
        let min_chars = self.ui.config.with_value(|c| c.min_summary_chars);
        if !should_summarize(&text, min_chars) {
            log::debug!("document too short to summarize");
            return;
        }
        let (controller, ticket) = match self.begin(RequestClass::Summary) {
            Ok(begun) => begun,
            Err(err) => {
                log::error!("summary request not started: {err}");
                return;
            }
        };
        self.ui.summary.set(SummaryView::Loading);

        let state = self.clone();
        spawn_local(async move {
            let mode = state.ui.config.with_value(|c| c.summary_mode);
            let result = match mode {
                SummaryMode::Streaming => state.stream_summary(&text, &controller, ticket).await,
                SummaryMode::SingleShot => state.single_summary(&text, &controller, ticket).await,
            };
            match result {
                Ok(()) => {}
                Err(err) if err.is_aborted() => log::debug!("summary request aborted"),
                Err(err) => {
                    log::error!("summary failed: {err}");
                    state.show_summary(ticket, SummaryView::Failed);
                }
            }
            state.finish(RequestClass::Summary, ticket);
        });
    }

    fn show_summary(&self, ticket: Ticket, view: SummaryView) {
        if self.is_current(RequestClass::Summary, ticket) {
            self.ui.summary.set(view);
        }
    }

    async fn stream_summary(
        &self,
        text: &str,
        controller: &AbortController,
        ticket: Ticket,
    ) -> Result<(), SummaryError> {
        let endpoint = self.ui.config.with_value(|c| c.summary_endpoint.clone());
        let response = net::post_json(
            &endpoint,
            &SummaryRequest { content: text },
            "text/event-stream",
            Some(&controller.signal()),
        )
        .await?;
        let reader = BodyReader::new(&response)?;
        let mut stream = SummaryStream::default();

        while let Some(chunk) = reader.next_chunk().await? {
            if !self.is_current(RequestClass::Summary, ticket) {
                return Ok(());
            }
            if stream.feed(&chunk)? {
                self.show_summary(ticket, SummaryView::Text(stream.text.clone()));
            }
            if stream.done {
                break;
            }
        }

        let summary = stream.finish();
        if summary.trim().is_empty() {
            return Err(SummaryError::Malformed("stream carried no text".to_string()));
        }
        self.show_summary(ticket, SummaryView::Text(summary));
        Ok(())
    }

    async fn single_summary(
        &self,
        text: &str,
        controller: &AbortController,
        ticket: Ticket,
    ) -> Result<(), SummaryError> {
        let endpoint = self.ui.config.with_value(|c| c.summary_endpoint.clone());
        let response = net::post_json(
            &endpoint,
            &SummaryRequest { content: text },
            "application/json",
            Some(&controller.signal()),
        )
        .await?;
        let reply: SummaryReply = net::json_body(response).await?;
        let summary = reply.into_result()?;
        self.show_summary(ticket, SummaryView::Text(summary));
        Ok(())
    }

    /// Debounced search input. An empty query hides the panel at once.
    pub fn on_search_input(&self, raw: String) {
        self.ui.search_query.set(raw.clone());
        if let Some(pending) = self.debounce.take() {
            pending.clear();
        }

        let query = raw.trim().to_string();
        if query.is_empty() {
            self.requests.borrow_mut().cancel(RequestClass::Search);
            self.ui.search.set(SearchView::Idle);
            self.ui.search_open.set(false);
            return;
        }

        let state = self.clone();
        let delay = self.ui.config.with_value(Config::search_debounce);
        match set_timeout_with_handle(move || state.perform_search(query), delay) {
            Ok(handle) => self.debounce.set(Some(handle)),
            Err(err) => log::warn!("could not schedule search: {err:?}"),
        }
    }

    fn perform_search(&self, query: String) {
        self.debounce.set(None);
        let (controller, ticket) = match self.begin(RequestClass::Search) {
            Ok(begun) => begun,
            Err(err) => {
                self.ui.search.set(SearchView::Failed(err.to_string()));
                return;
            }
        };
        self.ui.search.set(SearchView::Loading);
        self.ui.search_open.set(true);

        let url = self.ui.config.with_value(|c| search_url(&c.search_endpoint, &query));
        let state = self.clone();
        spawn_local(async move {
            let result = net::get_json::<Vec<SearchResult>>(&url, Some(&controller.signal())).await;
            if !state.is_current(RequestClass::Search, ticket) {
                return;
            }
            state.finish(RequestClass::Search, ticket);
            match result {
                Ok(results) => {
                    log::debug!("{} search hits for {query:?}", results.len());
                    state.ui.search.set(SearchView::Results { query, results });
                }
                Err(err) if err.is_aborted() => return,
                Err(err) => {
                    log::error!("search for {query:?} failed: {err}");
                    state.ui.search.set(SearchView::Failed(err.to_string()));
                }
            }
            state.ui.search_open.set(true);
        });
    }
}

impl Ui {
    /// Navigate to a search hit and clear the search UI.
    pub fn open_result(self, file: &str) {
        if let Err(err) = window().location().set_hash(&href_for(file)) {
            log::error!("could not navigate to {file}: {err:?}");
        }
        self.search_open.set(false);
        self.search.set(SearchView::Idle);
        self.search_query.set(String::new());
    }

    pub fn reopen_search(self) {
        let has_query = !self.search_query.with_untracked(|q| q.trim().is_empty());
        if has_query && self.search.with_untracked(SearchView::has_results) {
            self.search_open.set(true);
        }
    }

    /// Clicks outside the search box hide the results panel.
    pub fn dismiss_search(self, target: Option<web_sys::EventTarget>) {
        let Some(search_box) = self.search_box.get_untracked() else {
            return;
        };
        let target = target.and_then(|t| t.dyn_into::<web_sys::Node>().ok());
        if !search_box.contains(target.as_ref()) {
            self.search_open.set(false);
        }
    }

    pub fn toggle_sidebar(self) {
        let collapsed = self.collapsed.get_untracked();
        let next = match BrowserStorage::open() {
            Some(store) => sidebar::toggle(&store, collapsed),
            None => !collapsed,
        };
        self.collapsed.set(next);
    }

    /// Nav entries collapse the sidebar shortly after a click on narrow screens.
    pub fn collapse_after_navigate(self) {
        let width = window()
            .inner_width()
            .ok()
            .and_then(|w| w.as_f64())
            .unwrap_or(f64::MAX);
        let (breakpoint, delay) = self
            .config
            .with_value(|c| (c.narrow_viewport_px, c.collapse_delay()));
        if !sidebar::collapses_on_navigate(width, breakpoint) {
            return;
        }
        set_timeout(
            move || {
                if let Some(store) = BrowserStorage::open() {
                    sidebar::store_collapsed(&store, true);
                }
                self.collapsed.set(true);
            },
            delay,
        );
    }

    pub fn guard_nav_wheel(self, ev: &web_sys::WheelEvent) {
        let Some(panel) = self.nav_panel.get_untracked() else {
            return;
        };
        if sidebar::blocks_wheel(
            panel.scroll_top().into(),
            panel.scroll_height().into(),
            panel.client_height().into(),
            ev.delta_y(),
        ) {
            ev.prevent_default();
            ev.stop_propagation();
        }
    }

    pub fn edit(self, action: EditAction) -> EditEffect {
        let path = self.document_path.get_untracked();
        let mut session = self.edit.get_untracked();
        let effect = session.handle(action, &path);
        self.edit.set(session);

        match &effect {
            EditEffect::Nothing | EditEffect::Exit => {}
            EditEffect::Enter => log::debug!("editing {path}"),
            EditEffect::SaveAndExit { file_name } => {
                let Some(article) = self.article.get_untracked() else {
                    return effect;
                };
                match offer_download(&article.inner_text(), file_name) {
                    Ok(()) => {
                        log::info!("offered {file_name} for download");
                        let _ = window().alert_with_message(&format!(
                            "Saved as {file_name}. Check your downloads folder."
                        ));
                    }
                    Err(err) => log::error!("download of {file_name} failed: {err:?}"),
                }
            }
        }
        effect
    }

    /// Enter edit mode and put the caret at the start of the clicked element.
    pub fn begin_edit(self, target: Option<web_sys::EventTarget>) {
        if self.edit(EditAction::DoubleClick) != EditEffect::Enter {
            return;
        }
        let Some(article) = self.article.get_untracked() else {
            return;
        };
        // The reactive attribute lands on a later tick; focus needs it now.
        let editable = self.edit.with_untracked(EditSession::contenteditable);
        if let Err(err) = article.set_attribute("contenteditable", editable) {
            log::warn!("could not make the article editable: {err:?}");
            return;
        }
        let _ = article.focus();
        let node = target
            .and_then(|t| t.dyn_into::<web_sys::Node>().ok())
            .unwrap_or_else(|| article.clone().into());
        set_timeout(
            move || {
                if let Err(err) = place_caret(&node) {
                    log::debug!("caret placement skipped: {err:?}");
                }
            },
            std::time::Duration::ZERO,
        );
    }

    /// Leave edit mode once focus has been gone for the grace period.
    pub fn end_edit_after_blur(self) {
        let grace = self.config.with_value(Config::blur_grace);
        set_timeout(
            move || {
                self.edit(EditAction::BlurElapsed);
            },
            grace,
        );
    }
}

fn place_caret(node: &web_sys::Node) -> Result<(), wasm_bindgen::JsValue> {
    let range = document().create_range()?;
    range.set_start(node, 0)?;
    range.collapse_with_to_start(true);
    if let Some(selection) = window().get_selection()? {
        selection.remove_all_ranges()?;
        selection.add_range(&range)?;
    }
    Ok(())
}

fn offer_download(text: &str, file_name: &str) -> Result<(), wasm_bindgen::JsValue> {
    let parts = js_sys::Array::of1(&wasm_bindgen::JsValue::from_str(text));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("text/markdown");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor: web_sys::HtmlAnchorElement = document().create_element("a")?.dyn_into()?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();
    web_sys::Url::revoke_object_url(&url)
}
