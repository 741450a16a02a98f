use leptos::ev;
use leptos::prelude::*;

use crate::config::Config;
use crate::edit_session::{key_action, EditSession};
use crate::router::{href_for, is_active};
use crate::search::{highlight, SearchView};
use crate::state::{AppState, NavView, SummaryView, Ui};

fn nav_list(ui: Ui) -> impl IntoView {
    move || match ui.nav.get() {
        NavView::Loading => view! { <div class="nav-status">"Loading..."</div> }.into_any(),
        NavView::Failed(err) => view! {
            <div class="nav-status error">{format!("Navigation unavailable: {err}")}</div>
        }
        .into_any(),
        NavView::Ready(entries) => entries
            .into_iter()
            .map(|entry| {
                let href = href_for(&entry.path);
                let href_active = href.clone();
                let active = move || ui.fragment.with(|f| is_active(&href_active, f));
                view! {
                    <a
                        class="nav-item"
                        class:active=active
                        href=href
                        on:click=move |_| ui.collapse_after_navigate()
                    >
                        {entry.label}
                    </a>
                }
            })
            .collect_view()
            .into_any(),
    }
}

fn search_results(ui: Ui) -> impl IntoView {
    move || match ui.search.get() {
        SearchView::Idle => ().into_any(),
        SearchView::Loading => view! { <div class="search-status">"Searching..."</div> }.into_any(),
        SearchView::Failed(_) => {
            view! { <div class="search-status error">"Search failed, try again later."</div> }
                .into_any()
        }
        SearchView::Results { results, .. } if results.is_empty() => {
            view! { <div class="search-status">"No matching content"</div> }.into_any()
        }
        SearchView::Results { query, results } => results
            .into_iter()
            .map(|hit| {
                let title = highlight(&hit.title, &query);
                let context = highlight(&hit.context, &query);
                let file = hit.file;
                view! {
                    <div class="search-result" on:click=move |_| ui.open_result(&file)>
                        <div class="search-result-title" inner_html=title></div>
                        <div class="search-result-context" inner_html=context></div>
                    </div>
                }
            })
            .collect_view()
            .into_any(),
    }
}

fn summary_panel(ui: Ui) -> impl IntoView {
    let body = move || match ui.summary.get() {
        SummaryView::Hidden => ().into_any(),
        SummaryView::Loading => {
            view! { <p class="summary-loading">"Summarizing this page..."</p> }.into_any()
        }
        SummaryView::Text(text) => view! { <p class="summary-text">{text}</p> }.into_any(),
        SummaryView::Failed => {
            view! { <p class="summary-error">"Summary unavailable, try again later."</p> }.into_any()
        }
    };
    view! {
        <aside
            class="summary"
            class:hidden=move || ui.summary.with(|s| *s == SummaryView::Hidden)
        >
            <h3 class="summary-heading">"Summary"</h3>
            {body}
        </aside>
    }
}

#[component]
pub fn App(config: Config) -> impl IntoView {
    let state = AppState::new(config);
    let ui = state.ui;

    {
        let state = state.clone();
        Effect::new(move |_| {
            state.load_manifest();
            state.handle_route();
        });
    }
    {
        let state = state.clone();
        let _ = window_event_listener(ev::hashchange, move |_| state.handle_route());
    }
    let _ = window_event_listener(ev::keydown, move |ev| {
        if !ui.edit.with_untracked(EditSession::is_editing) {
            return;
        }
        if let Some(action) = key_action(&ev.key(), ev.ctrl_key() || ev.meta_key()) {
            ev.prevent_default();
            ui.edit(action);
        }
    });
    let _ = window_event_listener(ev::click, move |ev| ui.dismiss_search(ev.target()));

    let on_search_input = {
        let state = state.clone();
        move |event: web_sys::Event| state.on_search_input(event_target_value(&event))
    };

    view! {
        <div class="app-layout">
            <nav
                class="sidebar"
                class:collapsed=move || ui.collapsed.get()
                node_ref=ui.nav_panel
                on:wheel=move |ev| ui.guard_nav_wheel(&ev)
            >
                <div class="sidebar-header">
                    {move || ui.site_title.get().unwrap_or_else(|| "Documentation".to_string())}
                </div>
                <div class="nav-list">{nav_list(ui)}</div>
            </nav>
            <section class="content-pane" class:expanded=move || ui.collapsed.get()>
                <header class="topbar">
                    <button
                        class="sidebar-toggle"
                        class:collapsed=move || ui.collapsed.get()
                        title="Toggle navigation"
                        on:click=move |_| ui.toggle_sidebar()
                    >
                        {move || if ui.collapsed.get() { "☰" } else { "✕" }}
                    </button>
                    <div class="search-box" node_ref=ui.search_box>
                        <input
                            type="search"
                            placeholder="Search documents"
                            prop:value=move || ui.search_query.get()
                            on:input=on_search_input
                            on:focus=move |_| ui.reopen_search()
                        />
                        <div class="search-results" class:visible=move || ui.search_open.get()>
                            {search_results(ui)}
                        </div>
                    </div>
                </header>
                {summary_panel(ui)}
                <div
                    class="article"
                    class:editable=move || ui.edit.with(EditSession::is_editing)
                    contenteditable=move || ui.edit.with(EditSession::contenteditable)
                    node_ref=ui.article
                    on:dblclick=move |ev| ui.begin_edit(ev.target())
                    on:blur=move |_| ui.end_edit_after_blur()
                ></div>
            </section>
        </div>
    }
}
