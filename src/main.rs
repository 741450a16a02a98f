mod app;
mod config;
mod edit_session;
mod error;
mod logger;
mod manifest;
mod net;
mod render;
mod requests;
mod router;
mod search;
mod sidebar;
mod state;
mod summary;

use app::App;
use config::Config;
use leptos::prelude::*;
use logger::ConsoleLogger;

fn main() {
    console_error_panic_hook::set_once();
    let config = Config::from_window();
    if let Err(err) = ConsoleLogger::init(config.log_level()) {
        web_sys::console::error_1(&format!("logger already installed: {err}").into());
    }
    log::info!("starting docview ({:?} summaries)", config.summary_mode);
    leptos::mount::mount_to_body(move || view! { <App config=config.clone() /> })
}
