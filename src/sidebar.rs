pub const COLLAPSED_KEY: &str = "sidebarCollapsed";

/// String key-value persistence. The browser's `localStorage` in the app.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

pub struct BrowserStorage(web_sys::Storage);

impl BrowserStorage {
    pub fn open() -> Option<Self> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .map(Self)
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.0.set_item(key, value) {
            log::warn!("could not persist {key}: {err:?}");
        }
    }
}

pub fn load_collapsed(store: &impl KeyValueStore) -> bool {
    store.get(COLLAPSED_KEY).as_deref() == Some("true")
}

pub fn store_collapsed(store: &impl KeyValueStore, collapsed: bool) {
    store.set(COLLAPSED_KEY, if collapsed { "true" } else { "false" });
}

/// Flip the flag and persist the new value. Returns the new value.
pub fn toggle(store: &impl KeyValueStore, collapsed: bool) -> bool {
    let next = !collapsed;
    store_collapsed(store, next);
    next
}

/// Nav entries collapse the sidebar after navigation on narrow screens.
pub fn collapses_on_navigate(viewport_width: f64, breakpoint: f64) -> bool {
    viewport_width <= breakpoint
}

/// True when a wheel event on the nav panel would scroll past its own
/// range and must not reach the content pane.
pub fn blocks_wheel(scroll_top: f64, scroll_height: f64, client_height: f64, delta_y: f64) -> bool {
    let max_scroll_top = scroll_height - client_height;
    (scroll_top <= 0.0 && delta_y < 0.0) || (scroll_top >= max_scroll_top && delta_y > 0.0)
}
