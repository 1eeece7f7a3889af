use dioxus::logger::tracing::Level;
use dioxus::prelude::*;

use ui::core::storage::StateStore;
use ui::views::Report;

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum Route {
    #[route("/")]
    Report {},
}

const MAIN_CSS: Asset = asset!("/assets/main.css");
const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const HTML2PDF_JS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/html2pdf.js/0.10.1/html2pdf.bundle.min.js";

fn main() {
    // Installed before launch so this level wins over the default.
    dioxus::logger::init(Level::INFO).ok();
    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    let store = use_context_provider(StateStore::for_platform);
    use_cross_tab_sync(store);

    rsx! {
        document::Link { rel: "stylesheet", href: MAIN_CSS }
        document::Script { src: PLOTLY_JS }
        document::Script { src: HTML2PDF_JS }

        Router::<Route> {}
    }
}

/// Forward `storage` events from other tabs for as long as the app lives.
#[cfg(target_arch = "wasm32")]
fn use_cross_tab_sync(store: StateStore) {
    use std::rc::Rc;

    use_hook(move || Rc::new(ui::core::storage::listen_cross_tab(&store)));
}

#[cfg(not(target_arch = "wasm32"))]
fn use_cross_tab_sync(_store: StateStore) {}
