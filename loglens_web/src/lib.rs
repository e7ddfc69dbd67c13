use std::collections::BTreeMap;

use leptos::*;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{FormData, HtmlFormElement, RequestInit, Response};

use loglens::render::{Container, Patch};
use loglens::view::{Notification, View, ViewState};
use loglens::{AnalysisApi, ChartSpec, LensError, UploadWorkflow};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_COMMIT: &str = env!("LOGLENS_GIT_COMMIT");

fn console_trace(context: &str, detail: &JsValue) {
    web_sys::console::error_2(&JsValue::from_str(context), detail);
}

fn js_error(value: JsValue) -> LensError {
    let message = js_sys::Reflect::get(&value, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| value.as_string())
        .unwrap_or_default();
    LensError::Transport(message)
}

async fn fetch_text(url: &str, init: &RequestInit) -> Result<String, LensError> {
    let window =
        web_sys::window().ok_or_else(|| LensError::Transport("no window available".into()))?;
    let response = JsFuture::from(window.fetch_with_str_and_init(url, init))
        .await
        .map_err(js_error)?;
    let response: Response = response.dyn_into().map_err(js_error)?;
    let text = JsFuture::from(response.text().map_err(js_error)?)
        .await
        .map_err(js_error)?;
    Ok(text.as_string().unwrap_or_default())
}

/// Same-origin `fetch` against the page's own server.
struct FetchApi;

impl AnalysisApi for FetchApi {
    type Form = FormData;

    async fn upload(&self, form: FormData) -> Result<String, LensError> {
        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&JsValue::from(form));
        fetch_text("/upload", &init).await
    }

    async fn fetch_stats(&self, filename: &str) -> Result<String, LensError> {
        let init = RequestInit::new();
        init.set_method("GET");
        let segment = String::from(js_sys::encode_uri_component(filename));
        fetch_text(&format!("/get_stats/{segment}"), &init).await
    }
}

#[cfg(feature = "chart_plotly")]
fn mount_chart(div_id: &str, spec: &ChartSpec) {
    let Some(div) = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(div_id))
    else {
        return;
    };
    let figure = match js_sys::JSON::parse(spec.as_str()) {
        Ok(figure) => figure,
        Err(err) => {
            console_trace(&format!("chart spec for #{div_id} is not valid JSON"), &err);
            return;
        }
    };
    let plotly = js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str("Plotly"))
        .unwrap_or(JsValue::UNDEFINED);
    match js_sys::Reflect::get(&plotly, &JsValue::from_str("newPlot"))
        .and_then(|v| v.dyn_into::<js_sys::Function>())
    {
        Ok(new_plot) => {
            if let Err(err) = new_plot.call2(&plotly, &JsValue::from(div), &figure) {
                console_trace(&format!("Plotly.newPlot failed for #{div_id}"), &err);
            }
        }
        Err(_) => console_trace("Plotly is not loaded", &JsValue::UNDEFINED),
    }
}

#[cfg(not(feature = "chart_plotly"))]
fn mount_chart(_div_id: &str, _spec: &ChartSpec) {}

/// Applies workflow output to the component's signals.
#[derive(Clone, Copy)]
struct SignalView {
    state: WriteSignal<ViewState>,
    revealed: WriteSignal<bool>,
    contents: WriteSignal<BTreeMap<Container, String>>,
    notes: WriteSignal<Vec<(u64, Notification)>>,
    next_note: StoredValue<u64>,
}

impl View for SignalView {
    fn apply_state(&mut self, state: &ViewState) {
        self.state.set(*state);
    }

    fn reveal_results(&mut self) {
        self.revealed.set(true);
    }

    fn patch(&mut self, patch: Patch) {
        match patch {
            Patch::Html { container, html } => self.contents.update(|m| {
                m.insert(container, html);
            }),
            // Pane divs are always in the DOM, so the chart mounts immediately.
            Patch::Chart { container, spec } => mount_chart(container.id(), &spec),
        }
    }

    fn notify(&mut self, notification: Notification) {
        let id = self.next_note.get_value();
        self.next_note.set_value(id + 1);
        self.notes.update(|notes| notes.push((id, notification)));
    }
}

#[component]
pub fn App() -> impl IntoView {
    let (state, set_state) = create_signal(ViewState::idle());
    let (revealed, set_revealed) = create_signal(false);
    let (contents, set_contents) = create_signal(BTreeMap::<Container, String>::new());
    let (notes, set_notes) = create_signal(Vec::<(u64, Notification)>::new());
    let next_note = store_value(0u64);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if state.get_untracked().busy {
            return;
        }
        let Some(form) = ev.target().and_then(|t| t.dyn_into::<HtmlFormElement>().ok()) else {
            return;
        };
        let data = match FormData::new_with_form(&form) {
            Ok(data) => data,
            Err(err) => {
                console_trace("could not read the upload form", &err);
                return;
            }
        };
        let mut view = SignalView {
            state: set_state,
            revealed: set_revealed,
            contents: set_contents,
            notes: set_notes,
            next_note,
        };
        spawn_local(async move {
            let workflow = UploadWorkflow::new(FetchApi);
            let report = workflow.run(data, &mut view).await;
            if let Some(err) = report.error.as_ref().filter(|e| e.is_unexpected()) {
                console_trace("Error:", &JsValue::from_str(&err.to_string()));
            }
        });
    };

    let pane = move |container: Container| {
        let body = if container.is_chart() {
            view! { <div id=container.id() class="plot"></div> }
        } else {
            view! {
                <div
                    id=container.id()
                    inner_html=move || contents.with(|m| m.get(&container).cloned().unwrap_or_default())
                ></div>
            }
        };
        view! {
            <div class="col-md-6 mb-4">
                <div class="card h-100">
                    <div class="card-body">
                        <h2 class="h5 card-title">{container.title()}</h2>
                        {body}
                    </div>
                </div>
            </div>
        }
    };

    view! {
        <main class="container py-4">
            <header class="mb-4">
                <h1 class="h3">"Log Analyzer"</h1>
                <p class="text-muted">"Upload a .log file to see level counts, activity over time and idle gaps."</p>
            </header>
            <For
                each=move || notes.get()
                key=|(id, _)| *id
                children=move |(id, note): (u64, Notification)| {
                    view! {
                        <div
                            class=format!("alert alert-{} alert-dismissible fade show", note.severity.alert_class())
                            role="alert"
                        >
                            {note.message}
                            <button
                                type="button"
                                class="btn-close"
                                aria-label="Close"
                                on:click=move |_| set_notes.update(|n| n.retain(|(k, _)| *k != id))
                            ></button>
                        </div>
                    }
                }
            />
            <form id="uploadForm" class="card card-body mb-4" on:submit=on_submit>
                <div class="mb-3">
                    <label class="form-label" for="logFile">"Log file"</label>
                    <input id="logFile" class="form-control" type="file" name="file" accept=".log" required/>
                </div>
                <div class="d-flex align-items-center gap-2">
                    <button type="submit" class="btn btn-primary" disabled=move || !state.get().submit_enabled()>
                        {move || state.get().submit_label()}
                    </button>
                    <div
                        id="uploadSpinner"
                        class=move || if state.get().spinner_visible() { "spinner-border spinner-border-sm" } else { "spinner-border spinner-border-sm d-none" }
                        role="status"
                    ></div>
                </div>
            </form>
            <section
                id="analysisResults"
                class=move || if revealed.get() { "row" } else { "row d-none" }
            >
                {Container::ALL.into_iter().map(pane).collect_view()}
            </section>
            <footer class="text-muted small">
                {"loglens web "}{APP_VERSION}{" ("}{APP_COMMIT}{")"}
            </footer>
        </main>
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen::prelude::wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    leptos::mount_to_body(|| view! { <App/> });
}
