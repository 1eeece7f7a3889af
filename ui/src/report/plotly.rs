//! Thin bindings to the page's global `Plotly` object.
//!
//! Chart specs arrive as Plotly figure JSON (`{data, layout}`) from the
//! analysis service. Off the browser these calls are no-ops.

use super::visuals::ChartSpec;

/// Class Plotly puts on every rendered chart container.
pub const PLOTLY_CHART_CLASS: &str = "js-plotly-plot";

/// Render `spec` into the element with id `container_id`.
#[cfg(target_arch = "wasm32")]
pub fn render(container_id: &str, spec: &ChartSpec) -> Result<(), String> {
    use js_sys::{Object, Reflect};
    use wasm_bindgen::JsValue;

    let element = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(container_id))
        .ok_or_else(|| format!("chart container `{container_id}` not found"))?;

    let figure = js_sys::JSON::parse(spec.as_str()).map_err(|_| "chart spec is not valid JSON".to_string())?;
    let data = Reflect::get(&figure, &"data".into()).unwrap_or(JsValue::UNDEFINED);
    let layout = Reflect::get(&figure, &"layout".into()).unwrap_or_else(|_| Object::new().into());

    let config = Object::new();
    Reflect::set(&config, &"responsive".into(), &JsValue::TRUE).ok();
    Reflect::set(&config, &"displaylogo".into(), &JsValue::FALSE).ok();

    let plotly = global_plotly()?;
    call(&plotly, "newPlot", &[element.into(), data, layout, config.into()])?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn render(_container_id: &str, _spec: &ChartSpec) -> Result<(), String> {
    Ok(())
}

/// Release Plotly's listeners on a container that is going away.
#[cfg(target_arch = "wasm32")]
pub fn purge(container_id: &str) {
    let element = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(container_id));
    if let (Some(element), Ok(plotly)) = (element, global_plotly()) {
        call(&plotly, "purge", &[element.into()]).ok();
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub fn purge(_container_id: &str) {}

/// PNG data URL of a rendered chart at a fixed size.
#[cfg(target_arch = "wasm32")]
pub async fn to_image(
    element: &web_sys::HtmlElement,
    size: super::export::RasterSize,
) -> Result<String, String> {
    use js_sys::{Object, Promise, Reflect};
    use wasm_bindgen::JsCast;

    let options = Object::new();
    Reflect::set(&options, &"format".into(), &"png".into()).ok();
    Reflect::set(&options, &"width".into(), &f64::from(size.width).into()).ok();
    Reflect::set(&options, &"height".into(), &f64::from(size.height).into()).ok();
    Reflect::set(&options, &"scale".into(), &size.scale.into()).ok();

    let plotly = global_plotly()?;
    let pending = call(&plotly, "toImage", &[element.clone().into(), options.into()])?;
    let promise: Promise = pending
        .dyn_into()
        .map_err(|_| "Plotly.toImage did not return a promise".to_string())?;
    let url = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|err| describe(&err))?;
    url.as_string()
        .ok_or_else(|| "Plotly.toImage returned a non-string".to_string())
}

#[cfg(target_arch = "wasm32")]
fn global_plotly() -> Result<wasm_bindgen::JsValue, String> {
    let window = web_sys::window().ok_or("window unavailable")?;
    let plotly = js_sys::Reflect::get(&window, &"Plotly".into())
        .map_err(|_| "Plotly unavailable".to_string())?;
    if plotly.is_undefined() {
        return Err("Plotly is not loaded".to_string());
    }
    Ok(plotly)
}

/// `target[name](...args)`.
#[cfg(target_arch = "wasm32")]
pub(crate) fn call(
    target: &wasm_bindgen::JsValue,
    name: &str,
    args: &[wasm_bindgen::JsValue],
) -> Result<wasm_bindgen::JsValue, String> {
    use wasm_bindgen::JsCast;

    let method: js_sys::Function = js_sys::Reflect::get(target, &name.into())
        .map_err(|err| describe(&err))?
        .dyn_into()
        .map_err(|_| format!("`{name}` is not a function"))?;
    let args: js_sys::Array = args.iter().collect();
    method.apply(target, &args).map_err(|err| describe(&err))
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn describe(err: &wasm_bindgen::JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(err, &"message".into())
                .ok()
                .and_then(|m| m.as_string())
        })
        .unwrap_or_else(|| "unknown JavaScript error".to_string())
}
