//! Browser [`ExportSurface`]: the report DOM plus html2pdf.js.

use async_trait::async_trait;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlElement, HtmlImageElement, Window};

use crate::core::error::ExportError;
use crate::report::plotly::{self, PLOTLY_CHART_CLASS};

use super::{ExportSurface, RasterSize, CHART_SNAPSHOT_CLASS};

pub struct WebSurface {
    window: Window,
    root: HtmlElement,
}

impl WebSurface {
    /// Surface rooted at the element with id `root_id`.
    pub fn find(root_id: &str) -> Result<Self, ExportError> {
        let window = web_sys::window()
            .ok_or_else(|| ExportError::Unavailable("No browser window.".to_string()))?;
        let root = window
            .document()
            .and_then(|d| d.get_element_by_id(root_id))
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
            .ok_or_else(|| ExportError::Unavailable("Report content is not on the page.".to_string()))?;
        Ok(Self { window, root })
    }

    fn select_all(&self, selector: &str) -> Vec<HtmlElement> {
        let Ok(list) = self.root.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<HtmlElement>().ok())
            .collect()
    }
}

#[async_trait(?Send)]
impl ExportSurface for WebSurface {
    type Node = HtmlElement;

    fn charts(&self) -> Vec<HtmlElement> {
        self.select_all(&format!(".{PLOTLY_CHART_CLASS}"))
    }

    fn elements(&self) -> Vec<HtmlElement> {
        let mut all = vec![self.root.clone()];
        all.extend(self.select_all("*"));
        all
    }

    async fn rasterize_chart(&self, chart: &HtmlElement, size: RasterSize) -> Result<String, String> {
        plotly::to_image(chart, size).await
    }

    fn insert_snapshot(&self, chart: &HtmlElement, image_url: &str, size: RasterSize) -> Result<HtmlElement, String> {
        let document = self.window.document().ok_or("Document unavailable")?;
        let image: HtmlImageElement = document
            .create_element("img")
            .map_err(|err| plotly::describe(&err))?
            .dyn_into()
            .map_err(|_| "Image cast failed".to_string())?;
        image.set_src(image_url);
        image.set_class_name(CHART_SNAPSHOT_CLASS);
        image.set_alt("Chart");
        let style = image.style();
        style.set_property("width", "100%").ok();
        style
            .set_property("max-width", &format!("{}px", size.width))
            .ok();
        style.set_property("display", "block").ok();
        chart
            .after_with_node_1(&image)
            .map_err(|err| plotly::describe(&err))?;
        Ok(image.unchecked_into())
    }

    fn remove(&self, node: &HtmlElement) {
        node.remove();
    }

    fn inline_style(&self, node: &HtmlElement, property: &str) -> Option<String> {
        node.style()
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    fn set_inline_style(&self, node: &HtmlElement, property: &str, value: Option<&str>) {
        let style = node.style();
        match value {
            Some(value) => {
                style.set_property(property, value).ok();
            }
            None => {
                style.remove_property(property).ok();
            }
        }
    }

    fn computed_style(&self, node: &HtmlElement, property: &str) -> Option<String> {
        self.window
            .get_computed_style(node)
            .ok()
            .flatten()?
            .get_property_value(property)
            .ok()
            .filter(|value| !value.is_empty())
    }

    async fn render_document(&self, options: &Value) -> Result<(), String> {
        let options = js_sys::JSON::parse(&options.to_string())
            .map_err(|_| "invalid export options".to_string())?;
        let factory = js_sys::Reflect::get(&self.window, &"html2pdf".into())
            .ok()
            .filter(|f| f.is_function())
            .ok_or("html2pdf is not loaded")?
            .unchecked_into::<js_sys::Function>();

        let worker = factory
            .call0(&JsValue::NULL)
            .map_err(|err| plotly::describe(&err))?;
        let worker = plotly::call(&worker, "set", &[options])?;
        let worker = plotly::call(&worker, "from", &[self.root.clone().into()])?;
        let saving = plotly::call(&worker, "save", &[])?;

        // html2pdf's worker is a thenable, not a Promise.
        wasm_bindgen_futures::JsFuture::from(js_sys::Promise::resolve(&saving))
            .await
            .map(|_| ())
            .map_err(|err| plotly::describe(&err))
    }
}
