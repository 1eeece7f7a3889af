//! The export rewrites the page for the rasterizer; these tests check the page
//! always comes back exactly as it was, whatever fails along the way.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::executor::block_on;
use futures::FutureExt;
use serde_json::Value;

use ui::core::error::ExportError;
use ui::report::export::{export_document, ExportOptions, ExportSurface, RasterSize};

#[derive(Debug, Clone, Default, PartialEq)]
struct FakeElement {
    inline: BTreeMap<String, String>,
    computed: BTreeMap<String, String>,
    chart: bool,
    snapshot: bool,
    removed: bool,
}

#[derive(Default)]
struct FakePage {
    elements: RefCell<Vec<FakeElement>>,
    failing_charts: Vec<usize>,
    document_error: Option<String>,
    hang_document: bool,
    rendered_with: RefCell<Option<Value>>,
    visible_charts_at_render: Cell<usize>,
}

impl FakePage {
    fn with(elements: Vec<FakeElement>) -> Self {
        Self {
            elements: RefCell::new(elements),
            ..Self::default()
        }
    }

    fn snapshot_of_page(&self) -> Vec<FakeElement> {
        self.elements
            .borrow()
            .iter()
            .filter(|el| !el.snapshot)
            .cloned()
            .collect()
    }

    fn live_snapshots(&self) -> usize {
        self.elements
            .borrow()
            .iter()
            .filter(|el| el.snapshot && !el.removed)
            .count()
    }
}

fn element(computed: &[(&str, &str)], inline: &[(&str, &str)]) -> FakeElement {
    FakeElement {
        computed: computed
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        inline: inline
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..FakeElement::default()
    }
}

fn chart() -> FakeElement {
    FakeElement {
        chart: true,
        ..element(&[("color", "rgb(0, 0, 0)")], &[])
    }
}

#[async_trait(?Send)]
impl ExportSurface for FakePage {
    type Node = usize;

    fn charts(&self) -> Vec<usize> {
        self.elements
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, el)| el.chart)
            .map(|(i, _)| i)
            .collect()
    }

    fn elements(&self) -> Vec<usize> {
        (0..self.elements.borrow().len()).collect()
    }

    async fn rasterize_chart(&self, chart: &usize, size: RasterSize) -> Result<String, String> {
        assert_eq!(size, RasterSize::default());
        if self.failing_charts.contains(chart) {
            Err("toImage rejected".to_string())
        } else {
            Ok(format!("data:image/png;base64,chart{chart}"))
        }
    }

    fn insert_snapshot(&self, _chart: &usize, _image_url: &str, _size: RasterSize) -> Result<usize, String> {
        let mut elements = self.elements.borrow_mut();
        elements.push(FakeElement {
            snapshot: true,
            ..FakeElement::default()
        });
        Ok(elements.len() - 1)
    }

    fn remove(&self, node: &usize) {
        self.elements.borrow_mut()[*node].removed = true;
    }

    fn inline_style(&self, node: &usize, property: &str) -> Option<String> {
        self.elements.borrow()[*node].inline.get(property).cloned()
    }

    fn set_inline_style(&self, node: &usize, property: &str, value: Option<&str>) {
        let mut elements = self.elements.borrow_mut();
        let inline = &mut elements[*node].inline;
        match value {
            Some(value) => {
                inline.insert(property.to_string(), value.to_string());
            }
            None => {
                inline.remove(property);
            }
        }
    }

    fn computed_style(&self, node: &usize, property: &str) -> Option<String> {
        self.elements.borrow()[*node].computed.get(property).cloned()
    }

    async fn render_document(&self, options: &Value) -> Result<(), String> {
        let visible = self
            .elements
            .borrow()
            .iter()
            .filter(|el| el.chart && el.inline.get("display").map(String::as_str) != Some("none"))
            .count();
        self.visible_charts_at_render.set(visible);
        *self.rendered_with.borrow_mut() = Some(options.clone());

        if self.hang_document {
            futures::future::pending::<()>().await;
        }
        match &self.document_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

fn sample_page() -> Vec<FakeElement> {
    vec![
        element(
            &[("background-color", "oklch(0.98 0.01 250)"), ("color", "rgb(17, 24, 39)")],
            &[],
        ),
        element(
            &[("color", "oklab(0.2 0.01 -0.02)"), ("border-top-color", "lab(90 0 0)")],
            &[("color", "red")],
        ),
        chart(),
        chart(),
        element(&[("border-left-color", "color(display-p3 1 0 0)")], &[("display", "flex")]),
    ]
}

#[test]
fn document_failure_still_restores_every_mutation() {
    let mut page = FakePage::with(sample_page());
    page.failing_charts = vec![3];
    page.document_error = Some("canvas tainted".to_string());
    let before = page.snapshot_of_page();

    let outcome = block_on(export_document(&page, &ExportOptions::default(), "report.pdf"));

    assert_eq!(
        outcome,
        Err(ExportError::Document("canvas tainted".to_string()))
    );
    assert_eq!(page.snapshot_of_page(), before);
    assert_eq!(page.live_snapshots(), 0);
    // Only the chart that rasterized was hidden while rendering.
    assert_eq!(page.visible_charts_at_render.get(), 1);
}

#[test]
fn successful_export_reports_counts_and_restores() {
    let page = FakePage::with(sample_page());
    let before = page.snapshot_of_page();

    let report = block_on(export_document(
        &page,
        &ExportOptions::default(),
        "bias_report_20240101_120000.pdf",
    ))
    .unwrap();

    assert_eq!(report.charts_rasterized, 2);
    assert_eq!(report.charts_skipped, 0);
    assert_eq!(report.colors_overridden, 4);
    assert_eq!(page.visible_charts_at_render.get(), 0);
    assert_eq!(page.snapshot_of_page(), before);
    assert_eq!(page.live_snapshots(), 0);

    let options = page.rendered_with.borrow().clone().unwrap();
    assert_eq!(options["filename"], "bias_report_20240101_120000.pdf");
}

#[test]
fn overridden_colors_are_rgb_while_rendering() {
    struct Probe(FakePage, RefCell<Vec<String>>);

    #[async_trait(?Send)]
    impl ExportSurface for Probe {
        type Node = usize;
        fn charts(&self) -> Vec<usize> {
            self.0.charts()
        }
        fn elements(&self) -> Vec<usize> {
            self.0.elements()
        }
        async fn rasterize_chart(&self, chart: &usize, size: RasterSize) -> Result<String, String> {
            self.0.rasterize_chart(chart, size).await
        }
        fn insert_snapshot(&self, chart: &usize, url: &str, size: RasterSize) -> Result<usize, String> {
            self.0.insert_snapshot(chart, url, size)
        }
        fn remove(&self, node: &usize) {
            self.0.remove(node)
        }
        fn inline_style(&self, node: &usize, property: &str) -> Option<String> {
            self.0.inline_style(node, property)
        }
        fn set_inline_style(&self, node: &usize, property: &str, value: Option<&str>) {
            self.0.set_inline_style(node, property, value)
        }
        fn computed_style(&self, node: &usize, property: &str) -> Option<String> {
            self.0.computed_style(node, property)
        }
        async fn render_document(&self, _options: &Value) -> Result<(), String> {
            let elements = self.0.elements.borrow();
            let mut seen = self.1.borrow_mut();
            seen.extend(elements[1].inline.get("color").cloned());
            seen.extend(elements[4].inline.get("border-left-color").cloned());
            Ok(())
        }
    }

    let probe = Probe(FakePage::with(sample_page()), RefCell::new(Vec::new()));
    block_on(export_document(&probe, &ExportOptions::default(), "r.pdf")).unwrap();

    let seen = probe.1.borrow();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].starts_with("rgb("), "got {}", seen[0]);
    assert_eq!(seen[1], "rgb(209, 213, 219)");
    // And the prior inline value is back afterwards.
    assert_eq!(
        probe.0.elements.borrow()[1].inline.get("color").map(String::as_str),
        Some("red")
    );
}

#[test]
fn abandoned_export_restores_on_drop() {
    let mut page = FakePage::with(sample_page());
    page.hang_document = true;
    let before = page.snapshot_of_page();

    let pending = export_document(&page, &ExportOptions::default(), "r.pdf").now_or_never();
    assert!(pending.is_none());

    assert_eq!(page.snapshot_of_page(), before);
    assert_eq!(page.live_snapshots(), 0);
}
