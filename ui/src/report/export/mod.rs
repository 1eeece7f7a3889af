//! PDF export of the live report.
//!
//! The page is temporarily rewritten for the document rasterizer: charts are
//! swapped for static images and unsupported colors are pinned inline. Every
//! mutation is pushed onto a [`RestoreStack`] which undoes them in reverse
//! order when it drops, so the page comes back on success, on failure and if
//! the export future is abandoned mid-flight.

pub mod colors;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::cell::Cell;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::error::ExportError;

use colors::ColorProperty;

/// Pixel size charts are rasterized at, before supersampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterSize {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

impl Default for RasterSize {
    fn default() -> Self {
        Self {
            width: 900,
            height: 450,
            scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Top, left, bottom, right, in millimetres.
    pub margin_mm: [f64; 4],
    pub page_format: String,
    pub orientation: String,
    pub image_quality: f64,
    pub canvas_scale: f64,
    pub avoid_break_inside: Vec<String>,
    pub break_before: String,
    pub break_after: String,
    pub chart_raster: RasterSize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            margin_mm: [10.0, 10.0, 10.0, 10.0],
            page_format: "a4".to_string(),
            orientation: "portrait".to_string(),
            image_quality: 0.98,
            canvas_scale: 2.0,
            avoid_break_inside: vec![
                "table".to_string(),
                "tr".to_string(),
                format!("img.{CHART_SNAPSHOT_CLASS}"),
            ],
            break_before: ".page-break-before".to_string(),
            break_after: ".page-break-after".to_string(),
            chart_raster: RasterSize::default(),
        }
    }
}

impl ExportOptions {
    /// Option object in the shape html2pdf.js expects.
    pub fn rasterizer_options(&self, filename: &str) -> Value {
        json!({
            "margin": self.margin_mm,
            "filename": filename,
            "image": { "type": "jpeg", "quality": self.image_quality },
            "html2canvas": { "scale": self.canvas_scale, "useCORS": true, "logging": false },
            "jsPDF": { "unit": "mm", "format": self.page_format, "orientation": self.orientation },
            "pagebreak": {
                "mode": ["css", "legacy"],
                "before": self.break_before,
                "after": self.break_after,
                "avoid": self.avoid_break_inside,
            },
        })
    }
}

/// Class given to the static images that stand in for charts.
pub const CHART_SNAPSHOT_CLASS: &str = "chart-snapshot";

pub fn report_filename(prefix: &str, timestamp: &str) -> String {
    format!("{prefix}_{timestamp}.pdf")
}

/// The page being exported. Browser-backed in the app, faked in tests.
#[async_trait(?Send)]
pub trait ExportSurface {
    type Node: Clone;

    /// Interactive charts under the export root, in document order.
    fn charts(&self) -> Vec<Self::Node>;

    /// Every element under the export root, root included.
    fn elements(&self) -> Vec<Self::Node>;

    /// Render `chart` to an image URL (data URL in the browser).
    async fn rasterize_chart(&self, chart: &Self::Node, size: RasterSize) -> Result<String, String>;

    /// Insert an `<img>` right after `chart` and return it.
    fn insert_snapshot(&self, chart: &Self::Node, image_url: &str, size: RasterSize) -> Result<Self::Node, String>;

    fn remove(&self, node: &Self::Node);

    /// Inline style value, `None` when unset.
    fn inline_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// Set (or with `None`, clear) an inline style.
    fn set_inline_style(&self, node: &Self::Node, property: &str, value: Option<&str>);

    /// Resolved style value.
    fn computed_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// Hand the export root to the document rasterizer and save the result.
    async fn render_document(&self, options: &Value) -> Result<(), String>;
}

enum Undo<N> {
    Style {
        node: N,
        property: &'static str,
        prior: Option<String>,
    },
    Remove(N),
}

/// Mutations applied to the page, undone last-in first-out on drop.
pub struct RestoreStack<'a, S: ExportSurface + ?Sized> {
    surface: &'a S,
    undo: Vec<Undo<S::Node>>,
}

impl<'a, S: ExportSurface + ?Sized> RestoreStack<'a, S> {
    pub fn new(surface: &'a S) -> Self {
        Self {
            surface,
            undo: Vec::new(),
        }
    }

    /// Set an inline style, remembering the prior inline value.
    pub fn set_style(&mut self, node: &S::Node, property: &'static str, value: &str) {
        let prior = self.surface.inline_style(node, property);
        self.undo.push(Undo::Style {
            node: node.clone(),
            property,
            prior,
        });
        self.surface.set_inline_style(node, property, Some(value));
    }

    /// Track a node inserted for the export so it is removed afterwards.
    pub fn inserted(&mut self, node: S::Node) {
        self.undo.push(Undo::Remove(node));
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Undo everything now. Dropping does the same.
    pub fn restore(mut self) {
        self.unwind();
    }

    fn unwind(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Style {
                    node,
                    property,
                    prior,
                } => self
                    .surface
                    .set_inline_style(&node, property, prior.as_deref()),
                Undo::Remove(node) => self.surface.remove(&node),
            }
        }
    }
}

impl<S: ExportSurface + ?Sized> Drop for RestoreStack<'_, S> {
    fn drop(&mut self) {
        self.unwind();
    }
}

/// Allows a single export at a time.
#[derive(Debug, Clone, Default)]
pub struct ExportLock {
    busy: Rc<Cell<bool>>,
}

impl ExportLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn try_acquire(&self) -> Result<ExportGuard, ExportError> {
        if self.busy.replace(true) {
            return Err(ExportError::InProgress);
        }
        Ok(ExportGuard {
            busy: Rc::clone(&self.busy),
        })
    }
}

/// Releases the [`ExportLock`] on drop.
#[derive(Debug)]
pub struct ExportGuard {
    busy: Rc<Cell<bool>>,
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub charts_rasterized: usize,
    pub charts_skipped: usize,
    pub colors_overridden: usize,
}

/// Run the whole export against `surface`. The page is restored before this returns.
pub async fn export_document<S>(
    surface: &S,
    options: &ExportOptions,
    filename: &str,
) -> Result<ExportReport, ExportError>
where
    S: ExportSurface + ?Sized,
{
    let mut restore = RestoreStack::new(surface);
    let mut report = ExportReport::default();

    for (index, chart) in surface.charts().iter().enumerate() {
        match substitute_chart(surface, &mut restore, chart, options.chart_raster).await {
            Ok(()) => report.charts_rasterized += 1,
            Err(reason) => {
                let err = ExportError::ChartRaster { index, reason };
                tracing::warn!(index, error = %err, "skipping chart in export");
                report.charts_skipped += 1;
            }
        }
    }

    report.colors_overridden = neutralize_colors(surface, &mut restore);

    tracing::info!(
        charts = report.charts_rasterized,
        skipped = report.charts_skipped,
        colors = report.colors_overridden,
        %filename,
        "rendering report document"
    );
    let rendered = surface
        .render_document(&options.rasterizer_options(filename))
        .await;
    restore.restore();

    rendered.map_err(ExportError::Document)?;
    Ok(report)
}

async fn substitute_chart<S>(
    surface: &S,
    restore: &mut RestoreStack<'_, S>,
    chart: &S::Node,
    size: RasterSize,
) -> Result<(), String>
where
    S: ExportSurface + ?Sized,
{
    let image_url = surface.rasterize_chart(chart, size).await?;
    let snapshot = surface.insert_snapshot(chart, &image_url, size)?;
    restore.inserted(snapshot);
    restore.set_style(chart, "display", "none");
    Ok(())
}

fn neutralize_colors<S>(surface: &S, restore: &mut RestoreStack<'_, S>) -> usize
where
    S: ExportSurface + ?Sized,
{
    let mut overridden = 0;
    for element in surface.elements() {
        for property in ColorProperty::ALL {
            let name = property.css_name();
            let Some(resolved) = surface.computed_style(&element, name) else {
                continue;
            };
            if let Some(safe) = colors::neutralize(&resolved, property) {
                restore.set_style(&element, name, &safe);
                overridden += 1;
            }
        }
    }
    overridden
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterizer_options_carry_page_setup() {
        let options = ExportOptions::default().rasterizer_options("bias_report_20240101_120000.pdf");
        assert_eq!(options["margin"], json!([10.0, 10.0, 10.0, 10.0]));
        assert_eq!(options["image"]["type"], "jpeg");
        assert_eq!(options["image"]["quality"], 0.98);
        assert_eq!(options["jsPDF"]["format"], "a4");
        assert_eq!(options["jsPDF"]["orientation"], "portrait");
        assert_eq!(options["pagebreak"]["before"], ".page-break-before");
        assert_eq!(
            options["pagebreak"]["avoid"],
            json!(["table", "tr", "img.chart-snapshot"])
        );
    }

    #[test]
    fn filename_uses_prefix_and_timestamp() {
        assert_eq!(
            report_filename("bias_report", "20240101_120000"),
            "bias_report_20240101_120000.pdf"
        );
    }

    #[test]
    fn lock_rejects_reentry_until_guard_drops() {
        let lock = ExportLock::new();
        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_busy());
        assert_eq!(lock.try_acquire().unwrap_err(), ExportError::InProgress);
        drop(guard);
        assert!(!lock.is_busy());
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ExportOptions =
            serde_json::from_value(json!({ "image_quality": 0.8 })).unwrap();
        assert_eq!(options.image_quality, 0.8);
        assert_eq!(options.page_format, "a4");
        assert_eq!(options.chart_raster, RasterSize::default());
    }
}
