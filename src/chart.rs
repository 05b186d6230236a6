use serde_json::{json, Value};

use crate::axis::{AxisValues, OhlcTuple};
use crate::indicators::{ema_series, sma_series};

const ASSETS_HOST: &str = "https://go-echarts.github.io/go-echarts-assets/assets/";
const CONTAINER_ID: &str = "kline";

/// Page and series styling for a candlestick document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartStyle {
    pub page_title: String,
    pub title: String,
    pub width: String,
    pub height: String,
    /// ECharts theme name. `white` means the built-in light theme, with no
    /// theme script to load.
    pub theme: String,
    pub x_axis_name: String,
    pub y_axis_name: String,
    pub label_color: String,
    pub series_name: String,
    pub up_color: String,
    pub down_color: String,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            page_title: "Candle stick chart".to_string(),
            title: "Candle stick chart".to_string(),
            width: "1400px".to_string(),
            height: "700px".to_string(),
            theme: "chalk".to_string(),
            x_axis_name: "Time".to_string(),
            y_axis_name: "Price".to_string(),
            label_color: "White".to_string(),
            series_name: "Candle".to_string(),
            up_color: "green".to_string(),
            down_color: "red".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OverlaySeries {
    series_type: &'static str,
    name: String,
    data: Vec<Option<f64>>,
    color: String,
}

/// An ECharts candlestick document sharing its X axis with any overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct KlineChart {
    style: ChartStyle,
    x_axis: Vec<String>,
    candles: Vec<OhlcTuple>,
    overlays: Vec<OverlaySeries>,
}

impl KlineChart {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            x_axis: Vec::new(),
            candles: Vec::new(),
            overlays: Vec::new(),
        }
    }

    pub fn from_axis(style: ChartStyle, axis: AxisValues) -> Self {
        Self {
            style,
            x_axis: axis.x_axis,
            candles: axis.y_axis,
            overlays: Vec::new(),
        }
    }

    pub fn style(&self) -> &ChartStyle {
        &self.style
    }

    /// Overlay a line series. `data` is aligned with the candles; `None`
    /// leaves a gap.
    pub fn overlap_line(
        mut self,
        name: impl Into<String>,
        data: Vec<Option<f64>>,
        color: impl Into<String>,
    ) -> Self {
        self.overlays.push(OverlaySeries {
            series_type: "line",
            name: name.into(),
            data,
            color: color.into(),
        });
        self
    }

    /// Overlay a bar series, e.g. traded volume.
    pub fn overlap_bar(
        mut self,
        name: impl Into<String>,
        data: Vec<Option<f64>>,
        color: impl Into<String>,
    ) -> Self {
        self.overlays.push(OverlaySeries {
            series_type: "bar",
            name: name.into(),
            data,
            color: color.into(),
        });
        self
    }

    /// The ECharts option object.
    pub fn option(&self) -> Value {
        let style = &self.style;
        let label = json!({ "color": style.label_color });

        let mut series = vec![json!({
            "name": style.series_name,
            "type": "candlestick",
            "data": self.candles,
            "itemStyle": {
                "color": style.up_color,
                "color0": style.down_color,
                "borderColor": style.up_color,
                "borderColor0": style.down_color,
            },
        })];
        for overlay in &self.overlays {
            let mut s = json!({
                "name": overlay.name,
                "type": overlay.series_type,
                "data": overlay.data,
                "xAxisIndex": 0,
                "yAxisIndex": 0,
            });
            if overlay.series_type == "line" {
                s["showSymbol"] = json!(false);
                s["lineStyle"] = json!({ "color": overlay.color });
            } else {
                s["itemStyle"] = json!({ "color": overlay.color });
            }
            series.push(s);
        }

        json!({
            "title": { "text": style.title },
            "legend": { "show": !self.overlays.is_empty() },
            "tooltip": { "show": true, "trigger": "item", "triggerOn": "mousemove" },
            "xAxis": [{
                "name": style.x_axis_name,
                "type": "category",
                "data": self.x_axis,
                "scale": true,
                "axisLabel": label,
            }],
            "yAxis": [{
                "name": style.y_axis_name,
                "scale": true,
                "axisLabel": label,
            }],
            "dataZoom": [
                { "type": "inside", "xAxisIndex": [0], "start": 0, "end": 100 },
                { "type": "slider", "xAxisIndex": [0], "start": 0, "end": 100 },
            ],
            "series": series,
        })
    }

    /// Self-contained HTML page. ECharts and the theme script load from the
    /// go-echarts asset host.
    pub fn render(&self) -> String {
        let style = &self.style;
        let theme_script = if style.theme.is_empty() || style.theme == "white" {
            String::new()
        } else {
            format!(
                "\n    <script src=\"{ASSETS_HOST}themes/{}.js\"></script>",
                escape_html(&style.theme)
            )
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <script src="{ASSETS_HOST}echarts.min.js"></script>{theme_script}
</head>
<body>
<div class="container">
    <div class="item" id="{CONTAINER_ID}" style="width:{width};height:{height};"></div>
</div>
<script type="text/javascript">
    "use strict";
    let chart_{CONTAINER_ID} = echarts.init(document.getElementById('{CONTAINER_ID}'), {theme}, {{ renderer: "canvas" }});
    let option_{CONTAINER_ID} = {option};
    chart_{CONTAINER_ID}.setOption(option_{CONTAINER_ID});
</script>
</body>
</html>
"#,
            title = escape_html(&style.page_title),
            width = escape_html(&style.width),
            height = escape_html(&style.height),
            theme = script_json(&Value::String(style.theme.clone())),
            option = script_json(&self.option()),
        )
    }
}

/// Moving-average overlay added to every default chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    Sma(usize),
    Ema(usize),
}

/// Builds the default chart from freshly fetched axis data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartTemplate {
    pub style: ChartStyle,
    pub overlays: Vec<Overlay>,
}

impl ChartTemplate {
    pub fn new(style: ChartStyle) -> Self {
        Self {
            style,
            overlays: Vec::new(),
        }
    }

    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlays.push(overlay);
        self
    }

    pub fn build(&self, axis: AxisValues) -> KlineChart {
        let lines: Vec<(String, Vec<Option<f64>>, &str)> = self
            .overlays
            .iter()
            .map(|overlay| match *overlay {
                Overlay::Sma(w) => (format!("SMA({w})"), sma_series(&axis, w), "Black"),
                Overlay::Ema(w) => (format!("EMA({w})"), ema_series(&axis, w), "Blue"),
            })
            .collect();

        lines
            .into_iter()
            .fold(KlineChart::from_axis(self.style.clone(), axis), |chart, (name, data, color)| {
                chart.overlap_line(name, data, color)
            })
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// JSON embedded in a <script> block must not close it early.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}
