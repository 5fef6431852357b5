use crate::geometry::{Point, Polygon, Rect};
use crate::obstacle::ObstacleTree;
use crate::router::RoutedEdge;
use crate::visibility::VisibilityGraph;
use anyhow::Result;
use std::path::Path;

const MARGIN: f64 = 20.0;

/// What a preview draws and how large.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub show_graph: bool,
    pub scale: f64,
    pub background: String,
    pub shape_fill: String,
    pub shape_stroke: String,
    pub group_stroke: String,
    pub padding_stroke: String,
    pub graph_stroke: String,
    pub route_stroke: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_graph: false,
            scale: 4.0,
            background: "#ffffff".to_string(),
            shape_fill: "#eef2ff".to_string(),
            shape_stroke: "#4f46e5".to_string(),
            group_stroke: "#94a3b8".to_string(),
            padding_stroke: "#c7d2fe".to_string(),
            graph_stroke: "#e2e8f0".to_string(),
            route_stroke: "#dc2626".to_string(),
        }
    }
}

struct Frame {
    bounds: Rect,
    scale: f64,
}

impl Frame {
    fn width(&self) -> f64 {
        self.bounds.width() * self.scale + 2.0 * MARGIN
    }

    fn height(&self) -> f64 {
        self.bounds.height() * self.scale + 2.0 * MARGIN
    }

    fn map(&self, p: Point) -> (f64, f64) {
        (
            (p.x - self.bounds.left) * self.scale + MARGIN,
            (self.bounds.top - p.y) * self.scale + MARGIN,
        )
    }

    fn polyline(&self, points: &[Point]) -> String {
        let mut d = String::new();
        for (i, p) in points.iter().enumerate() {
            let (x, y) = self.map(*p);
            let op = if i == 0 { "M" } else { " L" };
            d.push_str(&format!("{op} {x:.2} {y:.2}"));
        }
        d
    }

    fn polygon(&self, polygon: &Polygon) -> String {
        let mut d = self.polyline(polygon.points());
        d.push_str(" Z");
        d
    }
}

pub fn render_svg(
    tree: &ObstacleTree,
    graph: Option<&VisibilityGraph>,
    routes: &[RoutedEdge],
    options: &RenderOptions,
) -> String {
    let mut bounds = Rect::around(
        tree.obstacles()
            .iter()
            .flat_map(|o| o.padded.points().iter().copied())
            .chain(routes.iter().flat_map(|r| r.points.iter().copied())),
    )
    .unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
    if let Some(graph) = graph
        && let Some(graph_bounds) = graph.bounds()
    {
        bounds = bounds.union(&graph_bounds);
    }
    let frame = Frame {
        bounds,
        scale: options.scale,
    };
    let (width, height) = (frame.width(), frame.height());

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        options.background
    ));

    // Groups first so their members draw on top.
    let mut obstacles: Vec<_> = tree.obstacles().iter().collect();
    obstacles.sort_by_key(|o| !o.is_group);
    for obstacle in &obstacles {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-dasharray=\"4 3\" stroke-width=\"1\"/>",
            frame.polygon(&obstacle.padded),
            options.padding_stroke
        ));
        let (fill, stroke) = if obstacle.is_group {
            ("none", options.group_stroke.as_str())
        } else {
            (options.shape_fill.as_str(), options.shape_stroke.as_str())
        };
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"{fill}\" stroke=\"{stroke}\" stroke-width=\"1.4\"/>",
            frame.polygon(&obstacle.input)
        ));
    }

    if options.show_graph
        && let Some(graph) = graph
    {
        svg.push_str(&format!(
            "<g stroke=\"{}\" stroke-width=\"0.8\">",
            options.graph_stroke
        ));
        for (_, edge) in graph.edges() {
            let (x1, y1) = frame.map(graph.point(edge.source));
            let (x2, y2) = frame.map(graph.point(edge.target));
            svg.push_str(&format!(
                "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\"/>"
            ));
        }
        svg.push_str("</g>");
    }

    for route in routes {
        match route.points.as_slice() {
            [] => {}
            [single] => {
                let (x, y) = frame.map(*single);
                svg.push_str(&format!(
                    "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"2\" fill=\"{}\"/>",
                    options.route_stroke
                ));
            }
            points => {
                svg.push_str(&format!(
                    "<path id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.6\"/>",
                    escape_xml(&route.id),
                    frame.polyline(points),
                    options.route_stroke
                ));
            }
        }
    }

    svg.push_str("</svg>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path) -> Result<()> {
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
