use crate::config::{RouterConfig, load_config, validate};
use crate::render::{RenderOptions, render_svg, write_output_png, write_output_svg};
use crate::scene::{Scene, build_router, routes_to_json};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "rectroute", version, about = "Rectilinear edge router for JSON scenes")]
pub struct Args {
    /// Scene file (JSON or JSON5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Router config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Build the sparse visibility graph
    #[arg(long)]
    pub sparse: bool,

    /// Route to port locations instead of shape borders
    #[arg(long = "route-to-center")]
    pub route_to_center: bool,

    /// Draw the visibility graph behind the routes (svg/png)
    #[arg(long = "show-graph")]
    pub show_graph: bool,

    /// Padding around every shape
    #[arg(long)]
    pub padding: Option<f64>,

    /// Bend penalty as a percentage of the endpoint distance
    #[arg(long = "bend-penalty")]
    pub bend_penalty: Option<f64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = apply_overrides(load_config(args.config.as_deref())?, &args)?;
    let scene = Scene::parse(&read_input(args.input.as_deref())?)?;

    let mut router = build_router(&scene, config)?;
    let routes = router.route_edges(&scene.edge_requests(), |_, _| ControlFlow::Continue(()))?;

    match args.output_format {
        OutputFormat::Json => {
            let json = routes_to_json(&routes)?;
            match args.output.as_deref() {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        OutputFormat::Svg | OutputFormat::Png => {
            let options = RenderOptions {
                show_graph: args.show_graph,
                ..RenderOptions::default()
            };
            let (tree, graph) = router.snapshot()?;
            let svg = render_svg(tree, Some(graph), &routes, &options);
            if args.output_format == OutputFormat::Svg {
                write_output_svg(&svg, args.output.as_deref())?;
            } else {
                let output = ensure_output(&args.output, "png")?;
                write_output_png(&svg, &output)?;
            }
        }
    }
    Ok(())
}

fn apply_overrides(mut config: RouterConfig, args: &Args) -> Result<RouterConfig> {
    if args.sparse {
        config.use_sparse_visibility_graph = true;
    }
    if args.route_to_center {
        config.route_to_center = true;
    }
    if let Some(padding) = args.padding {
        config.padding = padding;
    }
    if let Some(percent) = args.bend_penalty {
        config.bend_penalty_percent = percent;
    }
    validate(&config)?;
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file_values() {
        let args = Args::parse_from(["rectroute", "--sparse", "--padding", "3", "-e", "svg"]);
        let config = apply_overrides(RouterConfig::default(), &args).expect("config");
        assert!(config.use_sparse_visibility_graph);
        assert_eq!(config.padding, 3.0);
        assert!(!config.route_to_center);
        assert_eq!(args.output_format, OutputFormat::Svg);
    }

    #[test]
    fn negative_bend_penalty_is_rejected() {
        let args = Args::parse_from(["rectroute", "--bend-penalty=-2"]);
        assert!(apply_overrides(RouterConfig::default(), &args).is_err());
    }

    #[test]
    fn png_needs_an_output_path() {
        assert!(ensure_output(&None, "png").is_err());
    }
}
