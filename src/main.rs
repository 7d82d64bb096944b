use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;

use sonardoc_config::SonardocConfig;
use sonardoc_html::{HighlightSpan, RenderOptions, render_rule_html_with_css, render_without_css};

#[derive(Serialize)]
struct JsonOutput<'a> {
    text: &'a str,
    highlights: &'a [HighlightSpan],
    commands: &'a [String],
}

fn main() -> Result<()> {
    let _ = env_logger::try_init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        eprintln!(
            "Usage: sonardoc <html-file> [--base-dir <dir>] [--no-css] [--json] [--config <toml>]"
        );
        bail!("missing <html-file>");
    }

    let input = PathBuf::from(args.remove(0));
    if !input.exists() {
        bail!("input file not found: {}", input.display());
    }

    let mut base_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut no_css = false;
    let mut json = false;
    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--base-dir" => {
                if i + 1 >= args.len() {
                    bail!("--base-dir expects a path");
                }
                base_dir = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    bail!("--config expects a path");
                }
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--no-css" => {
                no_css = true;
                i += 1;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    let config = match &config_path {
        Some(path) => {
            let mut config = SonardocConfig::load_from_file(path)?;
            config.merge_with_env();
            config
        }
        None => SonardocConfig::load(),
    };
    log::debug!("effective config: {config:?}");

    let html = fs::read_to_string(&input)
        .with_context(|| format!("failed to read input file {}", input.display()))?;

    // Precedence for stylesheet lookup: flag, config, then the input's folder.
    let base_path = base_dir
        .or_else(|| config.css.stylesheet_dir.clone())
        .or_else(|| input.parent().map(|p| p.to_path_buf()));
    let options = RenderOptions {
        base_path,
        rule_width: config.render.rule_width,
        max_var_depth: config.render.max_var_depth,
        link_icon: config.render.link_icon.clone(),
    };

    let mut commands: Vec<String> = Vec::new();
    let rendered = if no_css || !config.css.enabled {
        render_without_css(&html, &options)
    } else {
        render_rule_html_with_css(&html, &options, &mut commands)?
    };
    log::info!(
        "rendered {} lines, {} highlights, {} palette commands",
        rendered.line_count(),
        rendered.highlights.len(),
        commands.len()
    );

    if json {
        let output = JsonOutput {
            text: &rendered.text,
            highlights: &rendered.highlights,
            commands: &commands,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for cmd in &commands {
            println!("{cmd}");
        }
        if !commands.is_empty() {
            println!();
        }
        println!("{}", rendered.text);
    }
    Ok(())
}
