extern crate log;
use anyhow::{anyhow, Context};
use clap::Parser;
use region_dissolve::dissolve::pipeline;
use region_dissolve::geofile::geojson::write_features_to_geojson;
use region_dissolve::geofile::source::{load_feature_collection, Source};
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

/// Merge adjacent polygons sharing a property value into one feature per value.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

fn default_property_name() -> String {
    "STATEFP".to_string()
}

#[derive(Deserialize, Debug)]
struct Config {
    source: Source,
    #[serde(default = "default_property_name")]
    property_name: String,
    output_filepath: PathBuf,
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;

    let feature_collection = load_feature_collection(&config.source)?;
    log::info!(
        "Read {} features from {}",
        feature_collection.len(),
        config.source.location()
    );

    let consolidated = pipeline::run(&feature_collection, &config.property_name)?;
    if let Some(bounds) = consolidated.bounding_rect() {
        log::info!(
            "Output bounds: ({}, {}) to ({}, {})",
            bounds.min().x,
            bounds.min().y,
            bounds.max().x,
            bounds.max().y
        );
    }

    log::info!(
        "Writing {} features to {:?}",
        consolidated.len(),
        &config.output_filepath
    );
    write_features_to_geojson(&consolidated, &config.output_filepath)
        .with_context(|| format!("Writing output to {:?}", &config.output_filepath))?;
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
