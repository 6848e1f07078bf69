use std::{fs, path::PathBuf};

use serde::Deserialize;

use crate::error::PipelineError;

use super::{feature::FeatureCollection, geojson::parse_feature_collection};

/// Where the input FeatureCollection comes from. In YAML the variant is written as a tag, e.g.
/// `source: !Geofile` followed by an indented `filepath: ...`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum Source {
    Geofile { filepath: PathBuf },
    Url { url: String },
}

impl Source {
    pub fn location(&self) -> String {
        match self {
            Source::Geofile { filepath } => filepath.display().to_string(),
            Source::Url { url } => url.clone(),
        }
    }
}

fn download_text(url: &str) -> Result<String, PipelineError> {
    let transport_error = |reason: String| PipelineError::Transport {
        location: url.to_string(),
        reason,
    };
    let client = reqwest::blocking::Client::builder()
        .user_agent("region-dissolve")
        .build()
        .map_err(|err| transport_error(err.to_string()))?;
    let response = client
        .get(url)
        .send()
        .map_err(|err| transport_error(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(transport_error(format!("HTTP error, status {}", status)));
    }
    response
        .text()
        .map_err(|err| transport_error(format!("No response text, {}", err)))
}

/// Read the raw text of a source. Any failure is a `Transport` error; nothing is retried.
pub fn read_source_text(source: &Source) -> Result<String, PipelineError> {
    match source {
        Source::Geofile { filepath } => {
            log::info!("Reading features from {:?}", filepath);
            fs::read_to_string(filepath).map_err(|err| PipelineError::Transport {
                location: source.location(),
                reason: err.to_string(),
            })
        }
        Source::Url { url } => {
            log::info!("Downloading features from {}", url);
            download_text(url)
        }
    }
}

pub fn load_feature_collection(source: &Source) -> Result<FeatureCollection, PipelineError> {
    let contents = read_source_text(source)?;
    parse_feature_collection(&contents, &source.location())
}
