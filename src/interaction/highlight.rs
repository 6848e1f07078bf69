use serde::Serialize;

use crate::geofile::feature::FeatureCollection;

/// Stroke and fill parameters of a rendered feature.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathStyle {
    pub weight: f64,
    pub color: String,
    pub dash_array: String,
    pub opacity: f64,
    pub fill_opacity: f64,
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            weight: 3.0,
            color: "#3388ff".to_string(),
            dash_array: String::new(),
            opacity: 1.0,
            fill_opacity: 0.2,
        }
    }
}

impl PathStyle {
    /// Emphasized style applied while the pointer is over a feature.
    pub fn highlight() -> Self {
        Self {
            weight: 5.0,
            color: "#666".to_string(),
            dash_array: String::new(),
            fill_opacity: 0.7,
            ..Self::default()
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StyleEvent {
    #[serde(rename_all = "camelCase")]
    Restyle {
        feature_index: usize,
        style: PathStyle,
    },
    #[serde(rename_all = "camelCase")]
    Reset {
        feature_index: usize,
        style: PathStyle,
    },
}

/// Handle over a rendered collection, passed to whatever dispatches pointer events.
pub struct LayerHandle<'a> {
    collection: &'a FeatureCollection,
    default_style: PathStyle,
}

impl<'a> LayerHandle<'a> {
    pub fn new(collection: &'a FeatureCollection, default_style: PathStyle) -> Self {
        Self {
            collection,
            default_style,
        }
    }

    /// Tooltip text of a feature: its properties as indented JSON.
    pub fn tooltip(&self, feature_index: usize) -> Option<String> {
        let feature = self.collection.features.get(feature_index)?;
        serde_json::to_string_pretty(&feature.attributes).ok()
    }

    pub fn on_pointer_enter(&self, feature_index: usize) -> Option<StyleEvent> {
        self.collection.features.get(feature_index)?;
        Some(StyleEvent::Restyle {
            feature_index,
            style: PathStyle::highlight(),
        })
    }

    pub fn on_pointer_leave(&self, feature_index: usize) -> Option<StyleEvent> {
        self.collection.features.get(feature_index)?;
        Some(StyleEvent::Reset {
            feature_index,
            style: self.default_style.clone(),
        })
    }
}
