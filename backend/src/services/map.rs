//! Map layers: yield and NDVI circle markers plus the soil risk heat layer

use std::collections::HashMap;

use shared::{
    Frame, GpsCoordinates, HeatPoint, LinearColormap, MapLayers, MapView, Marker, Popup, Schema,
    TrendDirection,
};

use super::dataset::{parcel_key, Dataset};
use super::trend::index_slope;

const DEFAULT_ZOOM: u8 = 10;
const MARKER_RADIUS: u8 = 6;
const MARKER_OPACITY: f64 = 0.7;

/// Per-parcel popup content shared by all of a parcel's yield markers
struct YieldSummary {
    mean: f64,
    trend: Option<TrendDirection>,
    crops: Vec<String>,
}

pub struct MapService {
    yield_scale: LinearColormap,
    ndvi_scale: LinearColormap,
}

impl MapService {
    pub fn new(yield_scale_max: f64) -> Self {
        Self {
            yield_scale: LinearColormap::red_yellow_green(0.0, yield_scale_max),
            ndvi_scale: LinearColormap::red_yellow_green(0.0, 1.0),
        }
    }

    pub fn build(&self, dataset: &Dataset) -> MapLayers {
        let layers = MapLayers {
            view: map_view(dataset),
            yield_markers: self.yield_markers(dataset),
            ndvi_markers: self.ndvi_markers(dataset),
            risk_heat: risk_heat(dataset.soil(), dataset.schema()),
        };

        if layers.view.is_none() {
            tracing::warn!("No coordinates in monitoring or soil data; map has no centre");
        }
        tracing::debug!(
            "Map layers: {} yield markers, {} NDVI markers, {} heat points",
            layers.yield_markers.len(),
            layers.ndvi_markers.len(),
            layers.risk_heat.len()
        );

        layers
    }

    fn yield_markers(&self, dataset: &Dataset) -> Vec<Marker> {
        let schema = dataset.schema();
        let frame = dataset.yield_history();
        let summaries = yield_summaries(frame, schema);
        let soil_positions = soil_positions(dataset.soil(), schema);

        (0..frame.len())
            .filter_map(|row| {
                let parcel_id = frame.get(row, &schema.parcel_id).as_ref().and_then(parcel_key)?;
                let value = frame.number(row, &schema.yield_value)?;
                let position = coordinates(frame, row, schema)
                    .or_else(|| soil_positions.get(&parcel_id).copied())?;
                let summary = summaries.get(&parcel_id)?;
                Some(Marker {
                    position,
                    color: self.yield_scale.color(value),
                    radius: MARKER_RADIUS,
                    fill_opacity: MARKER_OPACITY,
                    popup: Popup::Yield {
                        parcel_id,
                        mean_yield_t_ha: summary.mean,
                        trend: summary.trend,
                        recent_crops: summary.crops.clone(),
                    },
                })
            })
            .collect()
    }

    fn ndvi_markers(&self, dataset: &Dataset) -> Vec<Marker> {
        let schema = dataset.schema();
        let frame = dataset.monitoring();

        (0..frame.len())
            .filter_map(|row| {
                let parcel_id = frame.get(row, &schema.parcel_id).as_ref().and_then(parcel_key)?;
                let ndvi = frame.number(row, &schema.ndvi)?;
                let position = coordinates(frame, row, schema)?;
                let zone = frame
                    .get(row, &schema.zone)
                    .filter(|cell| !cell.is_null())
                    .map(|cell| cell.render());
                Some(Marker {
                    position,
                    color: self.ndvi_scale.color(ndvi),
                    radius: MARKER_RADIUS,
                    fill_opacity: MARKER_OPACITY,
                    popup: Popup::Ndvi {
                        parcel_id,
                        ndvi,
                        zone,
                    },
                })
            })
            .collect()
    }
}

fn coordinates(frame: &Frame, row: usize, schema: &Schema) -> Option<GpsCoordinates> {
    GpsCoordinates::checked(
        frame.number(row, &schema.latitude),
        frame.number(row, &schema.longitude),
    )
}

/// Centre on the first monitored location, else the first soil sample
fn map_view(dataset: &Dataset) -> Option<MapView> {
    let schema = dataset.schema();
    let first = |frame: &Frame| (0..frame.len()).find_map(|row| coordinates(frame, row, schema));

    first(dataset.monitoring())
        .or_else(|| first(dataset.soil()))
        .map(|center| MapView {
            center,
            zoom: DEFAULT_ZOOM,
        })
}

fn soil_positions(frame: &Frame, schema: &Schema) -> HashMap<String, GpsCoordinates> {
    let mut positions = HashMap::new();
    for row in 0..frame.len() {
        let Some(parcel_id) = frame.get(row, &schema.parcel_id).as_ref().and_then(parcel_key) else {
            continue;
        };
        if let Some(position) = coordinates(frame, row, schema) {
            positions.entry(parcel_id).or_insert(position);
        }
    }
    positions
}

/// Mean yield, direction of yield against record order, and distinct crops
/// in order of appearance
fn yield_summaries(frame: &Frame, schema: &Schema) -> HashMap<String, YieldSummary> {
    let mut yields: HashMap<String, Vec<f64>> = HashMap::new();
    let mut crops: HashMap<String, Vec<String>> = HashMap::new();

    for row in 0..frame.len() {
        let Some(parcel_id) = frame.get(row, &schema.parcel_id).as_ref().and_then(parcel_key) else {
            continue;
        };
        if let Some(value) = frame.number(row, &schema.yield_value) {
            yields.entry(parcel_id.clone()).or_default().push(value);
        }
        if let Some(crop) = frame.get(row, &schema.crop).filter(|c| !c.is_null()) {
            let list = crops.entry(parcel_id).or_default();
            let crop = crop.render();
            if !list.contains(&crop) {
                list.push(crop);
            }
        }
    }

    yields
        .into_iter()
        .map(|(parcel_id, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            let trend = index_slope(&values).map(TrendDirection::from_slope);
            let crops = crops.remove(&parcel_id).unwrap_or_default();
            (parcel_id, YieldSummary { mean, trend, crops })
        })
        .collect()
}

fn risk_heat(frame: &Frame, schema: &Schema) -> Vec<HeatPoint> {
    (0..frame.len())
        .filter_map(|row| {
            Some(HeatPoint {
                latitude: frame.number(row, &schema.latitude)?,
                longitude: frame.number(row, &schema.longitude)?,
                weight: frame.number(row, &schema.soil_risk)?,
            })
        })
        .collect()
}
