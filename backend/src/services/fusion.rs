//! Feature fusion
//!
//! Builds the denormalized feature table: monitoring rows aligned backward in
//! time onto weather readings, then enriched with soil attributes and the
//! latest yield record of each parcel. The joins run as polars lazy queries;
//! a row index column carries the left table's order through them.

use chrono::NaiveDateTime;
use polars::prelude::{
    col, AsOfOptions, AsofStrategy, DataType, Expr, IntoLazy, JoinArgs, JoinType, LazyFrame,
    SortMultipleOptions,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    timestamp_dtype, Cell, FusedFrame, Frame, PlaceholderPolicy, Schema, SchemaError,
    TEMPERATURE_PLACEHOLDER_RANGE, WATER_STRESS_PLACEHOLDER_RANGE,
};

use super::dataset::{cell_year, year_start, Dataset};
use crate::error::{AppError, AppResult, FusionStage};

pub const WEATHER_SUFFIX: &str = "_weather";
pub const SOIL_SUFFIX: &str = "_soil";
pub const YIELD_SUFFIX: &str = "_yield";

/// Position of each row in its source table
const ROW_INDEX: &str = "__row";
/// Ordering key of yield rows
const YIELD_RANK: &str = "__rank";

/// Which row of a right-hand table represents its key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowChoice {
    First,
    /// Highest `YIELD_RANK`; later rows win ties
    Latest,
}

pub struct FusionService {
    placeholder: PlaceholderPolicy,
}

impl FusionService {
    pub fn new(placeholder: PlaceholderPolicy) -> Self {
        Self { placeholder }
    }

    /// Fuse the four sources into one row per monitoring observation
    pub fn prepare_features(&self, dataset: &Dataset) -> AppResult<FusedFrame> {
        let dataset = dataset.index_by_time()?;
        let schema = dataset.schema();

        let stage = |stage: FusionStage| move |e: SchemaError| AppError::fusion(stage, e);

        let aligned = asof_join(
            dataset.monitoring(),
            dataset.weather(),
            &schema.timestamp,
            WEATHER_SUFFIX,
        )
        .map_err(stage(FusionStage::WeatherAlignment))?;
        tracing::debug!(
            "Weather aligned: {} of {} monitoring rows matched",
            matched_rows(&aligned, &format!("{}{}", schema.timestamp, WEATHER_SUFFIX)),
            aligned.len()
        );

        let with_soil = left_join_unique(
            &aligned,
            dataset.soil(),
            &schema.parcel_id,
            SOIL_SUFFIX,
            RowChoice::First,
        )
        .map_err(stage(FusionStage::SoilEnrichment))?;

        let ranked_yields = dataset
            .yield_history()
            .with_column(YIELD_RANK, yield_ranks(dataset.yield_history(), schema))
            .map_err(stage(FusionStage::YieldEnrichment))?;
        let fused = left_join_unique(
            &with_soil,
            &ranked_yields,
            &schema.parcel_id,
            YIELD_SUFFIX,
            RowChoice::Latest,
        )
        .map_err(stage(FusionStage::YieldEnrichment))?
        .renamed("fused");

        let fused = self.fill_placeholders(fused, schema)?;

        tracing::info!(
            "Features prepared: {} rows, {} columns",
            fused.len(),
            fused.frame.columns().len()
        );

        Ok(fused)
    }

    fn fill_placeholders(&self, frame: Frame, schema: &Schema) -> AppResult<FusedFrame> {
        let seed = match self.placeholder {
            PlaceholderPolicy::Seeded { seed } => seed,
            PlaceholderPolicy::Disabled => return Ok(FusedFrame::new(frame)),
        };

        let mut rng = StdRng::seed_from_u64(seed);
        let mut frame = frame;
        let mut synthesized = Vec::new();

        for (column, (low, high)) in [
            (&schema.water_stress, WATER_STRESS_PLACEHOLDER_RANGE),
            (&schema.temperature, TEMPERATURE_PLACEHOLDER_RANGE),
        ] {
            if frame.has_column(column) {
                continue;
            }
            let values: Vec<Cell> = (0..frame.len())
                .map(|_| Cell::Number(rng.gen_range(low..high)))
                .collect();
            frame = frame
                .with_column(column, values)
                .map_err(|e| AppError::fusion(FusionStage::RiskScoring, e))?;
            tracing::warn!(
                "Column '{}' not found in any source; filled with placeholder values in [{}, {}) (seed {})",
                column,
                low,
                high,
                seed
            );
            synthesized.push(column.clone());
        }

        Ok(FusedFrame { frame, synthesized })
    }
}

fn matched_rows(frame: &Frame, column: &str) -> usize {
    frame
        .column(column)
        .map(|cells| cells.iter().filter(|c| !c.is_null()).count())
        .unwrap_or(0)
}

fn select(columns: &[String]) -> Vec<Expr> {
    columns.iter().map(|name| col(name.as_str())).collect()
}

/// Left join of `left` (with its row index) onto `right` by row index, then
/// back in left order without the index. Right columns already present on
/// the left get `suffix`.
fn attach_by_row(left: &Frame, right: LazyFrame, suffix: &str) -> Result<Frame, SchemaError> {
    let joined = left
        .data_frame()
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .join(
            right,
            [col(ROW_INDEX)],
            [col(ROW_INDEX)],
            JoinArgs::new(JoinType::Left).with_suffix(Some(suffix.into())),
        )
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .collect()
        .and_then(|data| data.drop(ROW_INDEX))
        .map_err(|e| SchemaError::engine(left.name(), e))?;
    Ok(Frame::from_data_frame(left.name(), joined))
}

/// Keep the rows of `rows` whose `ROW_INDEX` is picked by `pick` within each
/// `key` group
fn pick_rows(rows: LazyFrame, key: &str, pick: Expr) -> LazyFrame {
    let picked = rows
        .clone()
        .group_by([col(key)])
        .agg([pick])
        .select([col(ROW_INDEX)]);
    rows.join(
        picked,
        [col(ROW_INDEX)],
        [col(ROW_INDEX)],
        JoinArgs::new(JoinType::Inner),
    )
}

/// Backward asof join on a timestamp column: each left row takes the right
/// row with the greatest timestamp not after its own. Exact matches count;
/// among equal right timestamps the last one wins. Left rows without a
/// timestamp, or earlier than every right row, get nulls.
///
/// The right timestamp is kept as `{on}{suffix}`.
pub fn asof_join(left: &Frame, right: &Frame, on: &str, suffix: &str) -> Result<Frame, SchemaError> {
    left.require_column(on)?;
    right.require_column(on)?;

    let matched_on = format!("{}{}", on, suffix);
    let right_columns: Vec<String> = right
        .columns()
        .into_iter()
        .map(|name| if name == on { matched_on.clone() } else { name })
        .collect();

    let dated = |frame: &Frame| {
        frame
            .data_frame()
            .clone()
            .lazy()
            .with_row_index(ROW_INDEX, None)
            .with_column(col(on).cast(timestamp_dtype()))
            .filter(col(on).is_not_null())
    };

    // One reading per timestamp, the last in file order
    let readings = pick_rows(dated(right), on, col(ROW_INDEX).max())
        .sort([on], SortMultipleOptions::default())
        .with_column(col(on).alias(matched_on.as_str()));
    let mut reading_columns = right_columns.clone();
    reading_columns.push(on.to_string());
    let readings = readings.select(select(&reading_columns));

    let mut matched_columns = vec![ROW_INDEX.to_string()];
    matched_columns.extend(right_columns);
    let matched = dated(left)
        .select([col(ROW_INDEX), col(on)])
        .sort([on], SortMultipleOptions::default())
        .join(
            readings,
            [col(on)],
            [col(on)],
            JoinArgs::new(JoinType::AsOf(AsOfOptions {
                strategy: AsofStrategy::Backward,
                ..Default::default()
            })),
        )
        .select(select(&matched_columns));

    attach_by_row(left, matched, suffix)
}

/// Left join keeping every left row exactly once: the right table is first
/// reduced to one row per key.
fn left_join_unique(
    left: &Frame,
    right: &Frame,
    key: &str,
    suffix: &str,
    choice: RowChoice,
) -> Result<Frame, SchemaError> {
    left.require_column(key)?;
    right.require_column(key)?;

    let right_columns: Vec<String> = right
        .columns()
        .into_iter()
        .filter(|name| name != ROW_INDEX && name != YIELD_RANK)
        .collect();

    let keyed = right
        .data_frame()
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .with_column(col(key).cast(DataType::String))
        .filter(col(key).is_not_null());

    let chosen = match choice {
        RowChoice::First => pick_rows(keyed, key, col(ROW_INDEX).min()),
        RowChoice::Latest => pick_rows(
            keyed.sort([YIELD_RANK, ROW_INDEX], SortMultipleOptions::default()),
            key,
            col(ROW_INDEX).last(),
        ),
    };
    let chosen = chosen.select(select(&right_columns));

    // Matched by key, then carried to the left rows by row index
    let keys = left
        .data_frame()
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .select([col(ROW_INDEX), col(key).cast(DataType::String)]);
    let mut matched_columns = vec![ROW_INDEX.to_string()];
    matched_columns.extend(right_columns.into_iter().filter(|name| name != key));
    let matched = keys
        .join(
            chosen,
            [col(key)],
            [col(key)],
            JoinArgs::new(JoinType::Left),
        )
        .select(select(&matched_columns));

    attach_by_row(left, matched, suffix)
}

/// Ordering of yield rows: the timestamp column, else the year column
fn yield_ranks(frame: &Frame, schema: &Schema) -> Vec<Cell> {
    (0..frame.len())
        .map(|row| {
            let rank: Option<NaiveDateTime> = frame.timestamp(row, &schema.timestamp).or_else(|| {
                frame
                    .get(row, &schema.year)
                    .as_ref()
                    .and_then(cell_year)
                    .and_then(year_start)
            });
            rank.map(Cell::Timestamp).unwrap_or(Cell::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Cell {
        Cell::Timestamp(
            NaiveDate::from_ymd_opt(2024, 5, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn monitoring() -> Frame {
        Frame::from_rows(
            "monitoring",
            cols(&["parcelle_id", "date", "ndvi", "stress_hydrique"]),
            vec![
                vec!["P001".into(), day(5), 0.6.into(), 20.0.into()],
                vec!["P002".into(), day(1), 0.4.into(), 15.0.into()],
                vec!["P001".into(), day(10), 0.7.into(), Cell::Null],
            ],
        )
        .unwrap()
    }

    fn weather() -> Frame {
        Frame::from_rows(
            "weather",
            cols(&["date", "température", "meteo_condition"]),
            vec![
                vec![day(2), 28.0.into(), "Ensoleillé".into()],
                vec![day(5), 30.0.into(), "Nuageux".into()],
                vec![day(8), 26.0.into(), "Pluie".into()],
            ],
        )
        .unwrap()
    }

    fn soil() -> Frame {
        Frame::from_rows(
            "soil",
            cols(&["parcelle_id", "type_sol", "risque"]),
            vec![
                vec!["P001".into(), "argileux".into(), 0.3.into()],
                vec!["P001".into(), "sableux".into(), 0.9.into()],
            ],
        )
        .unwrap()
    }

    fn yields() -> Frame {
        Frame::from_rows(
            "yield_history",
            cols(&["parcelle_id", "annee", "rendement", "culture"]),
            vec![
                vec!["P001".into(), 2021.0.into(), 6.0.into(), "Blé".into()],
                vec!["P001".into(), 2022.0.into(), 7.0.into(), "Maïs".into()],
                vec!["P001".into(), 2020.0.into(), 5.0.into(), "Blé".into()],
            ],
        )
        .unwrap()
    }

    fn dataset(weather: Frame, soil: Frame) -> Dataset {
        Dataset::from_frames(Schema::default(), monitoring(), weather, soil, yields()).unwrap()
    }

    fn sample() -> Dataset {
        dataset(weather(), soil())
    }

    fn fuse(data: &Dataset) -> FusedFrame {
        FusionService::new(PlaceholderPolicy::Disabled)
            .prepare_features(data)
            .unwrap()
    }

    #[test]
    fn test_row_count_preserved() {
        assert_eq!(fuse(&sample()).len(), 3);
    }

    #[test]
    fn test_weather_is_backward_aligned() {
        let fused = fuse(&sample());
        let frame = &fused.frame;

        // Sorted by date: P002 day 1, P001 day 5, P001 day 10
        assert_eq!(frame.get(0, "date_weather"), Some(Cell::Null));
        assert_eq!(frame.get(0, "température"), Some(Cell::Null));
        assert_eq!(frame.get(1, "date_weather"), Some(day(5)));
        assert_eq!(frame.number(1, "température"), Some(30.0));
        assert_eq!(frame.get(2, "date_weather"), Some(day(8)));
        assert_eq!(frame.text(2, "meteo_condition").as_deref(), Some("Pluie"));
    }

    #[test]
    fn test_soil_first_row_and_latest_yield() {
        let fused = fuse(&sample());
        let frame = &fused.frame;

        assert_eq!(frame.text(1, "type_sol").as_deref(), Some("argileux"));
        assert_eq!(frame.number(1, "rendement"), Some(7.0));
        assert_eq!(frame.text(1, "culture").as_deref(), Some("Maïs"));
        assert_eq!(frame.number(2, "risque"), Some(0.3));
        assert!(frame.has_column("date_yield"));
        assert!(!frame.has_column("__row"));
        assert!(!frame.has_column("__rank"));
        // P002 has neither soil nor yield
        assert_eq!(frame.get(0, "type_sol"), Some(Cell::Null));
        assert_eq!(frame.get(0, "rendement"), Some(Cell::Null));
    }

    #[test]
    fn test_join_key_not_duplicated() {
        let columns = fuse(&sample()).frame.columns();
        assert_eq!(columns.iter().filter(|c| c.starts_with("parcelle_id")).count(), 1);
        assert_eq!(columns[..4], cols(&["parcelle_id", "date", "ndvi", "stress_hydrique"])[..]);
    }

    #[test]
    fn test_colliding_soil_column_gets_suffix() {
        let soil = Frame::from_rows(
            "soil",
            cols(&["parcelle_id", "ndvi"]),
            vec![vec!["P002".into(), 0.9.into()]],
        )
        .unwrap();
        let fused = fuse(&dataset(weather(), soil));
        assert_eq!(fused.frame.number(0, "ndvi"), Some(0.4));
        assert_eq!(fused.frame.number(0, "ndvi_soil"), Some(0.9));
        assert_eq!(fused.frame.get(1, "ndvi_soil"), Some(Cell::Null));
    }

    #[test]
    fn test_output_follows_time_even_from_unsorted_frames() {
        let data = sample();
        assert!(!data.is_indexed());
        let fused = fuse(&data);
        assert!(fused.frame.is_sorted_by_timestamp("date"));
    }

    #[test]
    fn test_seeded_placeholder_is_marked_and_reproducible() {
        let weather = Frame::from_rows(
            "weather",
            cols(&["date", "meteo_condition"]),
            vec![vec![day(2), "Ensoleillé".into()]],
        )
        .unwrap();
        let data = dataset(weather, soil());

        let service = FusionService::new(PlaceholderPolicy::Seeded { seed: 7 });
        let first = service.prepare_features(&data).unwrap();
        let second = service.prepare_features(&data).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.synthesized, vec!["température".to_string()]);
        assert!(!first.is_synthesized("stress_hydrique"));
        for cell in first.frame.column("température").unwrap() {
            let value = cell.as_f64().unwrap();
            assert!((20.0..40.0).contains(&value));
        }
    }

    #[test]
    fn test_disabled_placeholder_leaves_column_absent() {
        let weather = Frame::from_rows("weather", cols(&["date"]), vec![]).unwrap();
        let fused = fuse(&dataset(weather, soil()));
        assert!(!fused.frame.has_column("température"));
        assert!(fused.synthesized.is_empty());
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_missing_soil_key_is_a_fusion_error() {
        let soil = Frame::from_rows("soil", cols(&["id", "risque"]), vec![]).unwrap();
        let err = FusionService::new(PlaceholderPolicy::Disabled)
            .prepare_features(&dataset(weather(), soil))
            .unwrap_err();
        match err {
            AppError::Fusion { stage, cause } => {
                assert_eq!(stage, FusionStage::SoilEnrichment);
                assert_eq!(
                    cause,
                    SchemaError::MissingColumn {
                        table: "soil".to_string(),
                        column: "parcelle_id".to_string(),
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_weather_timestamp_is_a_fusion_error() {
        let weather = Frame::from_rows("weather", cols(&["température"]), vec![]).unwrap();
        let err = FusionService::new(PlaceholderPolicy::Disabled)
            .prepare_features(&dataset(weather, soil()))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Fusion { stage: FusionStage::TemporalIndex, .. }
        ));
    }

    #[test]
    fn test_asof_exact_match_and_ties() {
        let left = Frame::from_rows("l", cols(&["date"]), vec![vec![day(5)]]).unwrap();
        let right = Frame::from_rows(
            "r",
            cols(&["date", "v"]),
            vec![vec![day(5), 1.0.into()], vec![day(5), 2.0.into()], vec![day(6), 3.0.into()]],
        )
        .unwrap();
        let joined = asof_join(&left, &right, "date", "_r").unwrap();
        assert_eq!(joined.number(0, "v"), Some(2.0));
        assert_eq!(joined.get(0, "date_r"), Some(day(5)));
    }

    #[test]
    fn test_asof_keeps_left_order_and_undated_rows() {
        let left = Frame::from_rows(
            "l",
            cols(&["date", "v"]),
            vec![vec![day(9), 1.0.into()], vec![Cell::Null, 2.0.into()], vec![day(3), 3.0.into()]],
        )
        .unwrap();
        let right = Frame::from_rows(
            "r",
            cols(&["date", "v"]),
            vec![vec![day(8), 10.0.into()], vec![day(2), 20.0.into()]],
        )
        .unwrap();
        let joined = asof_join(&left, &right, "date", "_r").unwrap();
        assert_eq!(joined.columns(), cols(&["date", "v", "date_r", "v_r"]));
        assert_eq!(joined.number(0, "v"), Some(1.0));
        assert_eq!(joined.number(0, "v_r"), Some(10.0));
        assert_eq!(joined.get(1, "v_r"), Some(Cell::Null));
        assert_eq!(joined.number(2, "v_r"), Some(20.0));
    }

    #[test]
    fn test_latest_yield_ties_go_to_later_row() {
        let yields = Frame::from_rows(
            "yield_history",
            cols(&["parcelle_id", "annee", "rendement"]),
            vec![
                vec!["P001".into(), 2022.0.into(), 7.0.into()],
                vec!["P001".into(), 2022.0.into(), 8.0.into()],
                vec!["P001".into(), Cell::Null, 9.0.into()],
            ],
        )
        .unwrap();
        let data =
            Dataset::from_frames(Schema::default(), monitoring(), weather(), soil(), yields).unwrap();
        let fused = fuse(&data);
        assert_eq!(fused.frame.number(1, "rendement"), Some(8.0));
    }
}
