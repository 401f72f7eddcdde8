//! Property-based tests for the fusion pipeline
//!
//! - Property 1: Fused row count equals monitoring row count
//! - Property 2: Asof alignment never looks ahead
//! - Property 3: Temporal indexing is idempotent
//! - Property 4: Least squares recovers exact lines

use agri_monitor::services::fusion::asof_join;
use agri_monitor::services::trend::fit_linear;
use agri_monitor::services::{Dataset, FusionService};
use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use shared::{Cell, Frame, PlaceholderPolicy, Schema};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn timestamp(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(i64::from(day))
}

/// Day offsets, some missing
fn day_strategy() -> impl Strategy<Value = Option<u32>> {
    prop_oneof![
        9 => (0u32..60).prop_map(Some),
        1 => Just(None),
    ]
}

fn parcel_strategy() -> impl Strategy<Value = String> {
    "P00[1-5]"
}

fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn date_cell(day: Option<u32>) -> Cell {
    day.map(|d| Cell::Timestamp(timestamp(d))).unwrap_or(Cell::Null)
}

fn monitoring_frame(rows: &[(String, Option<u32>)]) -> Frame {
    Frame::from_rows(
        "monitoring",
        cols(&["parcelle_id", "date", "stress_hydrique"]),
        rows.iter()
            .map(|(parcel, day)| vec![parcel.as_str().into(), date_cell(*day), 20.0.into()])
            .collect(),
    )
    .unwrap()
}

fn weather_frame(days: &[Option<u32>]) -> Frame {
    Frame::from_rows(
        "weather",
        cols(&["date", "température"]),
        days.iter()
            .enumerate()
            .map(|(i, day)| vec![date_cell(*day), (i as f64).into()])
            .collect(),
    )
    .unwrap()
}

fn dataset(monitoring: &[(String, Option<u32>)], weather: &[Option<u32>], soil: &[String]) -> Dataset {
    Dataset::from_frames(
        Schema::default(),
        monitoring_frame(monitoring),
        weather_frame(weather),
        Frame::from_rows(
            "soil",
            cols(&["parcelle_id", "risque"]),
            soil.iter().map(|p| vec![p.as_str().into(), 0.5.into()]).collect(),
        )
        .unwrap(),
        Frame::from_rows(
            "yield_history",
            cols(&["parcelle_id", "annee", "rendement"]),
            soil.iter()
                .enumerate()
                .map(|(i, p)| vec![p.as_str().into(), (2015.0 + i as f64).into(), 5.0.into()])
                .collect(),
        )
        .unwrap(),
    )
    .unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property 1: Row preservation
    /// Duplicate soil and yield keys must not multiply monitoring rows
    #[test]
    fn test_fused_row_count_preserved(
        monitoring in prop::collection::vec((parcel_strategy(), day_strategy()), 0..30),
        weather in prop::collection::vec(day_strategy(), 0..20),
        soil in prop::collection::vec(parcel_strategy(), 0..10),
    ) {
        let data = dataset(&monitoring, &weather, &soil);
        let fused = FusionService::new(PlaceholderPolicy::Disabled)
            .prepare_features(&data)
            .unwrap();
        prop_assert_eq!(fused.len(), monitoring.len());
    }

    /// Property 2: Asof correctness
    /// The matched weather time is the latest one not after the row's time
    #[test]
    fn test_asof_matches_latest_preceding(
        left_days in prop::collection::vec(day_strategy(), 0..30),
        right_days in prop::collection::vec(day_strategy(), 0..20),
    ) {
        let left = Frame::from_rows(
            "monitoring",
            cols(&["date"]),
            left_days.iter().map(|d| vec![date_cell(*d)]).collect(),
        )
        .unwrap();
        let joined = asof_join(&left, &weather_frame(&right_days), "date", "_weather").unwrap();

        for (row, day) in left_days.iter().enumerate() {
            let expected = day.and_then(|d| {
                right_days.iter().flatten().filter(|r| **r <= d).max().map(|r| timestamp(*r))
            });
            let matched = joined.timestamp(row, "date_weather");
            prop_assert_eq!(matched, expected);
        }
    }

    /// Property 3: Idempotent indexing
    #[test]
    fn test_index_by_time_idempotent(
        monitoring in prop::collection::vec((parcel_strategy(), day_strategy()), 0..30),
        weather in prop::collection::vec(day_strategy(), 0..20),
    ) {
        let data = dataset(&monitoring, &weather, &[]);
        let once = data.index_by_time().unwrap();
        let twice = once.index_by_time().unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.monitoring().is_sorted_by_timestamp("date"));
        prop_assert!(once.weather().is_sorted_by_timestamp("date"));
    }

    /// Property 4: Exact lines are recovered with r² = 1
    #[test]
    fn test_fit_recovers_exact_line(
        slope in -5.0f64..5.0,
        intercept in -50.0f64..50.0,
        start in 1990i32..2020,
        count in 2usize..10,
    ) {
        let xs: Vec<f64> = (0..count).map(|i| f64::from(start) + i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| intercept + slope * (x - f64::from(start))).collect();
        let trend = fit_linear(&xs, &ys).unwrap();
        prop_assert!((trend.slope - slope).abs() < 1e-6);
        prop_assert!((trend.r_squared - 1.0).abs() < 1e-6);
    }
}
