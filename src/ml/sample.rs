//! Synthetic occupancy history for the placeholder model.
//!
//! One sample per day over the configured window. Occupancy follows a base
//! rate with weekend and seasonal boosts plus Gaussian noise, clamped to a
//! plausible band; stay duration and room rate are drawn from normal
//! distributions with hard floors.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::io::Write;
use std::path::Path;

use super::FEATURE_NAMES;

const BASE_OCCUPANCY: f64 = 0.6;
const WEEKEND_BOOST: f64 = 1.3;
const SEASONAL_BOOST: f64 = 1.2;
const HIGH_SEASON_MONTHS: [u32; 4] = [6, 7, 8, 12];
const OCCUPANCY_MIN: f64 = 0.10;
const OCCUPANCY_MAX: f64 = 0.95;

/// Daily samples with the feature layout from [`FEATURE_NAMES`].
#[derive(Debug, Clone)]
pub struct OccupancyDataset {
    pub dates: Vec<NaiveDate>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl OccupancyDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Write the dataset as CSV, one row per day.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut out = std::fs::File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;

        writeln!(out, "date,{},occupancy_rate", FEATURE_NAMES.join(","))?;
        for ((date, features), target) in self
            .dates
            .iter()
            .zip(self.features.iter())
            .zip(self.targets.iter())
        {
            let row: Vec<String> = features.iter().map(|f| format!("{f:.4}")).collect();
            writeln!(out, "{},{},{:.4}", date, row.join(","), target)?;
        }
        Ok(())
    }
}

/// Generate `history_days` + 1 daily samples ending at `end`, deterministic
/// for a given seed.
pub fn generate(history_days: u32, seed: u64, end: NaiveDate) -> OccupancyDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::<f64>::new(0.0, 0.1).expect("valid noise distribution");
    let stay = Normal::<f64>::new(2.5, 1.0).expect("valid stay distribution");
    let rate = Normal::<f64>::new(150.0, 50.0).expect("valid rate distribution");

    let samples = history_days as usize + 1;
    let mut dates = Vec::with_capacity(samples);
    let mut features = Vec::with_capacity(samples);
    let mut targets = Vec::with_capacity(samples);

    let start = end - Duration::days(history_days as i64);
    let mut date = start;
    while date <= end {
        let is_weekend = date.weekday().num_days_from_monday() >= 5;
        let weekend_boost = if is_weekend { WEEKEND_BOOST } else { 1.0 };
        let seasonal_boost = if HIGH_SEASON_MONTHS.contains(&date.month()) {
            SEASONAL_BOOST
        } else {
            1.0
        };

        let occupancy = (BASE_OCCUPANCY * weekend_boost * seasonal_boost
            + noise.sample(&mut rng))
        .clamp(OCCUPANCY_MIN, OCCUPANCY_MAX);

        let avg_stay = stay.sample(&mut rng).max(1.0);
        let avg_rate = rate.sample(&mut rng).max(50.0);

        dates.push(date);
        features.push(vec![
            date.weekday().num_days_from_monday() as f64,
            date.month() as f64,
            if is_weekend { 1.0 } else { 0.0 },
            avg_stay,
            avg_rate,
        ]);
        targets.push(occupancy);

        date += Duration::days(1);
    }

    OccupancyDataset {
        dates,
        features,
        targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn test_sample_count_covers_window_inclusive() {
        let dataset = generate(730, 42, end_date());
        assert_eq!(dataset.len(), 731);
        assert_eq!(dataset.features.len(), dataset.targets.len());
        assert_eq!(dataset.dates.len(), dataset.targets.len());
    }

    #[test]
    fn test_values_stay_in_plausible_bands() {
        let dataset = generate(365, 7, end_date());
        for target in &dataset.targets {
            assert!((OCCUPANCY_MIN..=OCCUPANCY_MAX).contains(target));
        }
        for row in &dataset.features {
            assert_eq!(row.len(), FEATURE_NAMES.len());
            assert!(row[3] >= 1.0, "stay duration below floor");
            assert!(row[4] >= 50.0, "room rate below floor");
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = generate(100, 42, end_date());
        let b = generate(100, 42, end_date());
        assert_eq!(a.targets, b.targets);
        assert_eq!(a.features, b.features);

        let c = generate(100, 43, end_date());
        assert_ne!(a.targets, c.targets);
    }

    #[test]
    fn test_weekend_flag_matches_calendar() {
        // 2024-06-30 is a Sunday, 2024-06-28 a Friday.
        let dataset = generate(2, 1, end_date());
        assert_eq!(dataset.features[0][2], 0.0);
        assert_eq!(dataset.features[2][2], 1.0);
    }

    #[test]
    fn test_csv_has_header_and_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_data.csv");
        let dataset = generate(10, 42, end_date());
        dataset.write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "date,day_of_week,month,is_weekend,avg_stay_duration,avg_room_rate,occupancy_rate"
        );
        assert_eq!(lines.count(), 11);
    }
}
