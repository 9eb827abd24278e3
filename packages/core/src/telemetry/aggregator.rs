//! Mileage Aggregator
//!
//! Turns an unordered list of odometer/speed samples for one vehicle into a
//! day-by-day mileage table and a period roll-up. Pure and synchronous: the
//! same input always yields the same report.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use chrono::NaiveDate;

use crate::telemetry::{
    config::AggregatorConfig,
    types::{
        round2, DailyMileage, DayAccumulator, MileageReport, MovementStatus, PeriodTotals, Sample,
    },
};

/// Aggregates samples over the inclusive calendar range `[start, end]`.
///
/// Malformed samples are dropped, never reported as errors. A reversed range
/// produces an empty day sequence.
pub fn aggregate(
    samples: &[Sample],
    start: NaiveDate,
    end: NaiveDate,
    efficiency_km_per_liter: f64,
    config: &AggregatorConfig,
) -> MileageReport {
    let mut buckets = seed_buckets(start, end);

    let mut usable: Vec<(&str, f64, Option<f64>, NaiveDate)> = samples
        .iter()
        .filter_map(|sample| {
            let timestamp = sample.timestamp.as_deref()?;
            let odometer = sample.odometer.filter(|value| value.is_finite())?;
            let date = sample.date()?;
            Some((timestamp, odometer, sample.speed, date))
        })
        .collect();

    // sort_by is stable, ties keep input order
    usable.sort_by(|a, b| a.0.cmp(b.0));

    let mut previous_odometer: Option<f64> = None;
    for (_, odometer, speed, date) in usable {
        let accepted_delta = previous_odometer
            .filter(|previous| odometer >= *previous)
            .map(|previous| (odometer - previous) / 1000.0)
            .filter(|delta_km| *delta_km > 0.0 && *delta_km < config.max_delta_km);

        // The baseline advances even when the delta is rejected.
        previous_odometer = Some(odometer);

        // Samples outside the requested range only move the baseline.
        let Some(day) = buckets.get_mut(&date) else {
            continue;
        };

        if let Some(delta_km) = accepted_delta {
            day.distance_km += delta_km;
        }

        if let Some(speed) = speed.filter(|s| s.is_finite() && *s > config.min_speed) {
            day.speed_sum += speed;
            day.speed_sample_count += 1;
        }
    }

    build_report(start, end, &buckets, efficiency_km_per_liter)
}

fn seed_buckets(start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, DayAccumulator> {
    start
        .iter_days()
        .take_while(|date| *date <= end)
        .map(|date| (date, DayAccumulator::default()))
        .collect()
}

fn build_report(
    start: NaiveDate,
    end: NaiveDate,
    buckets: &BTreeMap<NaiveDate, DayAccumulator>,
    efficiency_km_per_liter: f64,
) -> MileageReport {
    let days: Vec<DailyMileage> = buckets
        .iter()
        .map(|(date, day)| DailyMileage {
            date: *date,
            distance_km: day.distance_km,
            fuel_used: fuel_for_distance(day.distance_km, efficiency_km_per_liter),
            avg_speed: day.average_speed().unwrap_or(0.0),
        })
        .collect();

    let total_distance_km: f64 = days.iter().map(|d| d.distance_km).sum();
    let total_fuel: f64 = days.iter().map(|d| d.fuel_used).sum();

    let day_averages: Vec<f64> = buckets.values().filter_map(|d| d.average_speed()).collect();
    let avg_speed = if day_averages.is_empty() {
        0.0
    } else {
        day_averages.iter().sum::<f64>() / day_averages.len() as f64
    };

    let status = if total_distance_km <= 0.0 {
        MovementStatus::NotMoving
    } else if day_averages.is_empty() {
        MovementStatus::MovingNoSpeedData
    } else {
        MovementStatus::Ok
    };

    MileageReport {
        start,
        end,
        days,
        totals: PeriodTotals {
            total_distance_km,
            total_fuel: round2(total_fuel),
            avg_speed,
            status,
        },
    }
}

/// Liters needed for `distance_km`, rounded to two decimals.
pub fn fuel_for_distance(distance_km: f64, efficiency_km_per_liter: f64) -> f64 {
    if efficiency_km_per_liter > 0.0 && efficiency_km_per_liter.is_finite() {
        round2(distance_km / efficiency_km_per_liter)
    } else {
        0.0
    }
}

/// One stored reading as seen by [`per_record_fuel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordReading {
    pub odometer: Option<f64>,
    pub engine_on: Option<bool>,
    pub efficiency_km_per_liter: f64,
}

/// Fuel burned between consecutive records, in the order given.
///
/// A record is charged only when the previous record had an odometer, its own
/// odometer is present and the engine is on. Decreasing odometers count as
/// zero distance. The baseline always becomes this record's odometer, even
/// when that is absent.
pub fn per_record_fuel(readings: &[RecordReading]) -> Vec<f64> {
    let mut previous: Option<f64> = None;
    readings
        .iter()
        .map(|reading| {
            let fuel = fuel_since(previous, reading);
            previous = reading.odometer;
            fuel
        })
        .collect()
}

/// [`per_record_fuel`] with one baseline per vehicle, so rows of different
/// vehicles interleaved in one listing are never compared with each other.
pub fn per_vehicle_record_fuel<K: Eq + Hash>(readings: &[(K, RecordReading)]) -> Vec<f64> {
    let mut previous: HashMap<&K, Option<f64>> = HashMap::new();
    readings
        .iter()
        .map(|(vehicle, reading)| {
            let fuel = fuel_since(previous.get(vehicle).copied().flatten(), reading);
            previous.insert(vehicle, reading.odometer);
            fuel
        })
        .collect()
}

fn fuel_since(previous: Option<f64>, reading: &RecordReading) -> f64 {
    match (previous, reading.odometer, reading.engine_on) {
        (Some(prev), Some(current), Some(true)) => {
            let delta_km = (current - prev).max(0.0) / 1000.0;
            fuel_for_distance(delta_km, reading.efficiency_km_per_liter)
        }
        _ => 0.0,
    }
}
