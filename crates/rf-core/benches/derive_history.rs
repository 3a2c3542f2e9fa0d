//! Criterion benchmarks for the derive and backfill hot paths in `rf-core`.
//!
//! Synthetic meetings of 12-runner fields, each runner racing every
//! meeting, to characterise scaling with snapshot size.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rf_common::{RaceId, RunnerKey};
use rf_config::EngineConfig;
use rf_core::{DerivedFeatureCalculator, NoopProgress, SectionalBackfiller};
use rf_telemetry::{columns, ColumnData, FeatureTable, Race, RaceResult, SectionalTelemetry};

const FIELD: usize = 12;
const GOINGS: [&str; 4] = ["Good 4", "Soft 6", "Heavy 8", "Firm 2"];

struct Synthetic {
    races: Vec<Race>,
    results: Vec<RaceResult>,
    sectionals: Vec<SectionalTelemetry>,
    table: FeatureTable,
}

fn make_snapshot(meetings: usize) -> Synthetic {
    let base = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default();
    let mut races = Vec::with_capacity(meetings);
    let mut results = Vec::with_capacity(meetings * FIELD);
    let mut sectionals = Vec::with_capacity(meetings * FIELD);
    let mut table = FeatureTable::new();
    let mut at_800 = Vec::with_capacity(meetings * FIELD);

    for m in 0..meetings {
        let race_id = format!("race-{:05}", m);
        let date = base + chrono::Duration::days((m * 7) as i64);
        let mut race = Race::new(race_id.clone());
        race.race_date = Some(date);
        race.track_name = Some("Flemington".into());
        race.race_distance = Some(1600);
        race.track_condition = Some(GOINGS[m % GOINGS.len()].into());
        races.push(race);

        for h in 0..FIELD {
            let name = format!("Runner {}", h);
            let finish = ((h + m) % FIELD + 1) as u32;
            let mid = ((h * 5 + m) % FIELD + 1) as u32;
            let mut result = RaceResult::new(race_id.clone(), name.clone());
            result.horse_slug = Some(format!("runner-{}", h));
            result.final_position = Some(finish);
            results.push(result);
            sectionals.push(
                SectionalTelemetry::new(race_id.clone(), name)
                    .with_position(800, mid)
                    .with_position(1200, finish.max(1)),
            );
            let _ = table.push_row(
                RaceId::from(race_id.as_str()),
                RunnerKey::from(format!("runner-{}_AU", h).as_str()),
                Some(date),
            );
            at_800.push(Some(i64::from(mid)));
        }
    }
    let _ = table.add_column(columns::POSITION_800M, ColumnData::Int(at_800));
    Synthetic {
        races,
        results,
        sectionals,
        table,
    }
}

fn bench_derive(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive/history");
    let calculator = DerivedFeatureCalculator::default();

    for meetings in [50, 200, 800] {
        let data = make_snapshot(meetings);
        group.bench_with_input(
            BenchmarkId::new("meetings", meetings),
            &data,
            |b, data| {
                b.iter(|| {
                    let mut table = data.table.clone();
                    let report = calculator
                        .run(black_box(&data.races), black_box(&data.results), &mut table, &NoopProgress);
                    black_box(report.map(|r| r.rows).unwrap_or(0));
                })
            },
        );
    }
    group.finish();
}

fn bench_backfill(c: &mut Criterion) {
    let mut group = c.benchmark_group("backfill/both_targets");
    let Ok(backfiller) = SectionalBackfiller::from_config(&EngineConfig::default()) else {
        return;
    };

    for meetings in [50, 200, 800] {
        let data = make_snapshot(meetings);
        group.bench_with_input(
            BenchmarkId::new("meetings", meetings),
            &data,
            |b, data| {
                b.iter(|| {
                    let mut results = data.results.clone();
                    let report = backfiller.run(
                        black_box(&data.races),
                        black_box(&data.sectionals),
                        &mut results,
                        &NoopProgress,
                    );
                    black_box(report.map(|r| r.written()).unwrap_or(0));
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_derive, bench_backfill);
criterion_main!(benches);
