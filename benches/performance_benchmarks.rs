use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use formcast::models::{HrZoneDistribution, PlannedLoad, WeeklyMetrics};
use formcast::prediction::{FormPredictionRequest, TrainingState};
use formcast::{LoadSimulator, PhaseDetector, Predictor, TaperPlanner, TaperStrategy, ZoneClassifier};

/// Performance benchmarks for the training-load engine
///
/// These benchmarks exercise the core computations with varying history
/// lengths to check that they scale linearly.

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn create_tss_series(days: usize) -> Vec<f64> {
    (0..days).map(|i| 40.0 + ((i * 37) % 90) as f64).collect()
}

fn create_weekly_dataset(weeks: usize) -> Vec<WeeklyMetrics> {
    (0..weeks)
        .map(|i| {
            let cycle = (i % 8) as f64;
            WeeklyMetrics {
                week_start: start_date() + Duration::weeks(i as i64),
                total_distance: 150_000.0,
                total_duration_seconds: 30_000.0 + cycle * 1_800.0,
                total_elevation: 1_200.0,
                activity_count: 6,
                total_tss: 350.0 + cycle * 20.0,
                avg_tss: 60.0,
                avg_fitness: 50.0 + cycle,
                avg_fatigue: 55.0 + cycle,
                avg_form: -5.0,
                hr_zones: Some(HrZoneDistribution::new([45.0, 30.0, 15.0, 7.0, 3.0])),
                activity_ids: Vec::new(),
            }
        })
        .collect()
}

fn bench_simulation(c: &mut Criterion) {
    let simulator = LoadSimulator::new();
    let classifier = ZoneClassifier::new();
    let mut group = c.benchmark_group("Load Simulation");

    for &days in &[30, 365, 3650] {
        let tss = create_tss_series(days);

        group.throughput(Throughput::Elements(days as u64));
        group.bench_with_input(BenchmarkId::new("simulate", days), &tss, |b, tss| {
            b.iter(|| simulator.simulate(black_box(45.0), black_box(50.0), start_date(), tss));
        });
        group.bench_with_input(BenchmarkId::new("simulate_and_annotate", days), &tss, |b, tss| {
            b.iter(|| classifier.annotate(&simulator.simulate(45.0, 50.0, start_date(), tss)));
        });
    }

    group.finish();
}

fn bench_phase_detection(c: &mut Criterion) {
    let detector = PhaseDetector::new();
    let mut group = c.benchmark_group("Phase Detection");

    for &weeks in &[12, 52, 260] {
        let metrics = create_weekly_dataset(weeks);

        group.throughput(Throughput::Elements(weeks as u64));
        group.bench_with_input(BenchmarkId::new("detect_phases", weeks), &metrics, |b, metrics| {
            b.iter(|| detector.detect_phases(black_box(metrics), &[]));
        });
    }

    group.finish();
}

fn bench_forecasting(c: &mut Criterion) {
    let predictor = Predictor::new();
    let planner = TaperPlanner::new();
    let current = TrainingState::new(70.0, 85.0);
    let mut group = c.benchmark_group("Forecasting");

    group.bench_function("predict_future_form_60d", |b| {
        let request = FormPredictionRequest {
            target_date: start_date() + Duration::days(60),
            planned_load: PlannedLoad::Daily(create_tss_series(60)),
            recovery_days: vec![6, 13, 20, 27],
            current,
            as_of: Some(start_date()),
        };
        b.iter(|| predictor.predict_future_form(black_box(&request)));
    });

    group.bench_function("estimate_recovery_rest", |b| {
        b.iter(|| predictor.estimate_recovery_time(black_box(current), formcast::FormZone::OptimalRace, true));
    });

    let request = formcast::TaperRequest {
        strategy: TaperStrategy::Exponential,
        ..planner.request(start_date() + Duration::days(30), current)
    };
    group.bench_function("generate_taper_plan", |b| {
        b.iter(|| planner.generate_taper_plan(black_box(&request)));
    });
    group.bench_function("compare_strategies", |b| {
        b.iter(|| planner.compare_strategies(black_box(&request)));
    });

    group.finish();
}

criterion_group!(benches, bench_simulation, bench_phase_detection, bench_forecasting);
criterion_main!(benches);
