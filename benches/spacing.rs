use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use dicom_qa::instance::check_instances;
use dicom_qa::spacing::{is_evenly_spaced, validate_spacing};
use dicom_qa::test_support::write_dicom;
use rand::seq::SliceRandom;
use tempfile::{tempdir, TempDir};

const SLICE_THICKNESS: f64 = 1.25;

fn setup_series(num_slices: usize) -> TempDir {
    let temp_dir = tempdir().unwrap();
    for i in 0..num_slices {
        write_dicom(
            temp_dir.path().join(format!("IM{:04}.dcm", i)),
            Some(i as i32 + 1),
            Some(i as f64 * SLICE_THICKNESS),
        );
    }
    temp_dir
}

fn bench_locations(c: &mut Criterion) {
    let mut group = c.benchmark_group("is-evenly-spaced");
    for num_slices in [64, 512, 4096] {
        let mut locations: Vec<f64> = (0..num_slices)
            .map(|i| i as f64 * SLICE_THICKNESS)
            .collect();
        locations.shuffle(&mut rand::thread_rng());
        group
            .throughput(Throughput::Elements(num_slices as u64))
            .bench_with_input(
                BenchmarkId::from_parameter(num_slices),
                &locations,
                |b, input| b.iter(|| is_evenly_spaced(black_box(input))),
            );
    }
    group.finish();
}

fn bench_folders(c: &mut Criterion) {
    let mut group = c.benchmark_group("folder-checks");
    let num_slices = 200;
    let series = setup_series(num_slices);
    group
        .sample_size(20)
        .throughput(Throughput::Elements(num_slices as u64));
    group.bench_function(BenchmarkId::new("validate_spacing", num_slices), |b| {
        b.iter(|| validate_spacing(black_box(series.path())).unwrap())
    });
    group.bench_function(BenchmarkId::new("check_instances", num_slices), |b| {
        b.iter(|| check_instances(black_box(series.path())).unwrap())
    });
    group.finish();
}

fn main() {
    let mut c = Criterion::default().configure_from_args();
    bench_locations(&mut c);
    bench_folders(&mut c);
}
