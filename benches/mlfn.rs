use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rust_mlfn::dotprod::dotprodc;
use rust_mlfn::{Domain, MlfnBuilder, SvdSolver, TrainingSet};

fn dotprodc_bench(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let n = 256;
    let a: Vec<f64> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let b: Vec<f64> = (0..2 * n).map(|_| rng.gen_range(-1.0..1.0)).collect();

    c.bench_function("dotprodc_256", |bench| {
        bench.iter(|| black_box(dotprodc(n, black_box(&a), black_box(&b))))
    });
}

fn svd_decompose_bench(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let (rows, cols) = (200, 20);
    let a: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut solver = SvdSolver::new(rows, cols, false);

    c.bench_function("svd_decompose_200x20", |bench| {
        bench.iter(|| {
            solver.a_mut().copy_from_slice(&a);
            solver.decompose().unwrap();
            black_box(solver.singular_values());
        })
    });
}

fn regress_bench(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let xs: Vec<Vec<f64>> = (0..200)
        .map(|_| (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let ys: Vec<Vec<f64>> = xs
        .iter()
        .map(|x| vec![0.5 + 0.3 * x[0] * x[1], 0.5 - 0.2 * x[2]])
        .collect();
    let train = TrainingSet::from_rows(&xs, &ys).unwrap();

    let mut mlfn = MlfnBuilder::new(Domain::Real, 8, 2)
        .unwrap()
        .hidden(16)
        .unwrap()
        .build_with_seed(0)
        .unwrap();
    let mut solver = mlfn.regression_solver(&train);

    c.bench_function("regress_200x8_16_2", |bench| {
        bench.iter(|| black_box(mlfn.regress(&train, &mut solver).unwrap()))
    });
}

criterion_group!(benches, dotprodc_bench, svd_decompose_bench, regress_bench);
criterion_main!(benches);
