use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use tracing_subscriber::EnvFilter;

use rust_mlfn::{CancellationToken, Domain, LearnConfig, MlfnBuilder, Network, TrainingSet};

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Task: learn y = 0.5 + 0.4 sin(2 x0) x1 with one hidden layer.
    // Hidden weights are annealed; output weights are regressed for every trial.
    let mut rng = StdRng::seed_from_u64(1);
    let dist = Uniform::new(-1.0_f64, 1.0);

    let mut inputs = Vec::with_capacity(128);
    let mut targets = Vec::with_capacity(128);
    for _ in 0..128 {
        let x0 = dist.sample(&mut rng);
        let x1 = dist.sample(&mut rng);
        inputs.push(vec![x0, x1]);
        targets.push(vec![0.5 + 0.4 * (2.0 * x0).sin() * x1]);
    }
    let train = TrainingSet::from_rows(&inputs, &targets).unwrap();

    let mut mlfn = MlfnBuilder::new(Domain::Real, 2, 1)
        .unwrap()
        .hidden(6)
        .unwrap()
        .build_with_seed(0)
        .unwrap();

    let cfg = LearnConfig {
        pretries: 2,
        ..LearnConfig::default()
    };
    let report = mlfn
        .learn(&train, &cfg, &mut rng, &CancellationToken::new())
        .unwrap();

    let mut out = [0.0];
    mlfn.trial(&[0.5, 0.5], &mut out).unwrap();
    println!(
        "error={:.6} evaluations={} temperatures={} f(0.5, 0.5)={:.4} (true {:.4})",
        report.error,
        report.evaluations,
        report.temperatures,
        out[0],
        0.5 + 0.4 * 1.0f64.sin() * 0.5
    );
}
