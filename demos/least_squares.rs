use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

use rust_mlfn::SvdSolver;

fn main() {
    // Task: fit y = 1 - 2x + 0.5x^2 from noisy samples with the SVD solver directly.
    let mut rng = StdRng::seed_from_u64(1);
    let xs = Uniform::new(-2.0_f64, 2.0);
    let noise = Uniform::new(-0.05_f64, 0.05);

    let rows = 64;
    let cols = 4; // 1, x, x^2, x^3
    let mut solver = SvdSolver::try_new(rows, cols, false).unwrap();

    let mut targets = Vec::with_capacity(rows);
    for row in solver.a_mut().chunks_exact_mut(cols) {
        let x = xs.sample(&mut rng);
        row.copy_from_slice(&[1.0, x, x * x, x * x * x]);
        targets.push(1.0 - 2.0 * x + 0.5 * x * x + noise.sample(&mut rng));
    }
    solver.decompose().unwrap();
    solver.b_mut().copy_from_slice(&targets);

    let mut coefs = [0.0; 4];
    solver.backsub(1e-8, &mut coefs).unwrap();
    println!(
        "c0={:.4} c1={:.4} c2={:.4} c3={:.4}",
        coefs[0], coefs[1], coefs[2], coefs[3]
    );
}
