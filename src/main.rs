use anyhow::{Context, Result, bail};
use nalgebra::Vector3;
use tracing_subscriber::EnvFilter;

use rust_phystrack::config::TrackingConfig;
use rust_phystrack::io::{CloudSequence, FileInitializationService, SyntheticObserver};
use rust_phystrack::simulation::CapsuleRope;
use rust_phystrack::tracking::{
    AllVisible, FixedMask, IterationResult, ObjectInitMsg, PhysicsTracker, VisibilityOracle,
    create_object_from_service, to_tracked_object, to_tracked_object_message,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Usage: phystrack [frames_dir init.yaml [config.yaml]]
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => run_synthetic_rope(),
        [frames_dir, init, rest @ ..] => run_replay(frames_dir, init, rest.first()),
        [_] => bail!("usage: phystrack [frames_dir init.yaml [config.yaml]]"),
    }
}

/// Track a recorded sequence of CSV clouds.
fn run_replay(frames_dir: &str, init_path: &str, config_path: Option<&String>) -> Result<()> {
    let config = match config_path {
        Some(path) => TrackingConfig::from_yaml_file(path)?,
        None => TrackingConfig::default(),
    };

    println!("Loading cloud frames from: {}", frames_dir);
    let sequence = CloudSequence::new(frames_dir)?;
    if sequence.is_empty() {
        bail!("no *.csv frames in {}", frames_dir);
    }
    println!("Loaded {} frames", sequence.len());

    let first = sequence.frame(0)?;
    let mut service = FileInitializationService::new(init_path);
    let object =
        create_object_from_service(&mut service, &first.cloud, &config.factory, &config.physics)
            .context("Object initialization failed")?;
    println!(
        "Tracking {} with {} points",
        object.object_type(),
        object.num_points()
    );

    let mut tracker = PhysicsTracker::new(object, AllVisible, config.tracker.clone())?;
    for frame in sequence.frames() {
        let frame = frame?;
        let result = tracker.track_frame(frame.cloud)?;
        print_frame(&frame.name, &result);
    }

    match to_tracked_object_message(tracker.object()) {
        Ok(msg) => println!("Final state:\n{}", serde_yaml::to_string(&msg)?),
        Err(e) => println!("Final state not published: {}", e),
    }
    Ok(())
}

/// Track a simulated rope dropping onto the ground, with the first quarter
/// of the rope hidden from the sensor.
fn run_synthetic_rope() -> Result<()> {
    let config = TrackingConfig::default();
    let n = 20;
    let nodes: Vec<Vector3<f64>> = (0..n)
        .map(|i| Vector3::new(0.05 * i as f64, 0.0, 0.3 + 0.01 * (i as f64 * 0.5).sin()))
        .collect();

    let mut truth = CapsuleRope::new(&nodes, 0.01, config.factory.rope_density, config.physics.clone());
    let object = to_tracked_object(
        &ObjectInitMsg::rope(&nodes, 0.01),
        &config.factory,
        &config.physics,
    )?;

    let visibility = FixedMask::hiding(n, 0..n / 4);
    let mut observer = SyntheticObserver::new(42, 0.005, 10)?.with_outliers(
        5,
        Vector3::new(-0.5, -0.5, 0.0),
        Vector3::new(1.5, 0.5, 0.5),
    );
    let mut tracker = PhysicsTracker::new(object, visibility, config.tracker.clone())?;

    println!("Synthetic rope: {} nodes, {} hidden", n, n / 4);
    for frame in 0..60 {
        truth.step(config.tracker.physics_dt);
        let truth_nodes = truth.nodes();
        let mask = tracker.visibility().visible(&truth_nodes);
        let cloud = observer.observe(&truth_nodes, &mask)?;

        let result = tracker.track_frame(cloud)?;
        if frame % 10 == 0 {
            let estimate = tracker.estimated_points();
            let rms = (estimate
                .positions
                .iter()
                .zip(&truth_nodes)
                .map(|(e, t)| (e - t).norm_squared())
                .sum::<f64>()
                / n as f64)
                .sqrt();
            print_frame(&format!("{:03}", frame), &result);
            println!("  rms error to truth: {:.4} m", rms);
        }
    }
    Ok(())
}

fn print_frame(name: &str, result: &IterationResult) {
    println!(
        "Frame {}: {:?} after {} iters, disp={:.5}m, obs={}, visible={}, outliers={}, {:.2}ms",
        name,
        result.state,
        result.iteration,
        result.mean_displacement,
        result.metrics.n_observed,
        result.metrics.n_visible,
        result.metrics.n_outliers,
        result.timing.total_ms
    );
}
