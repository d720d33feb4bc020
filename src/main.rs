use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::motor::gpio::SimulatedBackend;

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Bench backend: pin writes land in memory. A robot build implements
    // GpioBackend over the Pi's GPIO character device and passes it here.
    let backend = Box::new(SimulatedBackend::new());

    if let Err(e) = mecanum_zenoh_runtime::runtime::run(backend).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
