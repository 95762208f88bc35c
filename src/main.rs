use bucketdesk_lib::run_cli;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run_cli().await {
        if e.is_stopped() {
            eprintln!("stopped");
            std::process::exit(130);
        }
        eprintln!("failed: {}", e);
        std::process::exit(1);
    }
}
