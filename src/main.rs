use clap::Parser;
use keyturn::cli::{Args, build_config, init_logging};
use keyturn::{build_state, init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(config) = build_config(&args) else {
        std::process::exit(1);
    };

    let state = build_state(&config);
    init_cleanup(&state.sessions);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().expect("Failed to get local address");
    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(state, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
