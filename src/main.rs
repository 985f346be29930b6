use tokio_util::sync::CancellationToken;

mod api;
mod config;
mod handler;

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("image_bus", log::LevelFilter::Debug)
        .filter_module("lite_convert", log::LevelFilter::Debug)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> ! {
    init_logging();
    let config = config::config();

    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    let server = api::start_api_server(config, cancel_clone);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            },
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
            },
        }
    }

    let clean = api::wait_for_server(server).await;
    std::process::exit(if clean { 0 } else { 1 });
}
