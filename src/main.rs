use tracing::error;
use trade_data_lib::config::Config;

#[tokio::main]
async fn main() {
    trade_data_lib::init_tracing();

    let result = match Config::from_env() {
        Ok(config) => trade_data_lib::run(&config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
