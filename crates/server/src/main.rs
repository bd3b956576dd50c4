use artidash_server::{logging, Config};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(&config.log);
    artidash_server::run(config).await
}
