use vozcivica::cli;

#[tokio::main]
async fn main() {
    if cli::Cli::run().await.is_err() {
        std::process::exit(1);
    }
}
