//! Binary entrypoint for the rebloom tool

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rebloom::cli::run().await
}
