#[tokio::main]
async fn main() {
    reading_content::init_tracing();

    if let Err(err) = reading_content::run().await {
        tracing::error!(error = %err, "reading-content exited");
        std::process::exit(1);
    }
}
