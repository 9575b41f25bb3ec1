#[tokio::main]
async fn main() {
    if let Err(e) = vision_relay_lib::cli::run().await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
