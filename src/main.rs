#[tokio::main]
async fn main() {
    if let Err(err) = ads_mcp::mcp::server::run_stdio().await {
        match &err.hint {
            Some(hint) => eprintln!("ads-mcp: {} ({})", err, hint),
            None => eprintln!("ads-mcp: {}", err),
        }
        std::process::exit(1);
    }
}
