#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = coursework_rust::run().await {
        eprintln!("coursework-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
