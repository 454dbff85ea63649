#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = coursework_rust::run_worker().await {
        eprintln!("coursework-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
