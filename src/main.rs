#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rfai_lib::run().await
}
