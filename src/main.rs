#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mods_catalog::run().await
}
