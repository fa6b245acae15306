#[tokio::main]
async fn main() -> anyhow::Result<()> {
    meetscribe_host_lib::run().await
}
