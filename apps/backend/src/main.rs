#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pet_reader_backend::run().await
}
