#[tokio::main]
async fn main() {
    bookquiz::start_server().await;
}
