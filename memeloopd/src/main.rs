#[tokio::main]
async fn main() {
    memeloopd::init_tracing();
    if let Err(err) = memeloopd::run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
