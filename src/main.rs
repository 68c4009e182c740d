#[tokio::main]
async fn main() {
    if let Err(err) = opsbot::app::run().await {
        eprintln!("opsbot: {}", err);
        if let Some(hint) = err.hint.as_deref() {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
