use crate::Config;

pub async fn run(cfg: &Config) -> Result<(), String> {
    let engine = cfg.engine_builder().build().map_err(|e| e.to_string())?;

    let subscription = engine
        .subscribe(|| println!("demo.session: unsubscribed"))
        .map_err(|e| e.to_string())?;
    println!("demo.session: subscribed as {}", subscription.id());

    subscription.release();
    drop(subscription);
    println!("released before dropping; no leak should be reported");

    tokio::time::sleep(cfg.settle).await;
    super::report(&engine, cfg.settle, 0).await
}
