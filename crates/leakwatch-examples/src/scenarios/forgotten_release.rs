use crate::Config;
use leakwatch::Subscription;

struct PriceFeed {
    _subscription: Subscription,
}

fn open_feed(engine: &leakwatch::Engine, symbol: &'static str) -> Result<PriceFeed, String> {
    let subscription = engine
        .subscribe(move || println!("feed.{symbol}: unsubscribed"))
        .map_err(|e| e.to_string())?;
    println!("feed.{symbol}: subscribed as {}", subscription.id());
    Ok(PriceFeed {
        _subscription: subscription,
    })
}

pub async fn run(cfg: &Config) -> Result<(), String> {
    let engine = cfg
        .engine_builder()
        .on_leak(|leak| {
            println!("leak detected: {leak}");
            if let Some(stack) = leak.stack() {
                println!("{stack}");
            }
        })
        .build()
        .map_err(|e| e.to_string())?;

    let feed = open_feed(&engine, "ACME")?;
    println!("dropping feed.ACME without releasing it; this should be reported as a leak");
    drop(feed);

    super::report(&engine, cfg.settle, 1).await
}
