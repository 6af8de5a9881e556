/**
 * Discovery Example (Async Stream)
 *
 * This example demonstrates how to find TRADFRI gateways on the local network
 * via mDNS, printing each gateway as soon as it answers.
 */
use futures_util::StreamExt;
use rustfri::Scanner;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("--- Rustfri - Gateway Discovery ---");

    // 1. Widen the default 1s window a little for slow networks
    let scanner = Scanner::new().with_timeout(Duration::from_secs(3));

    // 2. Get a stream of discovery results
    let stream = scanner.stream();
    tokio::pin!(stream);

    let mut count = 0;

    // 3. Process gateways as they are discovered
    while let Some(result) = stream.next().await {
        match result {
            Ok(gateway) => {
                count += 1;
                println!(
                    "[{}] Found Gateway: Host={}, Address={}",
                    count, gateway.host, gateway.address
                );
            }
            Err(e) => {
                eprintln!("[ERROR] Discovery failed: {}", e);
                return;
            }
        }
    }

    println!("[INFO] Scan finished. Total gateways found: {count}");
}
