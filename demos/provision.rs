/**
 * Provisioning Example
 *
 * This example demonstrates how to trade the security code printed on the
 * bottom of the gateway for a pre-shared key bound to your own identity.
 *
 * Usage: cargo run --example provision -- <address> <identity> <security-code>
 */
use rustfri::provision;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 {
        eprintln!("Usage: provision <address> <identity> <security-code>");
        return;
    }
    let (address, identity, code) = (&args[0], &args[1], &args[2]);

    println!("--- Rustfri - Provisioning ---");
    println!("[INFO] Registering identity '{}' at {}...", identity, address);

    match provision(address, identity, code).await {
        Ok(key) => {
            println!("[SUCCESS] Pre-shared key: {}", String::from_utf8_lossy(&key));
            println!("[INFO] Store it; the security code is not needed again.");
        }
        Err(e) => eprintln!("[ERROR] Provisioning failed: {}", e),
    }
}
