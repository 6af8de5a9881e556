/**
 * Inventory Example
 *
 * This example demonstrates how to connect with a provisioned identity and
 * list the gateway, its devices, groups and scenes.
 *
 * Usage: cargo run --example list_devices -- <address> <identity> <psk>
 */
use rustfri::{Client, TradfriError};

async fn run(address: &str, identity: &str, psk: &str) -> Result<(), TradfriError> {
    let client = Client::connect(address, identity, psk).await?;

    let gateway = client.gateway_info().await?;
    println!("[GATEWAY] id={} firmware={}", gateway.id, gateway.firmware);

    for id in client.list_device_ids().await? {
        let device = client.device(id).await?;
        println!(
            "[DEVICE] {} '{}' type={:?} model='{}' alive={}",
            device.id,
            device.name,
            device.device_type,
            device.metadata.model,
            device.is_alive()
        );
    }

    for group_id in client.list_group_ids().await? {
        let group = client.group(group_id).await?;
        println!("[GROUP] {} '{}'", group.id, group.name);
        for scene_id in client.list_scene_ids(group_id).await? {
            let scene = client.scene(group_id, scene_id).await?;
            println!("    [SCENE] {} '{}'", scene.id, scene.name);
        }
    }

    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 3 {
        eprintln!("Usage: list_devices <address> <identity> <psk>");
        return;
    }

    println!("--- Rustfri - Inventory ---");
    if let Err(e) = run(&args[0], &args[1], &args[2]).await {
        eprintln!("[ERROR] {}", e);
    }
}
