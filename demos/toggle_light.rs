/**
 * Light Control Example
 *
 * This example demonstrates partial device updates: only the attributes that
 * are set are sent, so turning a bulb on does not touch its color.
 *
 * Usage: cargo run --example toggle_light -- <address> <identity> <psk> <device-id>
 */
use rustfri::{ClientBuilder, DeviceSettings, LightSettings};
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() != 4 {
        eprintln!("Usage: toggle_light <address> <identity> <psk> <device-id>");
        return;
    }
    let Ok(device_id) = args[3].parse::<u32>() else {
        eprintln!("[ERROR] Device id must be a number, e.g. 65537");
        return;
    };

    println!("--- Rustfri - Light Control ---");

    // 1. Connect with a slightly more patient response timeout
    let client = match ClientBuilder::new(&args[0], &args[1], args[2].as_bytes())
        .connect_timeout(Duration::from_secs(10))
        .response_timeout(Duration::from_secs(1))
        .connect()
        .await
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[ERROR] Connect failed: {}", e);
            return;
        }
    };

    // 2. Read the current power state
    let device = match client.device(device_id).await {
        Ok(d) => d,
        Err(e) => {
            eprintln!("[ERROR] Reading device {} failed: {}", device_id, e);
            return;
        }
    };
    let Some(light) = device.light_settings.first() else {
        eprintln!("[ERROR] '{}' is not a light", device.name);
        return;
    };
    let is_on = light.power == Some(1);
    println!("[INFO] '{}' is currently {}", device.name, if is_on { "on" } else { "off" });

    // 3. Flip it with a one second fade
    let settings = DeviceSettings::light(LightSettings::new().power(!is_on).duration(10));
    match client.update_device(device_id, &settings).await {
        Ok(()) => println!("[SUCCESS] Toggled '{}'", device.name),
        Err(e) => eprintln!("[ERROR] Update failed: {}", e),
    }

    client.close().await;
}
