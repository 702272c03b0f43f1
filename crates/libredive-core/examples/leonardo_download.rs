//! Leonardo Download Tool
//!
//! A standalone tool to download and inspect the dive log of a serial
//! Cressi Leonardo family device.
//!
//! Usage:
//!   cargo run --example leonardo_download -- [OPTIONS] [PORT]
//!
//! Options:
//!   --port PORT          Serial port (default: /dev/ttyUSB0)
//!   --fingerprint HEX    Only download dives newer than this fingerprint
//!   --quiet              Suppress progress output

use libredive_core::device::{Device, DeviceEvent, LeonardoDevice};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut port_name = "/dev/ttyUSB0".to_string();
    let mut fingerprint: Vec<u8> = Vec::new();
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--fingerprint" | "-f" => {
                i += 1;
                if i < args.len() {
                    fingerprint = parse_hex(&args[i]);
                }
            }
            "--quiet" | "-q" => {
                quiet = true;
            }
            other => {
                port_name = other.to_string();
            }
        }
        i += 1;
    }

    println!("Opening {}...", port_name);
    let mut device = match LeonardoDevice::open(&port_name) {
        Ok(device) => device,
        Err(e) => {
            eprintln!("Failed to open {}: {}", port_name, e);
            std::process::exit(1);
        }
    };

    if !fingerprint.is_empty() {
        if let Err(e) = device.set_fingerprint(&fingerprint) {
            eprintln!("Bad fingerprint: {}", e);
            std::process::exit(1);
        }
    }

    if !quiet {
        device.set_event_handler(Some(Box::new(|event| match event {
            DeviceEvent::Progress { current, maximum } => {
                eprintln!("progress: {}/{}", current, maximum);
            }
            DeviceEvent::DeviceInfo {
                model,
                firmware,
                serial,
            } => {
                println!("model {} firmware {} serial {}", model, firmware, serial);
            }
            DeviceEvent::Clock { systime, devtime } => {
                println!("clock: host {} device {}", systime, devtime);
            }
            DeviceEvent::Warning { message } => {
                eprintln!("warning: {}", message);
            }
        })));
    }

    let mut ndives = 0;
    let result = device.foreach(&mut |dive| {
        ndives += 1;
        println!(
            "dive {}: {} bytes, fingerprint {}",
            ndives,
            dive.data.len(),
            format_hex(dive.fingerprint)
        );
        true
    });

    match result {
        Ok(()) => println!("Downloaded {} dive(s).", ndives),
        Err(e) => {
            eprintln!("Download failed after {} dive(s): {}", ndives, e);
            std::process::exit(1);
        }
    }
}

fn parse_hex(s: &str) -> Vec<u8> {
    let digits: Vec<u8> = s
        .bytes()
        .filter(|b| b.is_ascii_hexdigit())
        .collect();
    digits
        .chunks(2)
        .filter(|pair| pair.len() == 2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16).unwrap_or(0) as u8;
            let lo = (pair[1] as char).to_digit(16).unwrap_or(0) as u8;
            (hi << 4) | lo
        })
        .collect()
}

fn format_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}
