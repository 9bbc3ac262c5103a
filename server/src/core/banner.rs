//! Startup banner

use std::time::Duration;

use super::config::is_all_interfaces;
use super::constants::APP_NAME;

/// Label column width
const W: usize = 10;

pub struct BannerInfo<'a> {
    pub host: &'a str,
    pub port: u16,
    pub dd_site: &'a str,
    pub has_credentials: bool,
    /// `None` when the scheduler is off
    pub sync_interval: Option<Duration>,
    pub data_dir: &'a str,
}

pub fn print_banner(info: &BannerInfo<'_>) {
    let display_host = if is_all_interfaces(info.host) {
        "localhost"
    } else {
        info.host
    };

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    let api_url = format!("http://{}:{}/api/v1", display_host, info.port);
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "API:",
        terminal_link(&api_url)
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "OpenAPI:",
        terminal_link(&format!("{}/openapi.json", api_url))
    );

    if is_all_interfaces(info.host) {
        if let Ok(interfaces) = local_ip_address::list_afinet_netifas() {
            for (_, ip) in interfaces
                .iter()
                .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
            {
                let network_url = format!("http://{}:{}/api/v1", ip, info.port);
                println!(
                    "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
                    "Network:",
                    terminal_link(&network_url)
                );
            }
        }
    }

    if info.has_credentials {
        println!(
            "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "Datadog:", info.dd_site
        );
    } else {
        println!(
            "  \x1b[31m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {} \x1b[31m(no API/app key, sync jobs will fail)\x1b[0m",
            "Datadog:", info.dd_site
        );
    }

    match info.sync_interval {
        Some(interval) => println!(
            "  \x1b[90m➜  {:<W$} every {} min\x1b[0m",
            "Sync:",
            interval.as_secs() / 60
        ),
        None => println!("  \x1b[90m➜  {:<W$} manual only\x1b[0m", "Sync:"),
    }
    println!("  \x1b[90m➜  {:<W$} {}\x1b[0m", "Data:", info.data_dir);
    println!();
}

/// Clickable OSC 8 link where the terminal supports it, plain cyan text otherwise
fn terminal_link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        format!("\x1b]8;;{}\x07\x1b[36m{}\x1b[0m\x1b]8;;\x07", url, url)
    } else {
        format!("\x1b[36m{}\x1b[0m", url)
    }
}
