/// Mint a fleet-unique worker id of the form `worker-<host>-<pid>-<rand4>`.
pub fn make_worker_id() -> String {
    format!(
        "worker-{}-{}-{}",
        hostname(),
        std::process::id(),
        fastrand::u32(1000..=9999)
    )
}

pub fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        let name = name.trim().to_string();
        if !name.is_empty() {
            return name;
        }
    }

    std::process::Command::new("hostname")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
