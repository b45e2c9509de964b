const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

#[cfg(target_arch = "aarch64")]
const VERSION_ARCH: &str = "aarch64";
#[cfg(target_arch = "x86_64")]
const VERSION_ARCH: &str = "x86_64";

// 形如 "exit_guard 1.0.0 (aarch64)"
pub fn version_str_full() -> String {
    format!("exit_guard {} ({})", VERSION_STR, VERSION_ARCH)
}
