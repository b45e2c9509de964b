// 安装选项的环境变量覆盖
use crate::api::InstallOptions;
use std::env;
use std::time::Duration;

pub(crate) const DEFAULT_INSTALL_DELAY: Duration = Duration::from_millis(200);
// 过长的延迟会让进程在 hook 生效前就退出，超出部分截断
pub(super) const MAX_INSTALL_DELAY: Duration = Duration::from_secs(10);

const DELAY_ENV: &str = "EXIT_GUARD_DELAY_MS";
const DEBUG_ENV: &str = "EXIT_GUARD_DEBUG";
const RECORD_ENV: &str = "EXIT_GUARD_RECORD";

pub(super) fn options_from_env() -> InstallOptions {
    options_from_lookup(|key| env::var(key).ok())
}

// 无法解析的值保持默认
pub(super) fn options_from_lookup<F>(lookup: F) -> InstallOptions
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = InstallOptions::default();
    InstallOptions {
        delay: lookup(DELAY_ENV)
            .and_then(|value| parse_delay_env_value(&value))
            .unwrap_or(defaults.delay),
        debug: lookup(DEBUG_ENV)
            .and_then(|value| parse_flag_env_value(&value))
            .unwrap_or(defaults.debug),
        recordable: lookup(RECORD_ENV)
            .and_then(|value| parse_flag_env_value(&value))
            .unwrap_or(defaults.recordable),
    }
}

pub(super) fn parse_flag_env_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(super) fn parse_delay_env_value(value: &str) -> Option<Duration> {
    let millis = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_millis(millis).min(MAX_INSTALL_DELAY))
}
