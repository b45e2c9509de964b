// 生命周期管理模块，作为 runtime 子模块的统一入口
// 将调度/安装/控制/记录操作分发到各子模块
use crate::api::{
    InstallEnv, InstallOptions, InstallReport, InstallState, OverrideEntry, RpcExport,
};
use crate::errno::Errno;

mod options;
mod pass;
mod schedule;

mod entry_control;
mod entry_init;

#[cfg(test)]
mod tests;

pub(crate) use options::DEFAULT_INSTALL_DELAY;

pub(super) fn get_version() -> String {
    entry_init::get_version()
}

pub(super) fn options_from_env() -> InstallOptions {
    options::options_from_env()
}

pub(super) fn init(options: InstallOptions) -> Errno {
    entry_init::init(options)
}

pub(super) fn install_now() -> InstallReport {
    entry_init::install_now()
}

pub(super) fn install_with(env: &InstallEnv<'_>) -> InstallReport {
    entry_init::install_with(env)
}

pub(super) fn get_state() -> InstallState {
    entry_init::get_state()
}

pub(super) fn get_report() -> Option<InstallReport> {
    entry_init::get_report()
}

pub(super) fn override_catalog() -> &'static [OverrideEntry] {
    entry_init::override_catalog()
}

pub(super) fn get_debug() -> bool {
    entry_control::get_debug()
}

pub(super) fn set_debug(debug: bool) {
    entry_control::set_debug(debug)
}

pub(super) fn get_recordable() -> bool {
    entry_control::get_recordable()
}

pub(super) fn set_recordable(recordable: bool) {
    entry_control::set_recordable(recordable)
}

pub(super) fn get_records(item_flags: u32) -> Option<String> {
    entry_control::get_records(item_flags)
}

pub(super) fn dump_records(fd: i32, item_flags: u32) -> Errno {
    entry_control::dump_records(fd, item_flags)
}

pub(super) fn rpc_exports() -> &'static [RpcExport] {
    entry_control::rpc_exports()
}
