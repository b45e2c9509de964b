// runtime 模块入口，将内部子模块的功能统一暴露为 crate 级公共接口
use crate::api::{
    InstallEnv, InstallOptions, InstallReport, InstallState, OverrideEntry, RpcExport,
};
use crate::errno::Errno;

mod catalog;
mod lifecycle;
mod objc;
mod record;
mod resolver;
mod state;
mod trampoline;

#[cfg(test)]
mod testing;

pub use objc::DynamicObjcRuntime;
pub use resolver::DlsymResolver;
pub use trampoline::InlinePatcher;

pub(crate) use lifecycle::DEFAULT_INSTALL_DELAY;
pub(crate) use state::MutexPoisonRecover;

pub(crate) fn get_version() -> String {
    lifecycle::get_version()
}

pub(crate) fn options_from_env() -> InstallOptions {
    lifecycle::options_from_env()
}

pub(crate) fn init(options: InstallOptions) -> Errno {
    lifecycle::init(options)
}

pub(crate) fn install_now() -> InstallReport {
    lifecycle::install_now()
}

pub(crate) fn install_with(env: &InstallEnv<'_>) -> InstallReport {
    lifecycle::install_with(env)
}

pub(crate) fn get_state() -> InstallState {
    lifecycle::get_state()
}

pub(crate) fn get_report() -> Option<InstallReport> {
    lifecycle::get_report()
}

pub(crate) fn override_catalog() -> &'static [OverrideEntry] {
    lifecycle::override_catalog()
}

pub(crate) fn get_debug() -> bool {
    lifecycle::get_debug()
}

pub(crate) fn set_debug(debug: bool) {
    lifecycle::set_debug(debug)
}

pub(crate) fn get_recordable() -> bool {
    lifecycle::get_recordable()
}

pub(crate) fn set_recordable(recordable: bool) {
    lifecycle::set_recordable(recordable)
}

pub(crate) fn get_records(item_flags: u32) -> Option<String> {
    lifecycle::get_records(item_flags)
}

pub(crate) fn dump_records(fd: i32, item_flags: u32) -> Errno {
    lifecycle::dump_records(fd, item_flags)
}

pub(crate) fn rpc_exports() -> &'static [RpcExport] {
    lifecycle::rpc_exports()
}
