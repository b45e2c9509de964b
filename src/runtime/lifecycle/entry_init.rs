// 安装入口：调度一次性延迟安装、立即安装、状态与报告查询
use crate::api::{InstallEnv, InstallOptions, InstallReport, InstallState, OverrideEntry};
use crate::errno::Errno;
use crate::log;
use crate::version;

use super::super::catalog::OVERRIDE_CATALOG;
use super::super::objc::DynamicObjcRuntime;
use super::super::record;
use super::super::resolver::DlsymResolver;
use super::super::state::GLOBAL;
use super::super::trampoline::InlinePatcher;
use super::{pass, schedule};
use crate::runtime::state::MutexPoisonRecover;

pub(super) fn get_version() -> String {
    version::version_str_full()
}

// 重复调用只更新 debug/recordable，不会再次调度
pub(super) fn init(options: InstallOptions) -> Errno {
    {
        let mut state = GLOBAL.state.lock_or_poison();
        state.debug = options.debug;
        log::set_debug_enabled(options.debug);
        state.recordable = options.recordable;
        if state.scheduled {
            log::debug(format_args!("install already scheduled"));
            return Errno::Repeat;
        }
        state.scheduled = true;
    }

    log::info(format_args!(
        "{} scheduling install in {}ms",
        version::version_str_full(),
        options.delay.as_millis()
    ));
    match schedule::schedule_once(options.delay, fire) {
        Ok(()) => Errno::Ok,
        Err(task) => {
            // 没有线程可用时退化为同步安装
            log::warn(format_args!("installing inline"));
            task();
            Errno::ThreadSpawn
        }
    }
}

fn fire() {
    let _ = install_now();
}

pub(super) fn install_now() -> InstallReport {
    let resolver = DlsymResolver::new();
    let patcher = InlinePatcher::new();
    let objc = DynamicObjcRuntime::new();
    install_once(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    })
}

// Pending -> Installed 只发生一次，之后直接返回保存的报告
pub(super) fn install_once(env: &InstallEnv<'_>) -> InstallReport {
    let _install_guard = GLOBAL.install_mutex.lock_or_poison();
    {
        let state = GLOBAL.state.lock_or_poison();
        if state.install_state == InstallState::Installed
            && let Some(report) = state.report.as_ref()
        {
            log::debug(format_args!("already installed, reusing report"));
            return report.clone();
        }
    }

    let report = pass::run_pass(env);
    let mut state = GLOBAL.state.lock_or_poison();
    record::add_report_records(&mut state, &report);
    state.report = Some(report.clone());
    state.install_state = InstallState::Installed;
    report
}

// 不触碰全局状态机，仅串行化并记录
pub(super) fn install_with(env: &InstallEnv<'_>) -> InstallReport {
    let _install_guard = GLOBAL.install_mutex.lock_or_poison();
    let report = pass::run_pass(env);
    let mut state = GLOBAL.state.lock_or_poison();
    record::add_report_records(&mut state, &report);
    report
}

pub(super) fn get_state() -> InstallState {
    GLOBAL.state.lock_or_poison().install_state
}

pub(super) fn get_report() -> Option<InstallReport> {
    GLOBAL.state.lock_or_poison().report.clone()
}

pub(super) fn override_catalog() -> &'static [OverrideEntry] {
    &OVERRIDE_CATALOG
}
