// 一次完整的安装过程：先 libc 拦截目录，再 ObjC 生命周期方法
// 两个阶段各自处于独立的故障边界内，任一阶段失败都不阻止另一阶段
use crate::api::{InstallEnv, InstallReport, RuntimeStatus};
use crate::log;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::super::catalog::{self, OVERRIDE_CATALOG};
use super::super::objc;

pub(super) const NATIVE_PHASE: &str = "native";
pub(super) const OBJC_PHASE: &str = "objc";

pub(super) fn run_pass(env: &InstallEnv<'_>) -> InstallReport {
    let mut report = InstallReport {
        entries: Vec::new(),
        runtime: RuntimeStatus::NotAttempted,
        faults: Vec::new(),
    };

    match catch_unwind(AssertUnwindSafe(|| {
        catalog::apply_catalog(env.resolver, env.patcher, &OVERRIDE_CATALOG)
    })) {
        Ok(entries) => report.entries.extend(entries),
        Err(_) => {
            log::error(format_args!("error installing native hooks"));
            report.faults.push(NATIVE_PHASE);
        }
    }

    match catch_unwind(AssertUnwindSafe(|| objc::patch_lifecycle_class(env.objc))) {
        Ok((runtime, entries)) => {
            report.runtime = runtime;
            report.entries.extend(entries);
        }
        Err(_) => {
            log::error(format_args!("error installing objc hooks"));
            report.faults.push(OBJC_PHASE);
        }
    }

    log::info(format_args!(
        "hooks installed ({}/{}) objc={}",
        report.installed_count(),
        report.entries.len(),
        report.runtime.errno().as_i32()
    ));
    report
}
