// UIApplication 生命周期方法补丁：把主动终止应用的实例方法替换为空实现
// 运行时或类不存在时整段跳过，单个选择子的失败互不影响
use crate::api::{
    Capability, ClassHandle, EntryReport, HookKind, InstallationOutcome, NoopImp, ObjcRuntime,
    RuntimeStatus,
};
use crate::errno::Errno;
use crate::log;
use std::ffi::{CStr, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

mod ffi;
#[cfg(test)]
mod tests;

pub use ffi::DynamicObjcRuntime;

const LIFECYCLE_CLASS: &CStr = c"UIApplication";

struct LifecycleHook {
    selector: &'static CStr,
    imp: NoopImp,
}

unsafe extern "C" fn blocked_terminate_with_success(_receiver: *mut c_void, _selector: *const c_void) {
    log::warn(format_args!("[objc] terminateWithSuccess called, blocked"));
}

unsafe extern "C" fn blocked_terminate(_receiver: *mut c_void, _selector: *const c_void) {
    log::warn(format_args!("[objc] terminate called, blocked"));
}

static LIFECYCLE_HOOKS: [LifecycleHook; 2] = [
    LifecycleHook {
        selector: c"terminateWithSuccess",
        imp: blocked_terminate_with_success,
    },
    LifecycleHook {
        selector: c"terminate",
        imp: blocked_terminate,
    },
];

pub(super) fn probe_selector(rt: &dyn ObjcRuntime, class: ClassHandle, selector: &CStr) -> Capability {
    if !rt.is_available() {
        return Capability::RuntimeUnavailable;
    }
    if rt.instances_respond_to(class, selector) {
        Capability::Present
    } else {
        Capability::Absent
    }
}

fn entry_name(selector: &CStr) -> String {
    format!(
        "-[{} {}]",
        LIFECYCLE_CLASS.to_string_lossy(),
        selector.to_string_lossy()
    )
}

fn patch_selector(rt: &dyn ObjcRuntime, class: ClassHandle, hook: &LifecycleHook) -> InstallationOutcome {
    let name = entry_name(hook.selector);
    match probe_selector(rt, class, hook.selector) {
        Capability::Present => match rt.replace_method(class, hook.selector, hook.imp) {
            Ok(()) => {
                log::info(format_args!("hooked {name}"));
                InstallationOutcome::Installed
            }
            Err(errno) => {
                log::warn(format_args!("replace {name} failed errno={}", errno.as_i32()));
                InstallationOutcome::InstallError(errno)
            }
        },
        Capability::Absent => {
            log::debug(format_args!("{name} not implemented, skipped"));
            InstallationOutcome::NotFound
        }
        Capability::RuntimeUnavailable => InstallationOutcome::InstallError(Errno::RuntimeUnavailable),
    }
}

pub(super) fn patch_lifecycle_class(rt: &dyn ObjcRuntime) -> (RuntimeStatus, Vec<EntryReport>) {
    if !rt.is_available() {
        log::info(format_args!("ObjC runtime not available"));
        return (RuntimeStatus::Unavailable, Vec::new());
    }
    let Some(class) = rt.lookup_class(LIFECYCLE_CLASS) else {
        log::info(format_args!(
            "{} class not available",
            LIFECYCLE_CLASS.to_string_lossy()
        ));
        return (RuntimeStatus::ClassMissing, Vec::new());
    };

    let mut entries = Vec::with_capacity(LIFECYCLE_HOOKS.len());
    for hook in &LIFECYCLE_HOOKS {
        let outcome = catch_unwind(AssertUnwindSafe(|| patch_selector(rt, class, hook)))
            .unwrap_or_else(|_| {
                log::error(format_args!("{}: panic while patching", entry_name(hook.selector)));
                InstallationOutcome::InstallError(Errno::Panicked)
            });
        entries.push(EntryReport {
            name: entry_name(hook.selector),
            kind: HookKind::Objc,
            target_addr: class.0,
            new_addr: hook.imp as usize,
            outcome,
        });
    }
    (RuntimeStatus::Probed, entries)
}
