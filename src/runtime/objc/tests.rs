use super::{
    DynamicObjcRuntime, blocked_terminate, blocked_terminate_with_success, patch_lifecycle_class,
    probe_selector,
};
use crate::api::{
    Capability, ClassHandle, HookKind, InstallationOutcome, NoopImp, ObjcRuntime, RuntimeStatus,
};
use crate::errno::Errno;
use crate::runtime::testing::{FakeObjcRuntime, MapResolver};

fn imp_addr(imp: NoopImp) -> usize {
    imp as usize
}

#[test]
fn missing_runtime_skips_the_whole_phase() {
    let rt = FakeObjcRuntime::unavailable();
    let (status, entries) = patch_lifecycle_class(&rt);
    assert_eq!(status, RuntimeStatus::Unavailable);
    assert!(entries.is_empty());
    assert!(rt.replaced_selectors().is_empty());
}

#[test]
fn missing_class_skips_the_whole_phase() {
    let rt = FakeObjcRuntime {
        class: None,
        ..FakeObjcRuntime::with_class(&["terminate"])
    };
    let (status, entries) = patch_lifecycle_class(&rt);
    assert_eq!(status, RuntimeStatus::ClassMissing);
    assert!(entries.is_empty());
}

#[test]
fn only_implemented_selectors_are_replaced() {
    let rt = FakeObjcRuntime::with_class(&["terminate"]);
    let (status, entries) = patch_lifecycle_class(&rt);

    assert_eq!(status, RuntimeStatus::Probed);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "-[UIApplication terminateWithSuccess]");
    assert_eq!(entries[0].outcome, InstallationOutcome::NotFound);
    assert_eq!(entries[1].name, "-[UIApplication terminate]");
    assert_eq!(entries[1].outcome, InstallationOutcome::Installed);
    assert!(entries.iter().all(|entry| entry.kind == HookKind::Objc));

    assert_eq!(rt.replaced_selectors(), vec!["terminate".to_string()]);
    assert_eq!(rt.replaced.borrow()[0].1, imp_addr(blocked_terminate));
}

#[test]
fn both_selectors_are_replaced_when_present() {
    let rt = FakeObjcRuntime::with_class(&["terminateWithSuccess", "terminate"]);
    let (_, entries) = patch_lifecycle_class(&rt);
    assert!(
        entries
            .iter()
            .all(|entry| entry.outcome == InstallationOutcome::Installed)
    );
    assert_eq!(
        rt.replaced.borrow().as_slice(),
        &[
            (
                "terminateWithSuccess".to_string(),
                imp_addr(blocked_terminate_with_success)
            ),
            ("terminate".to_string(), imp_addr(blocked_terminate)),
        ]
    );
    assert_eq!(entries[0].target_addr, 0x5150);
}

#[test]
fn replace_failure_affects_only_that_selector() {
    let rt = FakeObjcRuntime {
        fail_replace: Some("terminateWithSuccess"),
        ..FakeObjcRuntime::with_class(&["terminateWithSuccess", "terminate"])
    };
    let (_, entries) = patch_lifecycle_class(&rt);
    assert_eq!(
        entries[0].outcome,
        InstallationOutcome::InstallError(Errno::MethodReplace)
    );
    assert_eq!(entries[1].outcome, InstallationOutcome::Installed);
}

#[test]
fn panicking_introspection_is_contained_per_selector() {
    let rt = FakeObjcRuntime {
        panic_on: Some("terminateWithSuccess"),
        ..FakeObjcRuntime::with_class(&["terminateWithSuccess", "terminate"])
    };
    let (status, entries) = patch_lifecycle_class(&rt);
    assert_eq!(status, RuntimeStatus::Probed);
    assert_eq!(
        entries[0].outcome,
        InstallationOutcome::InstallError(Errno::Panicked)
    );
    assert_eq!(entries[1].outcome, InstallationOutcome::Installed);
}

#[test]
fn probe_reports_three_states() {
    let class = ClassHandle(0x5150);
    let rt = FakeObjcRuntime::with_class(&["terminate"]);
    assert_eq!(probe_selector(&rt, class, c"terminate"), Capability::Present);
    assert_eq!(
        probe_selector(&rt, class, c"terminateWithSuccess"),
        Capability::Absent
    );
    assert_eq!(
        probe_selector(&FakeObjcRuntime::unavailable(), class, c"terminate"),
        Capability::RuntimeUnavailable
    );
}

#[test]
fn noop_implementations_return() {
    unsafe {
        blocked_terminate_with_success(std::ptr::null_mut(), std::ptr::null());
        blocked_terminate(std::ptr::null_mut(), std::ptr::null());
    }
}

#[test]
fn dynamic_runtime_without_objc_symbols_is_unavailable() {
    let rt = DynamicObjcRuntime::from_resolver(&MapResolver::default().with("objc_getClass", 0x1000));
    assert!(!rt.is_available());
    assert_eq!(rt.lookup_class(c"UIApplication"), None);
    assert!(!rt.instances_respond_to(ClassHandle(0x1000), c"terminate"));
    assert_eq!(
        rt.replace_method(ClassHandle(0x1000), c"terminate", blocked_terminate),
        Err(Errno::RuntimeUnavailable)
    );
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn linux_process_has_no_objc_runtime() {
    let (status, entries) = patch_lifecycle_class(&DynamicObjcRuntime::new());
    assert_eq!(status, RuntimeStatus::Unavailable);
    assert!(entries.is_empty());
}
