use std::ffi::CString;

use exit_guard::{
    DlsymResolver, DynamicObjcRuntime, InlinePatcher, InstallEnv, InstallState,
    InstallationOutcome, RECORD_ITEM_NAME, RECORD_ITEM_OP, RECORD_ITEM_OUTCOME, get_records,
    get_report, get_state, install_now, install_with,
};

use crate::test_ctx::{
    AbortFn, ExitFn, HidingResolver, KillFn, NATIVE_NAMES, RaiseFn, capture_stderr, entry_bytes,
    ensure_outcome, expect_logged, lookup,
};

fn symbol(name: &str) -> CString {
    CString::new(name).unwrap()
}

unsafe fn snapshot_entries() -> Vec<Vec<u8>> {
    NATIVE_NAMES
        .iter()
        .map(|name| unsafe { entry_bytes(&symbol(name)) })
        .collect()
}

pub unsafe fn scenario_missing_symbol() {
    assert_eq!(get_state(), InstallState::Pending);
    let killpg_before = entry_bytes(c"killpg");

    let resolver = HidingResolver::new(&["killpg"]);
    let patcher = InlinePatcher::new();
    let objc = DynamicObjcRuntime::new();
    let report = install_with(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });

    ensure_outcome(&report, "killpg", InstallationOutcome::NotFound);
    for name in &NATIVE_NAMES[..5] {
        ensure_outcome(&report, name, InstallationOutcome::Installed);
    }
    assert_eq!(
        entry_bytes(c"killpg"),
        killpg_before,
        "hidden killpg was patched"
    );
    // install_with 不推进状态机
    assert_eq!(get_state(), InstallState::Pending);

    let exit: ExitFn = lookup(c"exit");
    let output = capture_stderr(|| unsafe { exit(2) });
    expect_logged(&output, "exit(2) intercepted, blocked");
}

pub unsafe fn scenario_forged_returns() {
    let report = install_now();
    assert_eq!(get_state(), InstallState::Installed);
    for name in NATIVE_NAMES {
        ensure_outcome(&report, name, InstallationOutcome::Installed);
    }

    let exit: ExitFn = lookup(c"exit");
    let underscore_exit: ExitFn = lookup(c"_exit");
    let abort: AbortFn = lookup(c"abort");
    let raise: RaiseFn = lookup(c"raise");
    let kill: KillFn = lookup(c"kill");
    let killpg: KillFn = lookup(c"killpg");

    let pid = libc::getpid();
    let pgrp = libc::getpgrp();
    assert_eq!(pgrp, pid, "guard_test must lead its own process group");
    let mut results = [-1; 3];
    let output = capture_stderr(|| unsafe {
        exit(1);
        underscore_exit(3);
        abort();
        results[0] = raise(libc::SIGKILL);
        results[1] = kill(pid, libc::SIGKILL);
        results[2] = killpg(pgrp, libc::SIGKILL);
    });

    // 能执行到这里说明进程没有被终止
    assert_eq!(results, [0, 0, 0]);
    assert_eq!(libc::getpid(), pid);
    expect_logged(&output, "exit(1) intercepted, blocked");
    expect_logged(&output, "_exit(3) intercepted, blocked");
    expect_logged(&output, "abort() intercepted, blocked");
    expect_logged(&output, &format!("raise({}) intercepted, returning 0", libc::SIGKILL));
    expect_logged(
        &output,
        &format!("kill({pid}, {}) intercepted, returning 0", libc::SIGKILL),
    );
    expect_logged(
        &output,
        &format!("killpg({pgrp}, {}) intercepted, returning 0", libc::SIGKILL),
    );
}

pub unsafe fn scenario_idempotent_reinstall() {
    let before = snapshot_entries();
    let stored = get_report().expect("report stored after install_now");

    let again = install_now();
    assert_eq!(again, stored, "second install_now must reuse the report");

    let resolver = DlsymResolver::new();
    let patcher = InlinePatcher::new();
    let objc = DynamicObjcRuntime::new();
    let report = install_with(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });
    for name in NATIVE_NAMES {
        ensure_outcome(&report, name, InstallationOutcome::Installed);
    }
    assert_eq!(snapshot_entries(), before, "re-install rewrote entries");

    let exit: ExitFn = lookup(c"exit");
    exit(4);
}

pub unsafe fn scenario_records() {
    let text = get_records(RECORD_ITEM_OP | RECORD_ITEM_NAME | RECORD_ITEM_OUTCOME)
        .expect("records are on by default");
    assert!(text.contains("NATIVE,killpg,NOT_FOUND,"), "{text}");
    assert!(text.contains("NATIVE,killpg,INSTALLED,"), "{text}");
    assert!(
        text.lines()
            .all(|line| line.starts_with("NATIVE,") || line.starts_with("OBJC,")),
        "{text}"
    );
    // 三次安装，每次六项
    assert_eq!(text.lines().count(), 18, "{text}");
}
