use exit_guard::{
    DlsymResolver, InlinePatcher, InstallEnv, InstallationOutcome, RuntimeStatus, get_report,
    install_with,
};

use crate::test_ctx::{
    FakeUiApplication, NATIVE_NAMES, capture_stderr, ensure_outcome, expect_logged,
};

pub unsafe fn scenario_runtime_unavailable() {
    let report = get_report().expect("installed");
    assert_eq!(report.runtime, RuntimeStatus::Unavailable);
    assert!(report.faults.is_empty());
    assert_eq!(report.installed_count(), NATIVE_NAMES.len());
}

pub unsafe fn scenario_selector_independence() {
    let objc = FakeUiApplication::new(&["terminate"]);
    let resolver = DlsymResolver::new();
    let patcher = InlinePatcher::new();
    let report = install_with(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });

    assert_eq!(report.runtime, RuntimeStatus::Probed);
    ensure_outcome(
        &report,
        "-[UIApplication terminate]",
        InstallationOutcome::Installed,
    );
    ensure_outcome(
        &report,
        "-[UIApplication terminateWithSuccess]",
        InstallationOutcome::NotFound,
    );
    for name in NATIVE_NAMES {
        ensure_outcome(&report, name, InstallationOutcome::Installed);
    }
    assert!(objc.imp_for("terminateWithSuccess").is_none());

    let imp = objc.imp_for("terminate").expect("terminate replaced");
    let output = capture_stderr(|| unsafe { imp(std::ptr::null_mut(), std::ptr::null()) });
    expect_logged(&output, "[objc] terminate called, blocked");
}
