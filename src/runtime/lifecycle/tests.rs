use super::entry_control::{self, reset};
use super::entry_init::{init, install_once, install_with};
use super::options::{
    DEFAULT_INSTALL_DELAY, MAX_INSTALL_DELAY, options_from_lookup, parse_delay_env_value,
    parse_flag_env_value,
};
use super::pass::{OBJC_PHASE, run_pass};
use super::schedule::{INSTALLER_THREAD_NAME, schedule_once};
use crate::api::{
    ClassHandle, InstallEnv, InstallOptions, InstallState, InstallationOutcome, NoopImp,
    ObjcRuntime, RECORD_ITEM_NAME, RECORD_ITEM_OP, RECORD_ITEM_OUTCOME, RuntimeStatus,
    SymbolResolver,
};
use crate::errno::Errno;
use crate::runtime::testing::{
    FakeObjcRuntime, MapResolver, RecordingPatcher, lock_runtime_tests,
};
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::mpsc;
use std::time::Duration;

const NAMES: [&str; 6] = ["exit", "_exit", "abort", "raise", "kill", "killpg"];

fn full_resolver() -> MapResolver {
    NAMES
        .iter()
        .enumerate()
        .fold(MapResolver::default(), |resolver, (index, name)| {
            resolver.with(name, 0x20_0000 + index * 0x40)
        })
}

struct PanickingResolver;

impl SymbolResolver for PanickingResolver {
    fn resolve(&self, name: &CStr) -> Option<usize> {
        panic!("resolver exploded on {}", name.to_string_lossy());
    }
}

// 连可用性探测都会 panic 的运行时，只能由外层故障边界兜住
struct PanickingRuntime;

impl ObjcRuntime for PanickingRuntime {
    fn is_available(&self) -> bool {
        panic!("runtime probe exploded");
    }

    fn lookup_class(&self, _name: &CStr) -> Option<ClassHandle> {
        None
    }

    fn instances_respond_to(&self, _class: ClassHandle, _selector: &CStr) -> bool {
        false
    }

    fn replace_method(&self, _class: ClassHandle, _selector: &CStr, _imp: NoopImp) -> Result<(), Errno> {
        Err(Errno::RuntimeUnavailable)
    }
}

#[test]
fn flag_values_follow_common_spellings() {
    for value in ["1", "true", "YES", " on "] {
        assert_eq!(parse_flag_env_value(value), Some(true), "{value}");
    }
    for value in ["0", "False", "no", "OFF"] {
        assert_eq!(parse_flag_env_value(value), Some(false), "{value}");
    }
    assert_eq!(parse_flag_env_value("maybe"), None);
    assert_eq!(parse_flag_env_value(""), None);
}

#[test]
fn delay_is_parsed_in_millis_and_clamped() {
    assert_eq!(parse_delay_env_value("0"), Some(Duration::ZERO));
    assert_eq!(parse_delay_env_value(" 350 "), Some(Duration::from_millis(350)));
    assert_eq!(parse_delay_env_value("999999"), Some(MAX_INSTALL_DELAY));
    assert_eq!(parse_delay_env_value("-5"), None);
    assert_eq!(parse_delay_env_value("soon"), None);
}

#[test]
fn env_overrides_apply_and_garbage_keeps_defaults() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("EXIT_GUARD_DELAY_MS", "50"),
        ("EXIT_GUARD_DEBUG", "on"),
        ("EXIT_GUARD_RECORD", "whatever"),
    ]);
    let options = options_from_lookup(|key| env.get(key).map(|value| value.to_string()));
    assert_eq!(
        options,
        InstallOptions {
            delay: Duration::from_millis(50),
            debug: true,
            recordable: true,
        }
    );

    let options = options_from_lookup(|_| None);
    assert_eq!(options, InstallOptions::default());
    assert_eq!(options.delay, DEFAULT_INSTALL_DELAY);
    assert_eq!(DEFAULT_INSTALL_DELAY, Duration::from_millis(200));
}

#[test]
fn pass_runs_native_phase_even_without_objc_runtime() {
    let resolver = full_resolver();
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::unavailable();
    let report = run_pass(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });

    assert_eq!(report.runtime, RuntimeStatus::Unavailable);
    assert_eq!(report.entries.len(), 6);
    assert_eq!(report.installed_count(), 6);
    assert!(report.faults.is_empty());
}

#[test]
fn pass_combines_native_and_objc_outcomes() {
    let resolver = MapResolver::default().with("exit", 0x1000).with("kill", 0x2000);
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::with_class(&["terminate"]);
    let report = run_pass(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });

    assert_eq!(report.runtime, RuntimeStatus::Probed);
    assert_eq!(report.entries.len(), 8);
    assert_eq!(report.outcome_of("exit"), Some(InstallationOutcome::Installed));
    assert_eq!(report.outcome_of("abort"), Some(InstallationOutcome::NotFound));
    assert_eq!(
        report.outcome_of("-[UIApplication terminate]"),
        Some(InstallationOutcome::Installed)
    );
    assert_eq!(
        report.outcome_of("-[UIApplication terminateWithSuccess]"),
        Some(InstallationOutcome::NotFound)
    );
    assert_eq!(report.installed_count(), 3);
}

#[test]
fn failing_phases_are_contained() {
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::with_class(&["terminate"]);
    let report = run_pass(&InstallEnv {
        resolver: &PanickingResolver,
        patcher: &patcher,
        objc: &objc,
    });
    // 每个目录项都单独失败，ObjC 阶段照常执行
    assert!(
        report.entries[..6]
            .iter()
            .all(|entry| entry.outcome == InstallationOutcome::InstallError(Errno::Panicked))
    );
    assert_eq!(
        report.outcome_of("-[UIApplication terminate]"),
        Some(InstallationOutcome::Installed)
    );

    let resolver = full_resolver();
    let report = run_pass(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &PanickingRuntime,
    });
    assert_eq!(report.faults, vec![OBJC_PHASE]);
    assert_eq!(report.runtime, RuntimeStatus::NotAttempted);
    assert_eq!(report.installed_count(), 6);
}

#[test]
fn install_once_moves_to_installed_exactly_once() {
    let _guard = lock_runtime_tests();
    reset();
    assert_eq!(super::get_state(), InstallState::Pending);
    assert_eq!(super::get_report(), None);

    let resolver = full_resolver();
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::unavailable();
    let env = InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    };
    let first = install_once(&env);
    assert_eq!(super::get_state(), InstallState::Installed);
    assert_eq!(super::get_report(), Some(first.clone()));
    assert_eq!(patcher.calls.borrow().len(), 6);

    // 第二次不再补丁，返回同一份报告
    let second = install_once(&env);
    assert_eq!(second, first);
    assert_eq!(patcher.calls.borrow().len(), 6);
    reset();
}

#[test]
fn install_with_leaves_state_machine_alone() {
    let _guard = lock_runtime_tests();
    reset();
    let resolver = MapResolver::default().with("raise", 0x3000);
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::unavailable();
    let env = InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    };
    let report = install_with(&env);
    let again = install_with(&env);
    assert_eq!(report, again);
    assert_eq!(super::get_state(), InstallState::Pending);
    assert_eq!(super::get_report(), None);
    assert_eq!(patcher.calls.borrow().len(), 2);
    reset();
}

#[test]
fn records_follow_installation_and_toggle() {
    let _guard = lock_runtime_tests();
    reset();
    let resolver = MapResolver::default().with("exit", 0x1000);
    let patcher = RecordingPatcher::default();
    let objc = FakeObjcRuntime::unavailable();
    install_once(&InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    });

    let text = super::get_records(RECORD_ITEM_OP | RECORD_ITEM_NAME | RECORD_ITEM_OUTCOME).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "NATIVE,exit,INSTALLED,");
    assert_eq!(lines[5], "NATIVE,killpg,NOT_FOUND,");

    super::set_recordable(false);
    assert!(!super::get_recordable());
    assert_eq!(super::get_records(RECORD_ITEM_NAME), None);
    assert_eq!(super::dump_records(-1, RECORD_ITEM_NAME), Errno::Ok);
    reset();
}

#[test]
fn init_schedules_a_single_installer() {
    let _guard = lock_runtime_tests();
    reset();
    // 延迟足够长，安装线程在测试进程存活期间不会真正触发
    let options = InstallOptions {
        delay: Duration::from_secs(24 * 60 * 60),
        debug: false,
        recordable: true,
    };
    assert_eq!(init(options), Errno::Ok);
    assert_eq!(super::get_state(), InstallState::Pending);

    let options = InstallOptions {
        debug: true,
        ..options
    };
    assert_eq!(init(options), Errno::Repeat);
    assert!(super::get_debug());
    super::set_debug(false);
    assert!(!super::get_debug());
    assert_eq!(super::get_state(), InstallState::Pending);
    reset();
}

#[test]
fn scheduled_task_runs_on_named_thread_after_delay() {
    let (sender, receiver) = mpsc::channel();
    let started = std::time::Instant::now();
    let scheduled = schedule_once(Duration::from_millis(20), move || {
        let name = std::thread::current().name().map(str::to_string);
        let _ = sender.send(name);
    });
    assert!(scheduled.is_ok());
    let name = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(name.as_deref(), Some(INSTALLER_THREAD_NAME));
}

#[test]
fn catalog_and_rpc_surface() {
    let names: Vec<_> = super::override_catalog()
        .iter()
        .map(|entry| entry.name.to_str().unwrap())
        .collect();
    assert_eq!(names, NAMES);
    assert!(entry_control::rpc_exports().is_empty());
}

#[cfg(any(target_os = "linux", target_os = "android"))]
#[test]
fn repeated_pass_over_patched_code_is_stable() {
    use crate::runtime::testing::{VictimKind, VictimPage};
    use crate::runtime::trampoline::InlinePatcher;

    let page = VictimPage::new(&[
        VictimKind::Traps,
        VictimKind::Traps,
        VictimKind::Traps,
        VictimKind::ReturnsFortyTwo,
        VictimKind::ReturnsFortyTwo,
        VictimKind::ReturnsFortyTwo,
    ]);
    let resolver = NAMES
        .iter()
        .enumerate()
        .fold(MapResolver::default(), |resolver, (slot, name)| {
            resolver.with(name, page.addr(slot))
        });
    let patcher = InlinePatcher::new();
    let objc = FakeObjcRuntime::unavailable();
    let env = InstallEnv {
        resolver: &resolver,
        patcher: &patcher,
        objc: &objc,
    };

    let first = run_pass(&env);
    assert_eq!(first.installed_count(), 6);
    let snapshot: Vec<_> = (0..6).map(|slot| page.bytes(slot, 16)).collect();

    let second = run_pass(&env);
    assert_eq!(second, first);
    let again: Vec<_> = (0..6).map(|slot| page.bytes(slot, 16)).collect();
    assert_eq!(again, snapshot);
    assert_eq!(page.call_int(5, 0), 0);
}
