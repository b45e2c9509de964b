// 进程终止类函数的拦截目录，以及按目录逐项安装
use crate::api::{
    CodePatcher, EntryReport, HookKind, InstallationOutcome, OverrideEntry, Replacement,
    SymbolResolver,
};
use crate::errno::Errno;
use crate::log;
use std::panic::{AssertUnwindSafe, catch_unwind};

use super::trampoline;

mod replacements;

use replacements::{
    blocked_abort, blocked_exit, blocked_kill, blocked_killpg, blocked_raise,
    blocked_underscore_exit,
};

// 安装顺序即目录顺序
pub(super) static OVERRIDE_CATALOG: [OverrideEntry; 6] = [
    OverrideEntry {
        name: c"exit",
        replacement: Replacement::VoidTakesInt(blocked_exit),
    },
    OverrideEntry {
        name: c"_exit",
        replacement: Replacement::VoidTakesInt(blocked_underscore_exit),
    },
    OverrideEntry {
        name: c"abort",
        replacement: Replacement::VoidTakesNothing(blocked_abort),
    },
    OverrideEntry {
        name: c"raise",
        replacement: Replacement::IntTakesOneInt(blocked_raise),
    },
    OverrideEntry {
        name: c"kill",
        replacement: Replacement::IntTakesTwoInts(blocked_kill),
    },
    OverrideEntry {
        name: c"killpg",
        replacement: Replacement::IntTakesTwoInts(blocked_killpg),
    },
];

// 逐项解析并安装，单项失败（包括 panic）不影响后续项
pub(super) fn apply_catalog(
    resolver: &dyn SymbolResolver,
    patcher: &dyn CodePatcher,
    catalog: &[OverrideEntry],
) -> Vec<EntryReport> {
    let mut entries = Vec::with_capacity(catalog.len());
    for entry in catalog {
        let name = entry.name.to_string_lossy().into_owned();
        let attempt = catch_unwind(AssertUnwindSafe(|| install_entry(resolver, patcher, entry)));
        let report = attempt.unwrap_or_else(|_| {
            log::error(format_args!("{name}: panic while installing"));
            EntryReport {
                name: name.clone(),
                kind: HookKind::Native,
                target_addr: 0,
                new_addr: entry.replacement.addr(),
                outcome: InstallationOutcome::InstallError(Errno::Panicked),
            }
        });
        entries.push(report);
    }
    entries
}

fn install_entry(
    resolver: &dyn SymbolResolver,
    patcher: &dyn CodePatcher,
    entry: &OverrideEntry,
) -> EntryReport {
    let name = entry.name.to_string_lossy().into_owned();
    let new_addr = entry.replacement.addr();
    let Some(target_addr) = resolver.resolve(entry.name) else {
        log::info(format_args!("{name} not found"));
        return EntryReport {
            name,
            kind: HookKind::Native,
            target_addr: 0,
            new_addr,
            outcome: InstallationOutcome::NotFound,
        };
    };

    log::info(format_args!("found {name} @ 0x{target_addr:x}"));
    let outcome = trampoline::install(patcher, &name, target_addr, entry.replacement);
    EntryReport {
        name,
        kind: HookKind::Native,
        target_addr,
        new_addr,
        outcome,
    }
}
