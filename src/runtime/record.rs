// 安装记录的写入、格式化与导出
use crate::api::{
    HookKind, InstallReport, RECORD_ITEM_ERRNO, RECORD_ITEM_NAME, RECORD_ITEM_NEW_ADDR,
    RECORD_ITEM_OP, RECORD_ITEM_OUTCOME, RECORD_ITEM_TARGET_ADDR, RECORD_ITEM_TIMESTAMP,
};
use crate::errno::Errno;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use super::state::{CoreState, RecordEntry, RecordOp};

// 缓冲区上限，超出后淘汰最早的记录
const MAX_RECORDS: usize = 1024;

#[inline]
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

// recordable 关闭时静默丢弃，满时淘汰队首
#[inline]
fn push_record(state: &mut CoreState, entry: RecordEntry) {
    if !state.recordable {
        return;
    }
    if state.records.len() >= MAX_RECORDS {
        state.records.remove(0);
    }
    state.records.push(entry);
}

// 每个报告项生成一条记录
pub(super) fn add_report_records(state: &mut CoreState, report: &InstallReport) {
    let ts_ms = now_ms();
    for entry in &report.entries {
        push_record(
            state,
            RecordEntry {
                op: match entry.kind {
                    HookKind::Native => RecordOp::Native,
                    HookKind::Objc => RecordOp::Objc,
                },
                ts_ms,
                name: entry.name.clone(),
                target_addr: entry.target_addr,
                new_addr: entry.new_addr,
                outcome: entry.outcome.as_str(),
                status_code: entry.outcome.errno().as_i32(),
            },
        );
    }
}

fn op_name(op: RecordOp) -> &'static str {
    match op {
        RecordOp::Native => "NATIVE",
        RecordOp::Objc => "OBJC",
    }
}

// 按 item_flags 位掩码选择性输出字段，CSV 格式
fn format_entry(entry: &RecordEntry, item_flags: u32) -> String {
    let mut line = String::new();
    if item_flags & RECORD_ITEM_TIMESTAMP != 0 {
        let _ = write!(line, "{},", entry.ts_ms);
    }
    if item_flags & RECORD_ITEM_OP != 0 {
        let _ = write!(line, "{},", op_name(entry.op));
    }
    if item_flags & RECORD_ITEM_NAME != 0 {
        let _ = write!(line, "{},", entry.name);
    }
    if item_flags & RECORD_ITEM_TARGET_ADDR != 0 {
        let _ = write!(line, "0x{:x},", entry.target_addr);
    }
    if item_flags & RECORD_ITEM_NEW_ADDR != 0 {
        let _ = write!(line, "0x{:x},", entry.new_addr);
    }
    if item_flags & RECORD_ITEM_OUTCOME != 0 {
        let _ = write!(line, "{},", entry.outcome);
    }
    if item_flags & RECORD_ITEM_ERRNO != 0 {
        let _ = write!(line, "{},", entry.status_code);
    }
    line.push('\n');
    line
}

pub(super) fn get_records_text(state: &CoreState, item_flags: u32) -> Option<String> {
    if !state.recordable || state.records.is_empty() {
        return None;
    }
    let mut output = String::new();
    for entry in &state.records {
        output.push_str(&format_entry(entry, item_flags));
    }
    Some(output)
}

// 循环写入直到全部字节落盘，处理 short write
pub(super) fn dump_records_text(fd: i32, text: &str) -> Result<(), Errno> {
    if fd < 0 {
        return Err(Errno::InvalidArg);
    }
    let bytes = text.as_bytes();
    let mut offset = 0usize;
    while offset < bytes.len() {
        let written = unsafe {
            libc::write(
                fd,
                bytes[offset..].as_ptr() as *const libc::c_void,
                bytes.len() - offset,
            )
        };
        if written <= 0 {
            return Err(Errno::Invalid);
        }
        offset += written as usize;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{add_report_records, dump_records_text, get_records_text};
    use crate::api::{
        EntryReport, HookKind, InstallReport, InstallationOutcome, RECORD_ITEM_ERRNO,
        RECORD_ITEM_NAME, RECORD_ITEM_OP, RECORD_ITEM_OUTCOME, RuntimeStatus,
    };
    use crate::errno::Errno;
    use crate::runtime::state::CoreState;

    fn sample_report() -> InstallReport {
        InstallReport {
            entries: vec![
                EntryReport {
                    name: "exit".to_string(),
                    kind: HookKind::Native,
                    target_addr: 0x1000,
                    new_addr: 0x2000,
                    outcome: InstallationOutcome::Installed,
                },
                EntryReport {
                    name: "killpg".to_string(),
                    kind: HookKind::Native,
                    target_addr: 0,
                    new_addr: 0x3000,
                    outcome: InstallationOutcome::NotFound,
                },
                EntryReport {
                    name: "-[UIApplication terminate]".to_string(),
                    kind: HookKind::Objc,
                    target_addr: 0x4000,
                    new_addr: 0x5000,
                    outcome: InstallationOutcome::InstallError(Errno::MethodReplace),
                },
            ],
            runtime: RuntimeStatus::Probed,
            faults: Vec::new(),
        }
    }

    #[test]
    fn records_render_selected_fields() {
        let mut state = CoreState::default();
        add_report_records(&mut state, &sample_report());
        let flags = RECORD_ITEM_OP | RECORD_ITEM_NAME | RECORD_ITEM_OUTCOME | RECORD_ITEM_ERRNO;
        let text = get_records_text(&state, flags).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "NATIVE,exit,INSTALLED,0,",
                "NATIVE,killpg,NOT_FOUND,3,",
                "OBJC,-[UIApplication terminate],ERROR,11,",
            ]
        );
    }

    #[test]
    fn disabled_recording_drops_entries() {
        let mut state = CoreState {
            recordable: false,
            ..CoreState::default()
        };
        add_report_records(&mut state, &sample_report());
        assert!(state.records.is_empty());
        assert!(get_records_text(&state, RECORD_ITEM_NAME).is_none());
    }

    #[test]
    fn dump_rejects_negative_fd() {
        assert_eq!(dump_records_text(-1, "x"), Err(Errno::InvalidArg));
    }

    #[test]
    fn dump_writes_everything_to_pipe() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        dump_records_text(fds[1], "NATIVE,exit\n").unwrap();
        let mut buf = [0u8; 32];
        let read = unsafe { libc::read(fds[0], buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        assert_eq!(&buf[..read as usize], b"NATIVE,exit\n");
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
