mod native;
mod objc;

// 顺序有意义：先在隐藏 killpg 的情况下安装，再走完整安装
pub unsafe fn run_all() {
    run("missing-symbol-independence", native::scenario_missing_symbol);
    run("forged-returns", native::scenario_forged_returns);
    run("idempotent-reinstall", native::scenario_idempotent_reinstall);
    run("records", native::scenario_records);
    run("objc-runtime-unavailable", objc::scenario_runtime_unavailable);
    run("objc-selector-independence", objc::scenario_selector_independence);
}

unsafe fn run(name: &str, scenario: unsafe fn()) {
    println!("scenario: {name}");
    scenario();
}
