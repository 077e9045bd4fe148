use tokio::process::Command;

/// Restricts the child process to a single CPU core between fork and exec.
///
/// Pinning is a scheduling hint. If the core does not exist the worker runs unpinned.
#[cfg(target_os = "linux")]
pub(super) fn pin_to_core(command: &mut Command, core: usize) {
    let Ok(limit) = usize::try_from(libc::CPU_SETSIZE) else {
        return;
    };
    if core >= limit {
        log::warn!("CPU core {core} exceeds the CPU set size; the worker is not pinned");
        return;
    }
    // SAFETY: the hook runs in the forked child and only issues the
    // `sched_setaffinity` system call on a set built on the stack.
    unsafe {
        command.pre_exec(move || {
            set_affinity(core);
            Ok(())
        });
    }
}

#[cfg(target_os = "linux")]
fn set_affinity(core: usize) {
    // SAFETY: `cpu_set_t` is a plain bit mask for which all zeroes is the empty set,
    // and `core` is within the set size.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        let _ = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
    }
}

#[cfg(not(target_os = "linux"))]
pub(super) fn pin_to_core(_command: &mut Command, core: usize) {
    log::debug!("CPU pinning is not supported on this platform; core {core} is ignored");
}
