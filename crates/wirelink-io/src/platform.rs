//! Best-effort scheduling and OOM tuning. Every call here may silently fail
//! without privileges; the host keeps working at normal priority.

/// Raises the calling thread to the highest realtime priority the platform
/// grants, plus niceness -20.
#[cfg(unix)]
pub fn raise_thread_priority() {
    unsafe {
        libc::setpriority(libc::PRIO_PROCESS as _, 0, -20);
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        #[cfg(target_os = "linux")]
        libc::sched_setscheduler(0, libc::SCHED_RR, &param);
        libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param);
    }
}

#[cfg(not(unix))]
pub fn raise_thread_priority() {}

/// Raises the whole process: realtime scheduling, niceness -20, and on Linux
/// an OOM score adjustment that keeps the process off the killer's shortlist.
#[cfg(unix)]
pub fn raise_process_priority() {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/proc/{}/oom_adj", std::process::id());
        let _ = std::fs::write(path, "-17");
    }
    unsafe {
        libc::setpriority(libc::PRIO_PROCESS as _, 0, -20);
        #[cfg(target_os = "linux")]
        {
            let mut param: libc::sched_param = std::mem::zeroed();
            param.sched_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
            libc::sched_setscheduler(0, libc::SCHED_RR, &param);
        }
    }
}

#[cfg(not(unix))]
pub fn raise_process_priority() {}
