//! OS thread priority and affinity control.
//!
//! Priorities use a portable `[0, 255]` scale mapped linearly onto the native
//! scheduling-policy bounds; affinity masks are 64-bit CPU bitsets clamped to
//! the CPUs actually available. On platforms without the corresponding POSIX
//! calls the operations quietly succeed without effect.

use crate::error::Result;

pub const PRIORITY_MIN: u8 = 0;
pub const PRIORITY_MAX: u8 = u8::MAX;

#[cfg(unix)]
pub type NativeThread = libc::pthread_t;
#[cfg(not(unix))]
pub type NativeThread = ();

/// Handle of the calling thread.
#[cfg(unix)]
pub fn current_thread() -> NativeThread {
    unsafe { libc::pthread_self() }
}

#[cfg(not(unix))]
pub fn current_thread() -> NativeThread {}

/// Native handle of a spawned thread.
#[cfg(unix)]
pub fn thread_of<T>(handle: &std::thread::JoinHandle<T>) -> NativeThread {
    use std::os::unix::thread::JoinHandleExt;
    handle.as_pthread_t()
}

#[cfg(not(unix))]
pub fn thread_of<T>(_handle: &std::thread::JoinHandle<T>) -> NativeThread {}

#[cfg(unix)]
mod imp {
    use std::io;

    use super::{NativeThread, PRIORITY_MAX, PRIORITY_MIN};
    use crate::error::{Error, Result};

    fn check(errno: libc::c_int) -> Result<()> {
        if errno == 0 {
            Ok(())
        } else {
            Err(Error::System(io::Error::from_raw_os_error(errno)))
        }
    }

    fn scheduling(thread: NativeThread) -> Result<(libc::c_int, libc::sched_param)> {
        let mut policy = 0;
        let mut param: libc::sched_param = unsafe { core::mem::zeroed() };
        check(unsafe { libc::pthread_getschedparam(thread, &mut policy, &mut param) })?;
        Ok((policy, param))
    }

    fn priority_bounds(policy: libc::c_int) -> Result<(i32, i32)> {
        let minimum = unsafe { libc::sched_get_priority_min(policy) };
        if minimum == -1 {
            return Err(Error::System(io::Error::last_os_error()));
        }
        let maximum = unsafe { libc::sched_get_priority_max(policy) };
        if maximum == -1 {
            return Err(Error::System(io::Error::last_os_error()));
        }
        Ok((minimum, maximum))
    }

    pub fn set_thread_priority(thread: NativeThread, priority: u8) -> Result<()> {
        let (policy, mut param) = scheduling(thread)?;
        let (minimum, maximum) = priority_bounds(policy)?;
        let normalised = f32::from(priority) / f32::from(PRIORITY_MAX);
        param.sched_priority =
            minimum + ((maximum - minimum) as f32 * normalised).round() as i32;
        check(unsafe { libc::pthread_setschedparam(thread, policy, &param) })
    }

    pub fn thread_priority(thread: NativeThread) -> Result<u8> {
        let (policy, param) = scheduling(thread)?;
        let (minimum, maximum) = priority_bounds(policy)?;
        if minimum == maximum {
            return Ok(PRIORITY_MIN);
        }
        let normalised =
            (param.sched_priority - minimum) as f32 / (maximum - minimum) as f32;
        Ok((normalised * f32::from(PRIORITY_MAX)).round() as u8)
    }

    /// CPUs the process may legally use, as a 64-bit mask.
    pub fn available_mask() -> u64 {
        let cpus = num_cpus::get();
        if cpus >= 64 {
            u64::MAX
        } else {
            (1u64 << cpus) - 1
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn set_thread_affinity(thread: NativeThread, mask: u64) -> Result<()> {
        let mask = mask & available_mask();
        let mut set: libc::cpu_set_t = unsafe { core::mem::zeroed() };
        unsafe { libc::CPU_ZERO(&mut set) };
        for cpu in 0..64 {
            if mask >> cpu & 1 == 1 {
                unsafe { libc::CPU_SET(cpu as usize, &mut set) };
            }
        }
        check(unsafe {
            libc::pthread_setaffinity_np(thread, core::mem::size_of::<libc::cpu_set_t>(), &set)
        })
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub fn thread_affinity(thread: NativeThread) -> Result<u64> {
        let mut set: libc::cpu_set_t = unsafe { core::mem::zeroed() };
        check(unsafe {
            libc::pthread_getaffinity_np(
                thread,
                core::mem::size_of::<libc::cpu_set_t>(),
                &mut set,
            )
        })?;
        let mut mask = 0;
        for cpu in 0..64 {
            if unsafe { libc::CPU_ISSET(cpu as usize, &set) } {
                mask |= 1 << cpu;
            }
        }
        Ok(mask)
    }

    // Affinity is not portable POSIX; without a native call the mask is a
    // no-op and reads back as the full availability mask.
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn set_thread_affinity(_thread: NativeThread, _mask: u64) -> Result<()> {
        log::debug!("thread affinity is not supported on this platform");
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub fn thread_affinity(_thread: NativeThread) -> Result<u64> {
        Ok(available_mask())
    }
}

#[cfg(not(unix))]
mod imp {
    use super::{NativeThread, PRIORITY_MIN};
    use crate::error::Result;

    pub fn set_thread_priority(_thread: NativeThread, _priority: u8) -> Result<()> {
        Ok(())
    }

    pub fn thread_priority(_thread: NativeThread) -> Result<u8> {
        Ok(PRIORITY_MIN)
    }

    pub fn available_mask() -> u64 {
        u64::MAX
    }

    pub fn set_thread_affinity(_thread: NativeThread, _mask: u64) -> Result<()> {
        Ok(())
    }

    pub fn thread_affinity(_thread: NativeThread) -> Result<u64> {
        Ok(u64::MAX)
    }
}

/// Map a `[0, 255]` priority onto the thread's native policy bounds.
pub fn set_thread_priority(thread: NativeThread, priority: u8) -> Result<()> {
    imp::set_thread_priority(thread, priority)
}

/// Current priority of a thread on the `[0, 255]` scale.
pub fn thread_priority(thread: NativeThread) -> Result<u8> {
    imp::thread_priority(thread)
}

/// Restrict a thread to the CPUs whose bits are set in `mask`.
pub fn set_thread_affinity(thread: NativeThread, mask: u64) -> Result<()> {
    imp::set_thread_affinity(thread, mask)
}

/// Current affinity mask of a thread.
pub fn thread_affinity(thread: NativeThread) -> Result<u64> {
    imp::thread_affinity(thread)
}

/// CPUs available to the process as a 64-bit mask.
pub fn available_mask() -> u64 {
    imp::available_mask()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_thread_reads_back() {
        // Setting priority or affinity may need elevated privileges, so only
        // the read paths are asserted here.
        let thread = current_thread();
        assert!(thread_priority(thread).is_ok());
        let affinity = thread_affinity(thread).unwrap();
        assert_ne!(affinity, 0);
    }

    #[test]
    fn available_mask_is_nonempty() {
        assert_ne!(available_mask(), 0);
    }
}
