// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::{ErrorKind, HostNetError};

const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(500);

/// Background watcher reaping the child processes registered to it, so
/// that long running helpers such as DHCP clients do not turn into zombies
/// when they exit.
#[derive(Debug)]
pub struct ChildReaper {
    children: Arc<Mutex<HashSet<i32>>>,
    running: Arc<AtomicBool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl Default for ChildReaper {
    fn default() -> Self {
        Self::new(DEFAULT_REAP_INTERVAL)
    }
}

impl ChildReaper {
    pub fn new(interval: Duration) -> Self {
        Self {
            children: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
            interval,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> Result<(), HostNetError> {
        let mut watcher = lock(&self.watcher)?;
        if watcher.is_some() {
            log::debug!("Child reaper is already running");
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);
        let children = self.children.clone();
        let running = self.running.clone();
        let interval = self.interval;
        *watcher = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                if let Ok(mut children) = children.lock() {
                    reap(&mut children);
                }
                std::thread::sleep(interval);
            }
        }));
        log::info!("Child reaper started");
        Ok(())
    }

    pub fn stop(&self) -> Result<(), HostNetError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = lock(&self.watcher)?.take() {
            handle.join().map_err(|_| {
                HostNetError::new(
                    ErrorKind::Bug,
                    "Child reaper thread panicked".to_string(),
                )
            })?;
            log::info!("Child reaper stopped");
        }
        Ok(())
    }

    pub fn register(&self, pid: u32) -> Result<(), HostNetError> {
        if !self.is_running() {
            return Err(HostNetError::new(
                ErrorKind::NotRegistered,
                format!("Cannot register child {pid}: reaper is not running"),
            ));
        }
        lock(&self.children)?.insert(to_raw_pid(pid)?);
        log::debug!("Child {} registered for reaping", pid);
        Ok(())
    }

    pub fn unregister(&self, pid: u32) -> Result<(), HostNetError> {
        if lock(&self.children)?.remove(&to_raw_pid(pid)?) {
            log::debug!("Child {} unregistered", pid);
            Ok(())
        } else {
            Err(HostNetError::new(
                ErrorKind::NotRegistered,
                format!("Child {pid} is not registered"),
            ))
        }
    }

    pub fn is_registered(&self, pid: u32) -> bool {
        match (lock(&self.children), to_raw_pid(pid)) {
            (Ok(children), Ok(pid)) => children.contains(&pid),
            _ => false,
        }
    }
}

impl Drop for ChildReaper {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("{}", e);
        }
    }
}

fn reap(children: &mut HashSet<i32>) {
    children.retain(|pid| {
        match waitpid(Pid::from_raw(*pid), Some(WaitPidFlag::WNOHANG)) {
            Ok(status @ WaitStatus::Exited(..))
            | Ok(status @ WaitStatus::Signaled(..)) => {
                log::info!("Reaped child {}: {:?}", pid, status);
                false
            }
            Ok(_) => true,
            Err(Errno::ECHILD) => {
                log::debug!("Child {} already reaped elsewhere", pid);
                false
            }
            Err(e) => {
                log::warn!("Failed to wait for child {}: {}", pid, e);
                true
            }
        }
    });
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, HostNetError> {
    mutex.lock().map_err(|e| {
        HostNetError::new(ErrorKind::Bug, format!("Poisoned lock: {e}"))
    })
}

fn to_raw_pid(pid: u32) -> Result<i32, HostNetError> {
    i32::try_from(pid).map_err(|_| {
        HostNetError::new(ErrorKind::ConfigError, format!("Invalid pid {pid}"))
    })
}
