//! Metric source abstractions and their procfs/statvfs implementations.
//!
//! Each trait is the read contract for one metric domain. The production
//! implementations read `/proc` directly (CPU, memory, processes) or call
//! `statvfs` (disk). Construction verifies the backing resource so an
//! unusable domain fails collector startup instead of producing a
//! collector that can never publish.

use std::collections::HashMap;
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, Result};

/// Cumulative CPU jiffy counters since boot, aggregated over all CPUs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
    pub guest: u64,
    pub guest_nice: u64,
}

impl CpuTimes {
    /// Idle time including I/O wait.
    pub fn idle_all(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Total accounted time across the categories entering the usage math.
    pub fn total(&self) -> u64 {
        self.user + self.nice + self.system + self.idle_all() + self.irq + self.softirq + self.steal
    }
}

/// Raw block counts for one filesystem, as returned by `statvfs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskStats {
    /// Total blocks in fragment-size units
    pub blocks: u64,
    /// Blocks available to unprivileged users
    pub blocks_available: u64,
    /// Fragment size in bytes
    pub fragment_size: u64,
}

/// One `/proc` directory entry as seen by the process source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcEntry {
    /// Entry name; a PID when composed entirely of digits
    pub name: String,
    /// Whether a non-empty command line could be read for this entry
    pub cmdline_readable: bool,
}

/// Source of cumulative CPU counters.
pub trait CpuSource: Send {
    fn sample(&mut self) -> Result<CpuTimes>;
}

/// Source of named memory counters in kilobytes.
pub trait MemorySource: Send {
    fn sample(&mut self) -> Result<HashMap<String, u64>>;
}

/// Source of filesystem block counts for one mount.
pub trait DiskSource: Send {
    fn sample(&mut self) -> Result<DiskStats>;
}

/// Source of process-listing entries.
pub trait ProcessSource: Send {
    fn entries(&mut self) -> Result<Vec<ProcEntry>>;
}

/// Constructs the per-domain sources handed to collectors at spawn time.
pub trait SourceFactory {
    fn cpu(&self) -> Result<Box<dyn CpuSource>>;
    fn memory(&self) -> Result<Box<dyn MemorySource>>;
    fn disk(&self) -> Result<Box<dyn DiskSource>>;
    fn processes(&self) -> Result<Box<dyn ProcessSource>>;
}

/// CPU counters from `/proc/stat`'s aggregate `cpu` line.
#[derive(Debug)]
pub struct ProcfsCpuSource {
    path: PathBuf,
}

impl ProcfsCpuSource {
    pub fn new() -> Result<Self> {
        Self::with_path("/proc/stat")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::metadata(&path)?;
        Ok(Self { path })
    }
}

impl CpuSource for ProcfsCpuSource {
    fn sample(&mut self) -> Result<CpuTimes> {
        let stat = fs::read_to_string(&self.path)?;
        let line = stat
            .lines()
            .next()
            .ok_or_else(|| MonitorError::parse_error("empty cpu stat file"))?;
        parse_cpu_line(line)
    }
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
fn parse_cpu_line(line: &str) -> Result<CpuTimes> {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => {}
        _ => {
            return Err(MonitorError::parse_error(format!(
                "unexpected cpu stat line: {line}"
            )))
        }
    }

    let mut values = [0u64; 10];
    for (i, slot) in values.iter_mut().enumerate() {
        match fields.next() {
            Some(raw) => {
                *slot = raw
                    .parse()
                    .map_err(|_| MonitorError::parse_error(format!("bad cpu counter: {raw}")))?;
            }
            // guest and guest_nice are absent on old kernels
            None if i >= 8 => break,
            None => return Err(MonitorError::parse_error("truncated cpu stat line")),
        }
    }

    let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = values;
    Ok(CpuTimes {
        user,
        nice,
        system,
        idle,
        iowait,
        irq,
        softirq,
        steal,
        guest,
        guest_nice,
    })
}

/// Named kilobyte counters from `/proc/meminfo`.
#[derive(Debug)]
pub struct ProcfsMemorySource {
    path: PathBuf,
}

impl ProcfsMemorySource {
    pub fn new() -> Result<Self> {
        Self::with_path("/proc/meminfo")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::metadata(&path)?;
        Ok(Self { path })
    }
}

impl MemorySource for ProcfsMemorySource {
    fn sample(&mut self) -> Result<HashMap<String, u64>> {
        let meminfo = fs::read_to_string(&self.path)?;
        let mut counters = HashMap::new();
        for line in meminfo.lines() {
            if let Some((key, rest)) = line.split_once(':') {
                if let Some(raw) = rest.split_whitespace().next() {
                    if let Ok(kb) = raw.parse::<u64>() {
                        counters.insert(key.to_string(), kb);
                    }
                }
            }
        }
        Ok(counters)
    }
}

/// Filesystem block counts for a mount path via `statvfs`.
#[derive(Debug)]
pub struct StatvfsDiskSource {
    mount: CString,
}

impl StatvfsDiskSource {
    pub fn new() -> Result<Self> {
        Self::with_mount("/")
    }

    pub fn with_mount(mount: impl AsRef<Path>) -> Result<Self> {
        let mount = mount.as_ref();
        fs::metadata(mount)?;
        let mount = CString::new(mount.as_os_str().as_bytes())
            .map_err(|_| MonitorError::config_error("mount path contains a NUL byte"))?;
        Ok(Self { mount })
    }
}

impl DiskSource for StatvfsDiskSource {
    fn sample(&mut self) -> Result<DiskStats> {
        let mut vfs = unsafe { std::mem::zeroed::<libc::statvfs>() };
        // Safety: mount is a valid NUL-terminated path and vfs is an
        // out-parameter fully written on success.
        let rc = unsafe { libc::statvfs(self.mount.as_ptr(), &mut vfs) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        Ok(DiskStats {
            blocks: vfs.f_blocks as u64,
            blocks_available: vfs.f_bavail as u64,
            fragment_size: vfs.f_frsize as u64,
        })
    }
}

/// Process entries enumerated from a `/proc` directory listing.
#[derive(Debug)]
pub struct ProcfsProcessSource {
    root: PathBuf,
}

impl ProcfsProcessSource {
    pub fn new() -> Result<Self> {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !fs::metadata(&root)?.is_dir() {
            return Err(MonitorError::config_error(format!(
                "process source root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }
}

impl ProcessSource for ProcfsProcessSource {
    fn entries(&mut self) -> Result<Vec<ProcEntry>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            // Only numeric names can be PIDs; skip the cmdline probe otherwise.
            let cmdline_readable = !name.is_empty()
                && name.bytes().all(|b| b.is_ascii_digit())
                && entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && fs::read(self.root.join(&name).join("cmdline"))
                    .map(|bytes| !bytes.is_empty())
                    .unwrap_or(false);
            out.push(ProcEntry {
                name,
                cmdline_readable,
            });
        }
        Ok(out)
    }
}

/// Production factory backed by `/proc` and the root filesystem.
#[derive(Debug, Default)]
pub struct ProcfsSourceFactory;

impl SourceFactory for ProcfsSourceFactory {
    fn cpu(&self) -> Result<Box<dyn CpuSource>> {
        Ok(Box::new(ProcfsCpuSource::new()?))
    }

    fn memory(&self) -> Result<Box<dyn MemorySource>> {
        Ok(Box::new(ProcfsMemorySource::new()?))
    }

    fn disk(&self) -> Result<Box<dyn DiskSource>> {
        Ok(Box::new(StatvfsDiskSource::new()?))
    }

    fn processes(&self) -> Result<Box<dyn ProcessSource>> {
        Ok(Box::new(ProcfsProcessSource::new()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_cpu_line() {
        let times =
            parse_cpu_line("cpu  100 0 50 800 50 10 20 5 0 0").expect("line should parse");
        assert_eq!(times.user, 100);
        assert_eq!(times.system, 50);
        assert_eq!(times.idle, 800);
        assert_eq!(times.iowait, 50);
        assert_eq!(times.idle_all(), 850);
        assert_eq!(times.total(), 100 + 50 + 850 + 10 + 20 + 5);
    }

    #[test]
    fn test_parse_cpu_line_without_guest_counters() {
        // Old kernels expose only eight counters.
        let times = parse_cpu_line("cpu 1 2 3 4 5 6 7 8").expect("line should parse");
        assert_eq!(times.steal, 8);
        assert_eq!(times.guest, 0);
        assert_eq!(times.guest_nice, 0);
    }

    #[test]
    fn test_parse_cpu_line_rejects_garbage() {
        assert!(parse_cpu_line("intr 12345").is_err());
        assert!(parse_cpu_line("cpu 1 2 3").is_err());
        assert!(parse_cpu_line("cpu a b c d e f g h").is_err());
    }

    #[test]
    fn test_meminfo_parsing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("meminfo");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "MemTotal:       16000000 kB").unwrap();
        writeln!(file, "MemFree:         2000000 kB").unwrap();
        writeln!(file, "Buffers:          500000 kB").unwrap();
        writeln!(file, "Cached:          3500000 kB").unwrap();
        writeln!(file, "HugePages_Total:       0").unwrap();
        writeln!(file, "garbage line without colon").unwrap();

        let mut source = ProcfsMemorySource::with_path(&path).expect("source");
        let counters = source.sample().expect("sample");
        assert_eq!(counters.get("MemTotal"), Some(&16_000_000));
        assert_eq!(counters.get("MemFree"), Some(&2_000_000));
        assert_eq!(counters.get("Buffers"), Some(&500_000));
        assert_eq!(counters.get("Cached"), Some(&3_500_000));
        assert_eq!(counters.get("HugePages_Total"), Some(&0));
    }

    #[test]
    fn test_process_source_probes_only_pid_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A real-looking process with a non-empty cmdline.
        std::fs::create_dir(dir.path().join("123")).unwrap();
        std::fs::write(dir.path().join("123/cmdline"), b"/usr/bin/true\0").unwrap();
        // A kernel-thread-like entry: PID directory, empty cmdline.
        std::fs::create_dir(dir.path().join("456")).unwrap();
        std::fs::write(dir.path().join("456/cmdline"), b"").unwrap();
        // Non-PID procfs entries.
        std::fs::write(dir.path().join("uptime"), b"1 2").unwrap();
        std::fs::create_dir(dir.path().join("sys")).unwrap();

        let mut source = ProcfsProcessSource::with_root(dir.path()).expect("source");
        let mut entries = source.entries().expect("entries");
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let by_name = |name: &str| {
            entries
                .iter()
                .find(|e| e.name == name)
                .unwrap_or_else(|| panic!("missing entry {name}"))
        };
        assert!(by_name("123").cmdline_readable);
        assert!(!by_name("456").cmdline_readable);
        assert!(!by_name("uptime").cmdline_readable);
        assert!(!by_name("sys").cmdline_readable);
    }

    #[test]
    fn test_source_construction_fails_for_missing_backing() {
        assert!(ProcfsCpuSource::with_path("/definitely/not/here").is_err());
        assert!(ProcfsMemorySource::with_path("/definitely/not/here").is_err());
        assert!(StatvfsDiskSource::with_mount("/definitely/not/here").is_err());
        assert!(ProcfsProcessSource::with_root("/definitely/not/here").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_statvfs_on_root() {
        let mut source = StatvfsDiskSource::new().expect("source");
        let stats = source.sample().expect("sample");
        assert!(stats.fragment_size > 0);
        assert!(stats.blocks >= stats.blocks_available);
    }
}
